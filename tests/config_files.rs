use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tempfile::tempdir;
use worldpager::{
    CellCoordinate, CellSize, GridConfig, GridKind, GridSettings, PropertyValue, SettingsBridge, TerrainSettings,
    WorldConfig, WorldError, WorldPosition, WorldState,
};

fn settle(world: &mut WorldState) {
    for _ in 0..2000 {
        if world.tick().is_settled() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("world did not settle");
}

fn small_config() -> WorldConfig {
    let mut config = WorldConfig::demo();
    config.world.num_threads = 2;
    config.grids = vec![GridConfig::new(
        "Terrain",
        GridSettings::new(CellSize::Size32, 1).with_budget(9, 9),
        GridKind::Terrain(TerrainSettings { step: 8 }),
    )];
    config
}

#[test]
fn test_shipped_world_file_matches_demo() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("world.toml");
    let shipped = WorldConfig::load(&path).unwrap();
    assert_eq!(shipped.to_toml().unwrap(), WorldConfig::demo().to_toml().unwrap());
}

#[test]
fn test_saved_config_reloads_to_the_same_world() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("world.toml");

    let config = WorldConfig::demo();
    config.save(&path).unwrap();
    let reloaded = WorldConfig::load(&path).unwrap();
    assert_eq!(reloaded.to_toml().unwrap(), config.to_toml().unwrap());

    let world = reloaded.build_world().unwrap();
    assert_eq!(world.grid_names(), vec!["Terrain", "Grass", "Flowers", "Trees"]);
    world.shutdown();
}

#[test]
fn test_missing_file_falls_back_to_demo() {
    let dir = tempdir().unwrap();
    let config = WorldConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.world.world_name, "Test World");
    assert_eq!(config.grids.len(), 4);

    assert!(matches!(WorldConfig::load(dir.path().join("absent.toml")), Err(WorldError::Io(_))));
}

#[test]
fn test_broken_files_are_errors_not_fallbacks() {
    let dir = tempdir().unwrap();

    let malformed = dir.path().join("malformed.toml");
    fs::write(&malformed, "[world\nseed = 1").unwrap();
    assert!(matches!(WorldConfig::load_or_default(&malformed), Err(WorldError::ConfigParse(_))));

    let out_of_range = dir.path().join("range.toml");
    fs::write(
        &out_of_range,
        r#"
[[grids]]
name = "Terrain"

[grids.settings]
cell_size = "32"
view_distance = 40

[grids.generator]
kind = "terrain"
"#,
    )
    .unwrap();
    assert!(matches!(
        WorldConfig::load_or_default(&out_of_range),
        Err(WorldError::InvalidSetting { .. })
    ));
}

#[test]
fn test_bridge_edit_takes_effect_on_refresh() {
    let mut world = small_config().build_world().unwrap();
    settle(&mut world);
    let before = world
        .get_content_grid("Terrain")
        .unwrap()
        .payload(&CellCoordinate::new(0, 0))
        .and_then(|payload| payload.as_height_field().map(|field| field.samples_per_side))
        .unwrap();

    SettingsBridge::set_grid_property(&mut world, "Terrain", "step", PropertyValue::Enum("2".to_string())).unwrap();
    SettingsBridge::set_grid_property(&mut world, "Terrain", "view_distance", PropertyValue::Int(2)).unwrap();
    world.refresh_grid("Terrain").unwrap();
    settle(&mut world);

    let grid = world.get_content_grid("Terrain").unwrap();
    assert_eq!(grid.loaded_count(), 25);
    let after = grid
        .payload(&CellCoordinate::new(0, 0))
        .and_then(|payload| payload.as_height_field().map(|field| field.samples_per_side))
        .unwrap();
    assert_eq!(before, 32 / 8 + 1);
    assert_eq!(after, 32 / 2 + 1);
    world.shutdown();
}

#[test]
fn test_world_noise_edit_changes_heights() {
    let mut world = small_config().build_world().unwrap();
    world.set_follower(WorldPosition::new(500.0, 0.0, 500.0));
    settle(&mut world);
    let coord = CellCoordinate::containing(500.0, 500.0, CellSize::Size32);
    let height = |world: &WorldState| {
        world
            .get_content_grid("Terrain")
            .unwrap()
            .payload(&coord)
            .and_then(|payload| payload.as_height_field().map(|field| field.max_height))
            .unwrap()
    };
    let before = height(&world);

    SettingsBridge::set_world_property(&mut world, "layers.0.strength", PropertyValue::Float(10.0)).unwrap();
    SettingsBridge::set_world_property(&mut world, "layers.1.strength", PropertyValue::Float(0.0)).unwrap();
    settle(&mut world);
    assert_eq!(height(&world), before);

    world.refresh_all().unwrap();
    settle(&mut world);
    let after = height(&world);
    assert_ne!(after, before);
    assert!(after <= 10.0 + 1e-3);
    world.shutdown();
}
