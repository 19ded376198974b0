// src/config/config_manager.rs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::core::error::{WorldError, WorldResult};
use crate::core::world_manager::{WorldSettings, WorldState};
use crate::terrain::cell::CellSize;
use crate::terrain::content_grid::{ContentGrid, GridKind};
use crate::terrain::generation_rules::RuleConfig;
use crate::terrain::noise::{LayeredNoise, NoiseLayer};
use crate::terrain::sprite_grid::MeshPlotterSettings;
use crate::terrain::terrain_config::GridSettings;
use crate::terrain::terrain_grid::TerrainSettings;
use crate::terrain::trees_grid::{AttemptBudget, PlottedModel, TreesSettings};

// --- Struct Definitions ---

// One [[grids]] entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub name: String,
    #[serde(default)]
    pub settings: GridSettings,
    #[serde(default)]
    pub noise: LayeredNoise,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    pub generator: GridKind,
}

impl GridConfig {
    pub fn new(name: impl Into<String>, settings: GridSettings, generator: GridKind) -> Self {
        GridConfig {
            name: name.into(),
            settings,
            noise: LayeredNoise::new(),
            rules: Vec::new(),
            generator,
        }
    }

    pub fn build(&self) -> ContentGrid {
        ContentGrid::new(self.name.clone(), self.settings.clone(), self.generator.clone())
            .with_noise(self.noise.clone())
            .with_rules(&self.rules)
    }
}

// --- Main WorldConfig Struct ---
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub world_noise: LayeredNoise,
    #[serde(default)]
    pub grids: Vec<GridConfig>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::demo()
    }
}

impl WorldConfig {
    // Terrain, grass, flowers and trees as the demo world ships them
    pub fn demo() -> Self {
        WorldConfig {
            world: WorldSettings {
                world_name: "Test World".to_string(),
                seed: 123,
                num_threads: 3,
            },
            world_noise: demo_world_noise(),
            grids: vec![demo_terrain(), demo_grass(), demo_flowers(), demo_trees()],
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> WorldResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading world config");
        let text = fs::read_to_string(path)?;
        let config: WorldConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    // Falls back to the demo world if the file is missing or unreadable.
    // A file that parses but holds invalid values is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> WorldResult<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(WorldError::Io(error)) => {
                warn!(path = %path.display(), %error, "World config unavailable, using the demo world");
                Ok(Self::demo())
            }
            Err(error) => Err(error),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> WorldResult<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving world config");
        let text = self.to_toml()?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn to_toml(&self) -> WorldResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> WorldResult<()> {
        if self.world.world_name.trim().is_empty() {
            return Err(WorldError::invalid("world.world_name", "must not be empty"));
        }
        self.world_noise.validate("world_noise")?;

        let mut names = HashSet::new();
        for grid in &self.grids {
            if grid.name.trim().is_empty() {
                return Err(WorldError::invalid("grids.name", "must not be empty"));
            }
            if !names.insert(grid.name.as_str()) {
                return Err(WorldError::DuplicateGrid(grid.name.clone()));
            }
            grid.build().validate()?;
        }
        Ok(())
    }

    pub fn build_world(&self) -> WorldResult<WorldState> {
        self.validate()?;
        let mut world = WorldState::new(self.world.clone(), self.world_noise.clone())?;
        for grid in &self.grids {
            world.add_content_grid(grid.build())?;
        }
        Ok(world)
    }
}

// --- Demo world ---

fn demo_world_noise() -> LayeredNoise {
    LayeredNoise::new()
        .with_layer(NoiseLayer::new("continents", 123).with_strength(96.0).with_frequency(0.002).with_octaves(5))
        .with_layer(NoiseLayer::new("hills", 321).with_strength(24.0).with_frequency(0.01).with_octaves(4))
        .with_hard_floor(8.0, 1.0)
}

fn demo_terrain() -> GridConfig {
    GridConfig::new(
        "Terrain",
        GridSettings::new(CellSize::Size64, 8),
        GridKind::Terrain(TerrainSettings::default()),
    )
}

fn sprite_plotter(sprite: &str, density: f32) -> MeshPlotterSettings {
    MeshPlotterSettings {
        sprite: sprite.to_string(),
        min_size: 0.2,
        max_size: 1.3,
        density,
        // Above sea level, with a little per-instance deviation
        min_world_height: 10.0,
        min_height_deviation: 1.5,
        max_world_height: 256.0,
        max_height_deviation: 0.5,
    }
}

fn demo_grass() -> GridConfig {
    let mut grid = GridConfig::new(
        "Grass",
        GridSettings::new(CellSize::Size32, 8),
        GridKind::Sprite(sprite_plotter("grass", 0.2)),
    );
    grid.noise = LayeredNoise::new()
        .with_layer(NoiseLayer::new("layer 1", 543).with_scale(2.5, 1.5))
        .with_layer(NoiseLayer::new("layer 2", 432).with_scale(1.5, 2.5));
    grid.rules = vec![RuleConfig::Paths { threshold: 0.2, second_chance: 0.2 }];
    grid
}

fn demo_flowers() -> GridConfig {
    let mut grid = GridConfig::new(
        "Flowers",
        GridSettings::new(CellSize::Size32, 3),
        GridKind::Sprite(sprite_plotter("flower", 3.6)),
    );
    grid.noise = LayeredNoise::new()
        .with_layer(NoiseLayer::new("layer 1", 7654).with_scale(0.5, 1.5))
        .with_layer(NoiseLayer::new("layer 2", 2345).with_scale(1.5, 0.5));
    grid.rules = vec![RuleConfig::Paths { threshold: 0.1, second_chance: 0.1 }];
    grid
}

fn tree(name: &str, radius: (f32, f32), space: f32, scale: (f32, f32), likelihood: f32) -> PlottedModel {
    PlottedModel {
        name: name.to_string(),
        min_radius: radius.0,
        max_radius: radius.1,
        min_space_between: space,
        min_scale: scale.0,
        max_scale: scale.1,
        min_height: 10.0,
        max_height: 128.0,
        likelihood,
        max_attempts: 32,
    }
}

fn demo_trees() -> GridConfig {
    let trees = TreesSettings {
        attempt_budget: AttemptBudget::PerType,
        models: vec![
            tree("Fir 1", (10.0, 12.0), 16.0, (6.0, 10.0), 0.1),
            tree("Oak", (12.0, 18.0), 19.0, (10.0, 16.0), 0.3),
            tree("Maple", (16.0, 22.0), 24.0, (8.0, 14.0), 0.4),
        ],
    };
    GridConfig::new("Trees", GridSettings::new(CellSize::Size64, 4), GridKind::Trees(trees))
}
