use serde::Serialize;
use std::fmt;

use crate::core::error::{WorldError, WorldResult};
use crate::core::world_manager::WorldState;
use crate::terrain::cell::CellSize;
use crate::terrain::content_grid::{ContentGrid, GridKind};
use crate::terrain::noise::{LayeredNoise, NoiseLayer};
use crate::terrain::sprite_grid::MeshPlotterSettings;
use crate::terrain::terrain_config::GridSettings;
use crate::terrain::terrain_grid::TerrainSettings;
use crate::terrain::trees_grid::PlottedModel;

/// SettingsBridge maps named, typed properties onto live settings
///
/// This is the surface a settings panel talks to. Every property has a fixed
/// key, a type with a range and a getter/setter pair; there is no reflection.
/// Setters only touch live settings, so nothing changes in the streamed world
/// until the grid (or the whole world) is refreshed.
///
/// Keys:
/// - grid: `view_distance`, `cell_size`, `additions_per_frame`, `removals_per_frame`
/// - terrain grids: `step`
/// - sprite grids: `min_size`, `max_size`, `density`, `min_world_height`,
///   `min_height_deviation`, `max_world_height`, `max_height_deviation`
/// - tree grids: `trees.<model>.<field>`
/// - grid noise: `noise.layers.<index>.<field>`
/// - world: `hard_floor`, `hard_floor_height`, `hard_floor_strength`, `layers.<index>.<field>`
pub struct SettingsBridge;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(String),
}

impl PropertyValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    // Integers are accepted where a float is expected
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(value) => Some(*value),
            PropertyValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Enum(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::Float(value) => write!(f, "{value}"),
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Enum(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PropertyKind {
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Bool,
    Enum(&'static [&'static str]),
}

impl PropertyKind {
    fn type_name(&self) -> &'static str {
        match self {
            PropertyKind::Int { .. } => "integer",
            PropertyKind::Float { .. } => "float",
            PropertyKind::Bool => "boolean",
            PropertyKind::Enum(_) => "enum",
        }
    }

    fn check(&self, key: &str, value: &PropertyValue) -> WorldResult<()> {
        let mismatch = || WorldError::PropertyType {
            key: key.to_string(),
            expected: self.type_name(),
        };
        match *self {
            PropertyKind::Int { min, max } => {
                let v = value.as_i64().ok_or_else(mismatch)?;
                if v < min || v > max {
                    return Err(WorldError::invalid(key, format!("{v} is outside {min}..={max}")));
                }
            }
            PropertyKind::Float { min, max } => {
                let v = value.as_f64().ok_or_else(mismatch)?;
                if !v.is_finite() || v < min || v > max {
                    return Err(WorldError::invalid(key, format!("{v} is outside {min}..={max}")));
                }
            }
            PropertyKind::Bool => {
                value.as_bool().ok_or_else(mismatch)?;
            }
            PropertyKind::Enum(options) => {
                let v = value.as_str().ok_or_else(mismatch)?;
                if !options.contains(&v) {
                    return Err(WorldError::invalid(key, format!("'{v}' is not one of {options:?}")));
                }
            }
        }
        Ok(())
    }
}

// Description of one property as a panel would list it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyInfo {
    pub key: String,
    pub kind: PropertyKind,
    pub value: PropertyValue,
}

struct Property<T> {
    key: &'static str,
    kind: PropertyKind,
    get: fn(&T) -> PropertyValue,
    // Only called with values that passed `kind.check`
    set: fn(&mut T, &PropertyValue),
}

macro_rules! int_property {
    ($key:literal, $field:ident, $ty:ty, $min:expr, $max:expr) => {
        Property {
            key: $key,
            kind: PropertyKind::Int { min: $min, max: $max },
            get: |target| PropertyValue::Int(target.$field as i64),
            set: |target, value| {
                if let Some(v) = value.as_i64() {
                    target.$field = v as $ty;
                }
            },
        }
    };
}

macro_rules! float_property {
    ($key:literal, $field:ident, $min:expr, $max:expr) => {
        Property {
            key: $key,
            kind: PropertyKind::Float { min: $min, max: $max },
            get: |target| PropertyValue::Float(target.$field as f64),
            set: |target, value| {
                if let Some(v) = value.as_f64() {
                    target.$field = v as f32;
                }
            },
        }
    };
}

const CELL_SIZES: &[&str] = &["16", "32", "64", "128", "256"];
const TERRAIN_STEPS: &[&str] = &["1", "2", "4", "8"];

static GRID_PROPERTIES: [Property<GridSettings>; 4] = [
    int_property!("view_distance", view_distance, u32, 1, 20),
    Property {
        key: "cell_size",
        kind: PropertyKind::Enum(CELL_SIZES),
        get: |settings| PropertyValue::Enum(settings.cell_size.label().to_string()),
        set: |settings, value| {
            let units = value.as_str().and_then(|label| label.parse::<u32>().ok());
            if let Some(size) = units.and_then(CellSize::from_units) {
                settings.cell_size = size;
            }
        },
    },
    int_property!("additions_per_frame", additions_per_frame, u32, 1, 32),
    int_property!("removals_per_frame", removals_per_frame, u32, 1, 32),
];

static TERRAIN_PROPERTIES: [Property<TerrainSettings>; 1] = [Property {
    key: "step",
    kind: PropertyKind::Enum(TERRAIN_STEPS),
    get: |settings| PropertyValue::Enum(settings.step.to_string()),
    set: |settings, value| {
        if let Some(step) = value.as_str().and_then(|label| label.parse::<u32>().ok()) {
            settings.step = step;
        }
    },
}];

static PLOTTER_PROPERTIES: [Property<MeshPlotterSettings>; 7] = [
    float_property!("min_size", min_size, 0.01, 3.0),
    float_property!("max_size", max_size, 0.01, 3.0),
    float_property!("density", density, 0.1, 16.0),
    float_property!("min_world_height", min_world_height, 0.0, 256.0),
    float_property!("min_height_deviation", min_height_deviation, 0.0, 10.0),
    float_property!("max_world_height", max_world_height, 0.0, 256.0),
    float_property!("max_height_deviation", max_height_deviation, 0.0, 10.0),
];

static TREE_PROPERTIES: [Property<PlottedModel>; 9] = [
    float_property!("min_radius", min_radius, 0.1, 32.0),
    float_property!("max_radius", max_radius, 0.1, 32.0),
    float_property!("min_space_between", min_space_between, 0.1, 32.0),
    float_property!("min_scale", min_scale, 0.1, 32.0),
    float_property!("max_scale", max_scale, 0.1, 32.0),
    float_property!("min_height", min_height, 0.0, 128.0),
    float_property!("max_height", max_height, 0.0, 128.0),
    float_property!("likelihood", likelihood, 0.0, 1.0),
    int_property!("max_attempts", max_attempts, u32, 1, 5000),
];

static NOISE_PROPERTIES: [Property<LayeredNoise>; 3] = [
    Property {
        key: "hard_floor",
        kind: PropertyKind::Bool,
        get: |noise| PropertyValue::Bool(noise.hard_floor),
        set: |noise, value| {
            if let Some(enabled) = value.as_bool() {
                noise.hard_floor = enabled;
            }
        },
    },
    float_property!("hard_floor_height", hard_floor_height, 0.0, 128.0),
    float_property!("hard_floor_strength", hard_floor_strength, 0.0, 128.0),
];

// Layer fields sit behind setters so the compiled sampler is rebuilt
static LAYER_PROPERTIES: [Property<NoiseLayer>; 3] = [
    Property {
        key: "seed",
        kind: PropertyKind::Int {
            min: i32::MIN as i64,
            max: i32::MAX as i64,
        },
        get: |layer| PropertyValue::Int(layer.seed() as i64),
        set: |layer, value| {
            if let Some(seed) = value.as_i64() {
                layer.set_seed(seed as i32);
            }
        },
    },
    Property {
        key: "strength",
        kind: PropertyKind::Float { min: 0.0, max: 512.0 },
        get: |layer| PropertyValue::Float(layer.strength() as f64),
        set: |layer, value| {
            if let Some(strength) = value.as_f64() {
                layer.set_strength(strength as f32);
            }
        },
    },
    Property {
        key: "octaves",
        kind: PropertyKind::Int { min: 1, max: 16 },
        get: |layer| PropertyValue::Int(layer.fractal_octaves() as i64),
        set: |layer, value| {
            if let Some(octaves) = value.as_i64() {
                layer.set_fractal_octaves(octaves as u32);
            }
        },
    },
];

fn lookup<'a, T>(table: &'a [Property<T>], key: &str) -> Option<&'a Property<T>> {
    table.iter().find(|property| property.key == key)
}

fn describe<T>(table: &[Property<T>], prefix: &str, target: &T, out: &mut Vec<PropertyInfo>) {
    for property in table {
        out.push(PropertyInfo {
            key: format!("{prefix}{}", property.key),
            kind: property.kind,
            value: (property.get)(target),
        });
    }
}

fn assign<T>(property: &Property<T>, key: &str, target: &mut T, value: &PropertyValue) -> WorldResult<()> {
    property.kind.check(key, value)?;
    (property.set)(target, value);
    Ok(())
}

// Splits `<prefix><index>.<field>`
fn indexed<'k>(key: &'k str, prefix: &str) -> Option<(usize, &'k str)> {
    let (index, field) = key.strip_prefix(prefix)?.split_once('.')?;
    Some((index.parse().ok()?, field))
}

// Splits `trees.<model>.<field>`; model names may contain spaces but not dots
fn tree_key(key: &str) -> Option<(&str, &str)> {
    key.strip_prefix("trees.")?.rsplit_once('.')
}

impl SettingsBridge {
    pub fn grid_properties(world: &WorldState, grid: &str) -> WorldResult<Vec<PropertyInfo>> {
        let grid = world.get_content_grid(grid)?;
        let mut out = Vec::new();
        describe(&GRID_PROPERTIES, "", &grid.settings, &mut out);
        match &grid.kind {
            GridKind::Terrain(settings) => describe(&TERRAIN_PROPERTIES, "", settings, &mut out),
            GridKind::Sprite(settings) => describe(&PLOTTER_PROPERTIES, "", settings, &mut out),
            GridKind::Trees(settings) => {
                for model in &settings.models {
                    describe(&TREE_PROPERTIES, &format!("trees.{}.", model.name), model, &mut out);
                }
            }
        }
        for (index, layer) in grid.noise.layers().iter().enumerate() {
            describe(&LAYER_PROPERTIES, &format!("noise.layers.{index}."), layer, &mut out);
        }
        Ok(out)
    }

    pub fn get_grid_property(world: &WorldState, grid: &str, key: &str) -> WorldResult<PropertyValue> {
        let grid = world.get_content_grid(grid)?;
        let unknown = || WorldError::UnknownProperty {
            grid: grid.name().to_string(),
            key: key.to_string(),
        };

        if let Some(property) = lookup(&GRID_PROPERTIES, key) {
            return Ok((property.get)(&grid.settings));
        }
        if let Some((index, field)) = indexed(key, "noise.layers.") {
            let layer = grid.noise.layers().get(index).ok_or_else(unknown)?;
            let property = lookup(&LAYER_PROPERTIES, field).ok_or_else(unknown)?;
            return Ok((property.get)(layer));
        }
        let value = match &grid.kind {
            GridKind::Terrain(settings) => lookup(&TERRAIN_PROPERTIES, key).map(|p| (p.get)(settings)),
            GridKind::Sprite(settings) => lookup(&PLOTTER_PROPERTIES, key).map(|p| (p.get)(settings)),
            GridKind::Trees(settings) => tree_key(key).and_then(|(model, field)| {
                let model = settings.model(model)?;
                lookup(&TREE_PROPERTIES, field).map(|p| (p.get)(model))
            }),
        };
        value.ok_or_else(unknown)
    }

    // Range-checked edit of a live setting; refresh the grid to apply it
    pub fn set_grid_property(world: &mut WorldState, grid: &str, key: &str, value: PropertyValue) -> WorldResult<()> {
        let grid: &mut ContentGrid = world.get_content_grid_mut(grid)?;
        let unknown = WorldError::UnknownProperty {
            grid: grid.name().to_string(),
            key: key.to_string(),
        };

        if let Some(property) = lookup(&GRID_PROPERTIES, key) {
            return assign(property, key, &mut grid.settings, &value);
        }
        if let Some((index, field)) = indexed(key, "noise.layers.") {
            let (Some(layer), Some(property)) = (grid.noise.layer_mut(index), lookup(&LAYER_PROPERTIES, field)) else {
                return Err(unknown);
            };
            return assign(property, key, layer, &value);
        }
        match &mut grid.kind {
            GridKind::Terrain(settings) => match lookup(&TERRAIN_PROPERTIES, key) {
                Some(property) => assign(property, key, settings, &value),
                None => Err(unknown),
            },
            GridKind::Sprite(settings) => match lookup(&PLOTTER_PROPERTIES, key) {
                Some(property) => assign(property, key, settings, &value),
                None => Err(unknown),
            },
            GridKind::Trees(settings) => {
                let Some((model, field)) = tree_key(key) else {
                    return Err(unknown);
                };
                match (settings.model_mut(model), lookup(&TREE_PROPERTIES, field)) {
                    (Some(model), Some(property)) => assign(property, key, model, &value),
                    _ => Err(unknown),
                }
            }
        }
    }

    pub fn world_properties(world: &WorldState) -> Vec<PropertyInfo> {
        let noise = world.world_noise();
        let mut out = Vec::new();
        describe(&NOISE_PROPERTIES, "", noise, &mut out);
        for (index, layer) in noise.layers().iter().enumerate() {
            describe(&LAYER_PROPERTIES, &format!("layers.{index}."), layer, &mut out);
        }
        out
    }

    pub fn get_world_property(world: &WorldState, key: &str) -> WorldResult<PropertyValue> {
        let noise = world.world_noise();
        if let Some(property) = lookup(&NOISE_PROPERTIES, key) {
            return Ok((property.get)(noise));
        }
        indexed(key, "layers.")
            .and_then(|(index, field)| {
                let layer = noise.layers().get(index)?;
                lookup(&LAYER_PROPERTIES, field).map(|p| (p.get)(layer))
            })
            .ok_or_else(|| world_unknown(key))
    }

    pub fn set_world_property(world: &mut WorldState, key: &str, value: PropertyValue) -> WorldResult<()> {
        let noise = world.world_noise_mut();
        if let Some(property) = lookup(&NOISE_PROPERTIES, key) {
            return assign(property, key, noise, &value);
        }
        let Some((index, field)) = indexed(key, "layers.") else {
            return Err(world_unknown(key));
        };
        match (noise.layer_mut(index), lookup(&LAYER_PROPERTIES, field)) {
            (Some(layer), Some(property)) => assign(property, key, layer, &value),
            _ => Err(world_unknown(key)),
        }
    }
}

fn world_unknown(key: &str) -> WorldError {
    WorldError::UnknownProperty {
        grid: "world".to_string(),
        key: key.to_string(),
    }
}
