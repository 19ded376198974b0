use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::core::error::{GenerationError, WorldError, WorldResult};
use crate::terrain::cell::CellCoordinate;
use crate::terrain::content_grid::{GridSnapshot, PlacedInstance};
use crate::terrain::generation_rules::PlacementCandidate;
use crate::terrain::generation_utils::cell_rng;
use crate::terrain::noise::noise_utils::lerp;

pub const MAX_INSTANCES_PER_CELL: usize = 65_536;

pub const SIZE_RANGE: (f32, f32) = (0.01, 3.0);
pub const DENSITY_RANGE: (f32, f32) = (0.1, 16.0);
pub const WORLD_HEIGHT_RANGE: (f32, f32) = (0.0, 256.0);
pub const DEVIATION_RANGE: (f32, f32) = (0.0, 10.0);

/// Bounds for scattering sprites (grass, flowers) over a cell.
///
/// `density` is the expected number of instances per square unit before the
/// height band and placement rules thin them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshPlotterSettings {
    pub sprite: String,
    pub min_size: f32,
    pub max_size: f32,
    pub density: f32,
    pub min_world_height: f32,
    pub min_height_deviation: f32,
    pub max_world_height: f32,
    pub max_height_deviation: f32,
}

impl Default for MeshPlotterSettings {
    fn default() -> Self {
        MeshPlotterSettings {
            sprite: "sprite".to_string(),
            min_size: 0.5,
            max_size: 1.0,
            density: 1.0,
            min_world_height: 0.0,
            min_height_deviation: 0.0,
            max_world_height: 256.0,
            max_height_deviation: 0.0,
        }
    }
}

impl MeshPlotterSettings {
    pub fn validate(&self, grid: &str, cell_units: u32) -> WorldResult<()> {
        check(grid, "min_size", self.min_size, SIZE_RANGE)?;
        check(grid, "max_size", self.max_size, SIZE_RANGE)?;
        check(grid, "density", self.density, DENSITY_RANGE)?;
        check(grid, "min_world_height", self.min_world_height, WORLD_HEIGHT_RANGE)?;
        check(grid, "max_world_height", self.max_world_height, WORLD_HEIGHT_RANGE)?;
        check(grid, "min_height_deviation", self.min_height_deviation, DEVIATION_RANGE)?;
        check(grid, "max_height_deviation", self.max_height_deviation, DEVIATION_RANGE)?;
        if self.min_size > self.max_size {
            return Err(WorldError::invalid(format!("{grid}.min_size"), "must not exceed max_size"));
        }
        if self.min_world_height > self.max_world_height {
            return Err(WorldError::invalid(format!("{grid}.min_world_height"), "must not exceed max_world_height"));
        }
        let per_side = self.points_per_side(cell_units);
        if per_side * per_side > MAX_INSTANCES_PER_CELL {
            return Err(WorldError::invalid(
                format!("{grid}.density"),
                format!("{} sample points per cell exceeds {MAX_INSTANCES_PER_CELL}", per_side * per_side),
            ));
        }
        Ok(())
    }

    // Sample points along one side of the cell. The spacing is rounded so a
    // whole number of points fits, which keeps the realised spacing within
    // 0.5 / n (relative) of 1 / sqrt(density).
    pub fn points_per_side(&self, cell_units: u32) -> usize {
        let ideal = cell_units as f32 * self.density.max(0.0).sqrt();
        (ideal.round() as usize).max(1)
    }

    pub fn spacing(&self, cell_units: u32) -> f32 {
        cell_units as f32 / self.points_per_side(cell_units) as f32
    }
}

fn check(grid: &str, field: &str, value: f32, (min, max): (f32, f32)) -> WorldResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(WorldError::invalid(format!("{grid}.{field}"), format!("{value} is outside {min}..={max}")));
    }
    Ok(())
}

// Scatter sprites over a regular sub-grid of the cell. No spacing is
// enforced between sprites; density alone controls packing.
pub fn plot_sprites(
    snapshot: &GridSnapshot,
    settings: &MeshPlotterSettings,
    coord: CellCoordinate,
) -> Result<Vec<PlacedInstance>, GenerationError> {
    if !(settings.density.is_finite() && settings.density > 0.0) {
        return Err(GenerationError::InvalidSettings(format!("density {} must be positive", settings.density)));
    }
    let cell_units = snapshot.settings.cell_size.units();
    let per_side = settings.points_per_side(cell_units);
    let count = per_side * per_side;
    if count > MAX_INSTANCES_PER_CELL {
        return Err(GenerationError::TooManyInstances { count, limit: MAX_INSTANCES_PER_CELL });
    }

    let spacing = cell_units as f32 / per_side as f32;
    let (origin_x, origin_z) = coord.origin(snapshot.settings.cell_size);
    let mut rng = cell_rng(snapshot.world_seed, snapshot.salt, coord, 0);
    let mut instances = Vec::new();

    for iz in 0..per_side {
        for ix in 0..per_side {
            let x = origin_x + (ix as f32 + 0.5) * spacing;
            let z = origin_z + (iz as f32 + 0.5) * spacing;
            let height = snapshot.world_noise.sample(x, z);
            if !height.is_finite() {
                return Err(GenerationError::NonFiniteSample { x, z });
            }

            // Each instance gets its own band edges
            let low = settings.min_world_height + jitter(&mut rng, settings.min_height_deviation);
            let high = settings.max_world_height + jitter(&mut rng, settings.max_height_deviation);
            if height < low || height > high {
                continue;
            }

            let metric = snapshot.noise.normalized(x, z);
            let candidate = PlacementCandidate { x, z, height, metric };
            if !snapshot.rules.allows(&candidate, &mut rng) {
                continue;
            }

            instances.push(PlacedInstance {
                position: [x, height, z],
                scale: lerp(settings.min_size, settings.max_size, metric),
                rotation: rng.random::<f32>() * TAU,
                source: settings.sprite.clone(),
                radius: 0.0,
            });
        }
    }

    Ok(instances)
}

// Uniform in [-deviation, deviation]
fn jitter<R: Rng>(rng: &mut R, deviation: f32) -> f32 {
    (rng.random::<f32>() * 2.0 - 1.0) * deviation
}
