use serde::{Deserialize, Serialize};

use crate::core::error::{GenerationError, WorldError, WorldResult};
use crate::terrain::cell::{CellCoordinate, CellSize};
use crate::terrain::content_grid::GridSnapshot;

pub const ALLOWED_STEPS: [u32; 4] = [1, 2, 4, 8];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    // Distance between height samples in world units
    pub step: u32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings { step: 4 }
    }
}

impl TerrainSettings {
    pub fn validate(&self, grid: &str, cell_size: CellSize) -> WorldResult<()> {
        if !ALLOWED_STEPS.contains(&self.step) {
            return Err(WorldError::invalid(format!("{grid}.step"), format!("{} is not one of {ALLOWED_STEPS:?}", self.step)));
        }
        if cell_size.units() % self.step != 0 {
            return Err(WorldError::invalid(
                format!("{grid}.step"),
                format!("{} does not divide the cell size {}", self.step, cell_size.units()),
            ));
        }
        Ok(())
    }
}

/// Height samples over one cell, including the far edges so neighbouring
/// cells share their border vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    pub coord: CellCoordinate,
    pub cell_size: CellSize,
    pub step: u32,
    pub samples_per_side: usize,
    // Row-major, z then x
    pub heights: Vec<f32>,
    pub min_height: f32,
    pub max_height: f32,
}

impl HeightField {
    pub fn height_at(&self, ix: usize, iz: usize) -> Option<f32> {
        if ix >= self.samples_per_side || iz >= self.samples_per_side {
            return None;
        }
        self.heights.get(iz * self.samples_per_side + ix).copied()
    }

    // World-space position of a vertex
    pub fn vertex(&self, ix: usize, iz: usize) -> Option<[f32; 3]> {
        let height = self.height_at(ix, iz)?;
        let (ox, oz) = self.coord.origin(self.cell_size);
        let step = self.step as f32;
        Some([ox + ix as f32 * step, height, oz + iz as f32 * step])
    }
}

pub fn generate_height_field(
    snapshot: &GridSnapshot,
    settings: &TerrainSettings,
    coord: CellCoordinate,
) -> Result<HeightField, GenerationError> {
    let cell_size = snapshot.settings.cell_size;
    let units = cell_size.units();
    if settings.step == 0 || units % settings.step != 0 {
        return Err(GenerationError::InvalidSettings(format!(
            "step {} does not divide cell size {units}",
            settings.step
        )));
    }

    let samples_per_side = (units / settings.step) as usize + 1;
    let (origin_x, origin_z) = coord.origin(cell_size);
    let step = settings.step as f32;

    let mut heights = Vec::with_capacity(samples_per_side * samples_per_side);
    let mut min_height = f32::INFINITY;
    let mut max_height = f32::NEG_INFINITY;
    for iz in 0..samples_per_side {
        for ix in 0..samples_per_side {
            let x = origin_x + ix as f32 * step;
            let z = origin_z + iz as f32 * step;
            let height = snapshot.world_noise.sample(x, z);
            if !height.is_finite() {
                return Err(GenerationError::NonFiniteSample { x, z });
            }
            min_height = min_height.min(height);
            max_height = max_height.max(height);
            heights.push(height);
        }
    }

    Ok(HeightField {
        coord,
        cell_size,
        step: settings.step,
        samples_per_side,
        heights,
        min_height,
        max_height,
    })
}
