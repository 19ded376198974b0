use serde::{Deserialize, Serialize};

use crate::core::error::{WorldError, WorldResult};
use crate::terrain::cell::CellSize;

pub const VIEW_DISTANCE_RANGE: (u32, u32) = (1, 20);
pub const BUDGET_RANGE: (u32, u32) = (1, 32);

// Which cells around the follower count as "within view"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewShape {
    // Chebyshev distance, a square of (2r + 1)^2 cells
    #[default]
    Square,
    // Euclidean distance measured between cell coordinates
    Circle,
}

/// Per-tick transition caps for one content grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleBudget {
    pub additions_per_frame: u32,
    pub removals_per_frame: u32,
}

impl Default for ThrottleBudget {
    fn default() -> Self {
        ThrottleBudget {
            additions_per_frame: 8,
            removals_per_frame: 8,
        }
    }
}

/// Streaming layout of a content grid. Edits only take effect after the grid
/// is refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub cell_size: CellSize,
    pub view_distance: u32,
    pub view_shape: ViewShape,
    pub additions_per_frame: u32,
    pub removals_per_frame: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        let budget = ThrottleBudget::default();
        GridSettings {
            cell_size: CellSize::Size32,
            view_distance: 4,
            view_shape: ViewShape::Square,
            additions_per_frame: budget.additions_per_frame,
            removals_per_frame: budget.removals_per_frame,
        }
    }
}

impl GridSettings {
    pub fn new(cell_size: CellSize, view_distance: u32) -> Self {
        GridSettings {
            cell_size,
            view_distance,
            ..Default::default()
        }
    }

    pub fn with_budget(mut self, additions_per_frame: u32, removals_per_frame: u32) -> Self {
        self.additions_per_frame = additions_per_frame;
        self.removals_per_frame = removals_per_frame;
        self
    }

    pub fn with_view_shape(mut self, view_shape: ViewShape) -> Self {
        self.view_shape = view_shape;
        self
    }

    pub fn budget(&self) -> ThrottleBudget {
        ThrottleBudget {
            additions_per_frame: self.additions_per_frame,
            removals_per_frame: self.removals_per_frame,
        }
    }

    pub fn validate(&self, grid: &str) -> WorldResult<()> {
        check_range(grid, "view_distance", self.view_distance, VIEW_DISTANCE_RANGE)?;
        check_range(grid, "additions_per_frame", self.additions_per_frame, BUDGET_RANGE)?;
        check_range(grid, "removals_per_frame", self.removals_per_frame, BUDGET_RANGE)?;
        Ok(())
    }
}

fn check_range(grid: &str, field: &str, value: u32, (min, max): (u32, u32)) -> WorldResult<()> {
    if value < min || value > max {
        return Err(WorldError::invalid(
            format!("{grid}.{field}"),
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}
