// Export all components from the terrain module
pub mod cell;
pub mod cell_manager;
pub mod content_grid;
pub mod generation_rules;
pub mod generation_utils;
pub mod grid_index;
pub mod noise;
pub mod sprite_grid;
pub mod terrain_config;
pub mod terrain_grid;
pub mod trees_grid;

// Re-export main types for easier access
pub use cell::{CellCoordinate, CellSize, CellState, WorldPosition};
pub use content_grid::{CellPayload, ContentGrid, GridKind, GridTickReport, PlacedInstance};
pub use generation_rules::{PathsRule, PlacementCandidate, PlacementRule, RuleChain, RuleConfig, RuleVerdict};
pub use sprite_grid::MeshPlotterSettings;
pub use terrain_config::{GridSettings, ThrottleBudget, ViewShape};
pub use terrain_grid::{HeightField, TerrainSettings};
pub use trees_grid::{AttemptBudget, PlottedModel, TreesSettings};
