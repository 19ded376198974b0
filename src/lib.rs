//! Paged world streaming and procedural content placement.
//!
//! A [`WorldState`] owns a set of content grids (terrain, sprites, trees).
//! Each tick it works out which cells every grid wants around the follower,
//! admits and unloads cells within per-grid budgets, and hands generation to
//! a worker pool whose results are applied back on the calling thread.

pub mod bridge;
pub mod config;
pub mod core;
pub mod terrain;
pub mod threading;

pub use crate::bridge::{PropertyValue, SettingsBridge};
pub use crate::config::{GridConfig, WorldConfig};
pub use crate::core::{CellApplied, CellRemoved, EventBus, GenerationError, GridRefreshed, WorldError, WorldResult};
pub use crate::core::{WorldSettings, WorldState, WorldTickReport};
pub use crate::terrain::{
    AttemptBudget, CellCoordinate, CellPayload, CellSize, CellState, ContentGrid, GridKind, GridSettings, GridTickReport,
    HeightField, MeshPlotterSettings, PathsRule, PlacedInstance, PlacementCandidate, PlacementRule, PlottedModel,
    RuleConfig, RuleVerdict, TerrainSettings, TreesSettings, ViewShape, WorldPosition,
};
pub use crate::terrain::noise::{LayerBlend, LayeredNoise, NoiseLayer};
