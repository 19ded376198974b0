pub mod error;
pub mod event_bus;
pub mod world_manager;

pub use error::{GenerationError, WorldError, WorldResult};
pub use event_bus::{CellApplied, CellRemoved, EventBus, GridRefreshed};
pub use world_manager::{WorldSettings, WorldState, WorldTickReport};
