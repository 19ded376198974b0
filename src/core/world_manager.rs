use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::error::{WorldError, WorldResult};
use crate::core::event_bus::{EventBus, GridRefreshed};
use crate::terrain::cell::WorldPosition;
use crate::terrain::content_grid::{ContentGrid, GridTickReport};
use crate::terrain::noise::LayeredNoise;
use crate::threading::{CellCompletion, WorkerPool};

// World State Manager

// Owns every content grid and the worker pool
// Drives one reconcile pass per grid each tick
// Hands grids fresh snapshots of settings and world noise on refresh

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    pub world_name: String,
    pub seed: u64,
    // 0 picks one worker per core, minus the control thread
    pub num_threads: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        WorldSettings {
            world_name: "World".to_string(),
            seed: 0,
            num_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorldTickReport {
    pub tick: u64,
    pub grids: Vec<GridTickReport>,
}

impl WorldTickReport {
    pub fn grid(&self, name: &str) -> Option<&GridTickReport> {
        self.grids.iter().find(|report| report.grid == name)
    }

    // True once nothing is waiting or generating anywhere
    pub fn is_settled(&self) -> bool {
        self.grids.iter().all(|report| report.waiting == 0 && report.in_flight == 0)
    }
}

/// The world coordinator. Explicitly owned by whatever drives the tick loop.
pub struct WorldState {
    settings: WorldSettings,
    world_noise: LayeredNoise,
    world_noise_snapshot: Arc<LayeredNoise>,
    grids: Vec<ContentGrid>,
    pool: WorkerPool,
    events: EventBus,
    follower: WorldPosition,
    next_grid_id: u64,
    tick_count: u64,
}

impl WorldState {
    pub fn new(settings: WorldSettings, world_noise: LayeredNoise) -> WorldResult<Self> {
        world_noise.validate("world_noise")?;
        let pool = WorkerPool::new(settings.num_threads)?;
        info!(world = %settings.world_name, seed = settings.seed, threads = pool.num_threads(), "Created world");

        Ok(WorldState {
            world_noise_snapshot: Arc::new(world_noise.clone()),
            world_noise,
            settings,
            grids: Vec::new(),
            pool,
            events: EventBus::new(),
            follower: WorldPosition::default(),
            next_grid_id: 1,
            tick_count: 0,
        })
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn worker_count(&self) -> usize {
        self.pool.num_threads()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // Live world noise. Edits reach the grids on the next refresh.
    pub fn world_noise(&self) -> &LayeredNoise {
        &self.world_noise
    }

    pub fn world_noise_mut(&mut self) -> &mut LayeredNoise {
        &mut self.world_noise
    }

    // Register a grid; ticks visit grids in registration order
    pub fn add_content_grid(&mut self, mut grid: ContentGrid) -> WorldResult<()> {
        if self.grids.iter().any(|existing| existing.name() == grid.name()) {
            return Err(WorldError::DuplicateGrid(grid.name().to_string()));
        }
        grid.validate()?;

        let id = self.next_grid_id;
        self.next_grid_id += 1;
        grid.attach(id, self.settings.seed, Arc::clone(&self.world_noise_snapshot));
        info!(grid = %grid.name(), kind = grid.kind.label(), id, "Registered content grid");
        self.grids.push(grid);
        Ok(())
    }

    pub fn get_content_grid(&self, name: &str) -> WorldResult<&ContentGrid> {
        self.grids
            .iter()
            .find(|grid| grid.name() == name)
            .ok_or_else(|| WorldError::UnknownGrid(name.to_string()))
    }

    pub fn get_content_grid_mut(&mut self, name: &str) -> WorldResult<&mut ContentGrid> {
        self.grids
            .iter_mut()
            .find(|grid| grid.name() == name)
            .ok_or_else(|| WorldError::UnknownGrid(name.to_string()))
    }

    pub fn grid_names(&self) -> Vec<&str> {
        self.grids.iter().map(ContentGrid::name).collect()
    }

    pub fn grids(&self) -> &[ContentGrid] {
        &self.grids
    }

    pub fn follower(&self) -> WorldPosition {
        self.follower
    }

    pub fn set_follower(&mut self, position: WorldPosition) {
        self.follower = position;
    }

    // Move the follower, then tick
    pub fn update(&mut self, position: WorldPosition) -> WorldTickReport {
        self.set_follower(position);
        self.tick()
    }

    pub fn tick(&mut self) -> WorldTickReport {
        self.tick_count += 1;

        let mut by_grid: HashMap<u64, Vec<CellCompletion>> = HashMap::new();
        for completion in self.pool.drain_completions() {
            by_grid.entry(completion.grid_id).or_default().push(completion);
        }

        let mut report = WorldTickReport {
            tick: self.tick_count,
            grids: Vec::with_capacity(self.grids.len()),
        };
        for grid in &mut self.grids {
            let completions = by_grid.remove(&grid.id()).unwrap_or_default();
            report.grids.push(grid.tick(self.follower, completions, &self.pool, &self.events));
        }

        debug!(
            tick = self.tick_count,
            queued = report.grids.iter().map(|grid| grid.queued).sum::<usize>(),
            applied = report.grids.iter().map(|grid| grid.applied).sum::<usize>(),
            "World tick"
        );
        report
    }

    pub fn refresh_grid(&mut self, name: &str) -> WorldResult<()> {
        self.world_noise.validate("world_noise")?;
        self.world_noise_snapshot = Arc::new(self.world_noise.clone());

        let seed = self.settings.seed;
        let world_noise = Arc::clone(&self.world_noise_snapshot);
        let grid = self
            .grids
            .iter_mut()
            .find(|grid| grid.name() == name)
            .ok_or_else(|| WorldError::UnknownGrid(name.to_string()))?;
        let dropped = grid.refresh(seed, world_noise, &self.events)?;

        self.events.publish(GridRefreshed {
            grid: name.to_string(),
            dropped_cells: dropped,
        });
        info!(grid = name, dropped, "Grid refreshed");
        Ok(())
    }

    // Validates every grid before any of them is refreshed
    pub fn refresh_all(&mut self) -> WorldResult<()> {
        self.world_noise.validate("world_noise")?;
        for grid in &self.grids {
            grid.validate()?;
        }
        let names: Vec<String> = self.grids.iter().map(|grid| grid.name().to_string()).collect();
        for name in names {
            self.refresh_grid(&name)?;
        }
        Ok(())
    }

    pub fn shutdown(self) {
        info!(world = %self.settings.world_name, ticks = self.tick_count, "Shutting down world");
        self.pool.shutdown();
    }
}
