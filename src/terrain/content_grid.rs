use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::core::error::{GenerationError, WorldResult};
use crate::core::event_bus::{CellApplied, CellRemoved, EventBus};
use crate::terrain::cell::{CellCoordinate, CellState, WorldPosition};
use crate::terrain::cell_manager::CellManager;
use crate::terrain::generation_rules::{PlacementRule, RuleChain, RuleConfig};
use crate::terrain::generation_utils::name_salt;
use crate::terrain::grid_index::desired_cells;
use crate::terrain::noise::LayeredNoise;
use crate::terrain::sprite_grid::{plot_sprites, MeshPlotterSettings};
use crate::terrain::terrain_config::GridSettings;
use crate::terrain::terrain_grid::{generate_height_field, HeightField, TerrainSettings};
use crate::terrain::trees_grid::{plot_trees, TreesSettings};
use crate::threading::{CellCompletion, WorkerPool};

/// One placed sprite or model, ready for instancing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedInstance {
    pub position: [f32; 3],
    pub scale: f32,
    // Yaw in radians
    pub rotation: f32,
    // Sprite id or model name
    pub source: String,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellPayload {
    Terrain(HeightField),
    Instances(Vec<PlacedInstance>),
}

impl CellPayload {
    pub fn instance_count(&self) -> usize {
        match self {
            CellPayload::Terrain(_) => 0,
            CellPayload::Instances(instances) => instances.len(),
        }
    }

    pub fn as_height_field(&self) -> Option<&HeightField> {
        match self {
            CellPayload::Terrain(field) => Some(field),
            CellPayload::Instances(_) => None,
        }
    }

    pub fn as_instances(&self) -> Option<&[PlacedInstance]> {
        match self {
            CellPayload::Terrain(_) => None,
            CellPayload::Instances(instances) => Some(instances),
        }
    }
}

// The closed set of content generators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridKind {
    Terrain(TerrainSettings),
    Sprite(MeshPlotterSettings),
    Trees(TreesSettings),
}

impl GridKind {
    pub fn label(&self) -> &'static str {
        match self {
            GridKind::Terrain(_) => "terrain",
            GridKind::Sprite(_) => "sprite",
            GridKind::Trees(_) => "trees",
        }
    }
}

/// Immutable view of a grid handed to workers. Taken on registration and on
/// every refresh.
#[derive(Debug)]
pub struct GridSnapshot {
    pub name: String,
    pub salt: u64,
    pub world_seed: u64,
    pub settings: GridSettings,
    pub kind: GridKind,
    // The grid's own noise; drives sprite size and the rule metric
    pub noise: LayeredNoise,
    pub rules: RuleChain,
    pub world_noise: Arc<LayeredNoise>,
}

impl GridSnapshot {
    pub fn generate_cell(&self, coord: CellCoordinate) -> Result<CellPayload, GenerationError> {
        match &self.kind {
            GridKind::Terrain(settings) => generate_height_field(self, settings, coord).map(CellPayload::Terrain),
            GridKind::Sprite(settings) => plot_sprites(self, settings, coord).map(CellPayload::Instances),
            GridKind::Trees(settings) => plot_trees(self, settings, coord).map(CellPayload::Instances),
        }
    }
}

// Per-grid counters for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridTickReport {
    pub grid: String,
    pub queued: usize,
    pub dispatched: usize,
    pub applied: usize,
    pub discarded_stale: usize,
    pub failed: usize,
    pub unloaded: usize,
    pub waiting: usize,
    pub in_flight: usize,
    pub loaded: usize,
}

/// A streaming layer: live settings that callers edit, plus the snapshot and
/// cells that reflect the settings as of the last refresh.
#[derive(Debug)]
pub struct ContentGrid {
    name: String,
    pub settings: GridSettings,
    pub kind: GridKind,
    pub noise: LayeredNoise,
    rule_configs: Vec<RuleConfig>,
    rules: RuleChain,

    id: u64,
    snapshot: Option<Arc<GridSnapshot>>,
    cells: CellManager,
}

impl ContentGrid {
    pub fn new(name: impl Into<String>, settings: GridSettings, kind: GridKind) -> Self {
        ContentGrid {
            name: name.into(),
            settings,
            kind,
            noise: LayeredNoise::new(),
            rule_configs: Vec::new(),
            rules: RuleChain::new(),
            id: 0,
            snapshot: None,
            cells: CellManager::new(),
        }
    }

    pub fn with_noise(mut self, noise: LayeredNoise) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_rules(mut self, rules: &[RuleConfig]) -> Self {
        self.set_rules(rules);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rule_configs(&self) -> &[RuleConfig] {
        &self.rule_configs
    }

    pub fn rules(&self) -> &RuleChain {
        &self.rules
    }

    // Replaces every rule, including programmatic ones
    pub fn set_rules(&mut self, rules: &[RuleConfig]) {
        self.rule_configs = rules.to_vec();
        self.rules = RuleChain::from_configs(rules);
    }

    pub fn add_rule(&mut self, rule: Arc<dyn PlacementRule>) {
        self.rules.push(rule);
    }

    pub fn state(&self, coord: &CellCoordinate) -> CellState {
        self.cells.state(coord)
    }

    pub fn payload(&self, coord: &CellCoordinate) -> Option<&Arc<CellPayload>> {
        self.cells.payload(coord)
    }

    pub fn loaded(&self) -> impl Iterator<Item = (CellCoordinate, &Arc<CellPayload>)> {
        self.cells.loaded()
    }

    pub fn loaded_count(&self) -> usize {
        self.cells.loaded_count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.cells.in_flight_count()
    }

    // Settings the cells were generated with, which may lag the live ones
    pub fn active_settings(&self) -> &GridSettings {
        self.snapshot.as_ref().map_or(&self.settings, |snapshot| &snapshot.settings)
    }

    pub fn validate(&self) -> WorldResult<()> {
        self.settings.validate(&self.name)?;
        self.noise.validate(&self.name)?;
        for rule in &self.rule_configs {
            rule.validate(&self.name)?;
        }
        match &self.kind {
            GridKind::Terrain(settings) => settings.validate(&self.name, self.settings.cell_size),
            GridKind::Sprite(settings) => settings.validate(&self.name, self.settings.cell_size.units()),
            GridKind::Trees(settings) => settings.validate(&self.name),
        }
    }

    pub fn snapshot_with(&self, world_seed: u64, world_noise: Arc<LayeredNoise>) -> GridSnapshot {
        GridSnapshot {
            name: self.name.clone(),
            salt: name_salt(&self.name),
            world_seed,
            settings: self.settings.clone(),
            kind: self.kind.clone(),
            noise: self.noise.clone(),
            rules: self.rules.clone(),
            world_noise,
        }
    }

    pub(crate) fn attach(&mut self, id: u64, world_seed: u64, world_noise: Arc<LayeredNoise>) {
        self.id = id;
        self.snapshot = Some(Arc::new(self.snapshot_with(world_seed, world_noise)));
    }

    // Drop every cell and take a new snapshot of the live settings. Results
    // still in flight come back stale.
    pub(crate) fn refresh(&mut self, world_seed: u64, world_noise: Arc<LayeredNoise>, events: &EventBus) -> WorldResult<usize> {
        self.validate()?;
        let dropped = self.cells.clear();
        for coord in &dropped {
            events.publish(CellRemoved {
                grid: self.name.clone(),
                coord: *coord,
            });
        }
        self.snapshot = Some(Arc::new(self.snapshot_with(world_seed, world_noise)));
        debug!(grid = %self.name, dropped = dropped.len(), "Refreshed content grid");
        Ok(dropped.len())
    }

    // One reconcile pass: apply finished work, unload and admit within the
    // budgets, then hand admitted cells to the workers
    pub(crate) fn tick(
        &mut self,
        follower: WorldPosition,
        completions: Vec<CellCompletion>,
        pool: &WorkerPool,
        events: &EventBus,
    ) -> GridTickReport {
        let mut report = GridTickReport {
            grid: self.name.clone(),
            ..Default::default()
        };
        let Some(snapshot) = self.snapshot.clone() else {
            return report;
        };

        let settings = &snapshot.settings;
        let desired = desired_cells(follower, settings.cell_size, settings.view_distance, settings.view_shape);
        let centre = follower.cell(settings.cell_size);
        let outcome = self.cells.reconcile(centre, &desired, completions, settings.budget());

        for (coord, payload) in outcome.applied.iter() {
            events.publish(CellApplied {
                grid: self.name.clone(),
                coord: *coord,
                payload: Arc::clone(payload),
            });
        }
        for (coord, error) in &outcome.failures {
            warn!(grid = %self.name, %coord, %error, "Cell generation failed; retrying next tick");
        }
        if outcome.discarded_stale > 0 {
            trace!(grid = %self.name, count = outcome.discarded_stale, "Discarded stale cell results");
        }
        for coord in &outcome.removed {
            events.publish(CellRemoved {
                grid: self.name.clone(),
                coord: *coord,
            });
        }

        for (coord, epoch) in &outcome.admitted {
            if self.cells.mark_generating(coord, *epoch) {
                pool.spawn_generation(self.id, *coord, *epoch, Arc::clone(&snapshot));
                report.dispatched += 1;
            }
        }

        report.queued = outcome.admitted.len();
        report.applied = outcome.applied.len();
        report.discarded_stale = outcome.discarded_stale;
        report.failed = outcome.failures.len();
        report.unloaded = outcome.removed.len();
        report.waiting = outcome.waiting;
        report.in_flight = self.cells.in_flight_count();
        report.loaded = self.cells.loaded_count();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::cell::CellSize;
    use crate::terrain::noise::NoiseLayer;
    use crate::terrain::trees_grid::PlottedModel;

    #[test]
    fn test_dispatch_by_kind() {
        let world = Arc::new(LayeredNoise::new().with_layer(NoiseLayer::new("base", 1).with_strength(20.0)));
        let coord = CellCoordinate::new(0, 0);

        let terrain = ContentGrid::new("Terrain", GridSettings::new(CellSize::Size16, 1), GridKind::Terrain(TerrainSettings::default()));
        let payload = terrain.snapshot_with(1, Arc::clone(&world)).generate_cell(coord).unwrap();
        assert_eq!(payload.as_height_field().map(|field| field.samples_per_side), Some(5));

        let trees = ContentGrid::new(
            "Trees",
            GridSettings::new(CellSize::Size64, 1),
            GridKind::Trees(TreesSettings::default().with_model(PlottedModel::new("Oak"))),
        );
        let payload = trees.snapshot_with(1, world).generate_cell(coord).unwrap();
        assert!(payload.as_instances().is_some());
    }

    #[test]
    fn test_validate_names_grid() {
        let grid = ContentGrid::new(
            "Grass",
            GridSettings::new(CellSize::Size32, 30),
            GridKind::Sprite(MeshPlotterSettings::default()),
        );
        let err = grid.validate().unwrap_err();
        assert!(err.to_string().contains("Grass.view_distance"));
    }

    #[test]
    fn test_kind_toml_tag() {
        let kind: GridKind = toml::from_str("kind = \"terrain\"\nstep = 8\n").unwrap();
        assert_eq!(kind, GridKind::Terrain(TerrainSettings { step: 8 }));
        assert_eq!(kind.label(), "terrain");
    }

    #[test]
    fn test_applied_events_follow_admission_order() {
        let pool = WorkerPool::new(1).unwrap();
        let events = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        events.subscribe::<CellApplied>(Arc::new(move |event: &CellApplied| {
            sink.lock().unwrap().push(event.coord);
        }));

        let mut grid = ContentGrid::new("Terrain", GridSettings::new(CellSize::Size16, 1), GridKind::Terrain(TerrainSettings::default()));
        grid.attach(1, 0, Arc::new(LayeredNoise::new()));
        let follower = WorldPosition::new(8.0, 0.0, 8.0);
        let first = grid.tick(follower, Vec::new(), &pool, &events);
        assert_eq!(first.dispatched, 9);

        // Hand results back farthest first; the pool's own results are never drained
        let desired = desired_cells(follower, CellSize::Size16, 1, grid.settings.view_shape);
        let snapshot = grid.snapshot_with(0, Arc::new(LayeredNoise::new()));
        let completions: Vec<CellCompletion> = desired
            .iter()
            .rev()
            .map(|coord| CellCompletion {
                grid_id: 1,
                coord: *coord,
                epoch: grid.cells.entry(coord).unwrap().epoch,
                result: snapshot.generate_cell(*coord).map(Arc::new),
            })
            .collect();
        let report = grid.tick(follower, completions, &pool, &events);

        assert_eq!(report.applied, 9);
        assert_eq!(*order.lock().unwrap(), desired);
        pool.shutdown();
    }

    #[test]
    fn test_active_settings_lag_live_edits() {
        let mut grid = ContentGrid::new("Terrain", GridSettings::new(CellSize::Size32, 2), GridKind::Terrain(TerrainSettings::default()));
        grid.attach(1, 0, Arc::new(LayeredNoise::new()));
        grid.settings.view_distance = 6;
        assert_eq!(grid.active_settings().view_distance, 2);

        let events = EventBus::new();
        grid.refresh(0, Arc::new(LayeredNoise::new()), &events).unwrap();
        assert_eq!(grid.active_settings().view_distance, 6);
    }
}
