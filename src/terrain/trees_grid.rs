use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::TAU;

use crate::core::error::{GenerationError, WorldError, WorldResult};
use crate::terrain::cell::CellCoordinate;
use crate::terrain::content_grid::{GridSnapshot, PlacedInstance};
use crate::terrain::generation_rules::PlacementCandidate;
use crate::terrain::generation_utils::cell_rng;
use crate::terrain::noise::noise_utils::lerp;

pub const TREE_SIZE_RANGE: (f32, f32) = (0.1, 32.0);
pub const TREE_HEIGHT_RANGE: (f32, f32) = (0.0, 128.0);
pub const ATTEMPTS_RANGE: (u32, u32) = (1, 5000);

/// One placeable model and the rules it is scattered by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlottedModel {
    pub name: String,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_space_between: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub likelihood: f32,
    pub max_attempts: u32,
}

impl Default for PlottedModel {
    fn default() -> Self {
        PlottedModel {
            name: "model".to_string(),
            min_radius: 1.0,
            max_radius: 2.0,
            min_space_between: 2.0,
            min_scale: 1.0,
            max_scale: 1.0,
            min_height: 0.0,
            max_height: 128.0,
            likelihood: 1.0,
            max_attempts: 32,
        }
    }
}

impl PlottedModel {
    pub fn new(name: impl Into<String>) -> Self {
        PlottedModel {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self, grid: &str) -> WorldResult<()> {
        let owner = format!("{grid}.trees.{}", self.name);
        check(&owner, "min_radius", self.min_radius, TREE_SIZE_RANGE)?;
        check(&owner, "max_radius", self.max_radius, TREE_SIZE_RANGE)?;
        check(&owner, "min_space_between", self.min_space_between, TREE_SIZE_RANGE)?;
        check(&owner, "min_scale", self.min_scale, TREE_SIZE_RANGE)?;
        check(&owner, "max_scale", self.max_scale, TREE_SIZE_RANGE)?;
        check(&owner, "min_height", self.min_height, TREE_HEIGHT_RANGE)?;
        check(&owner, "max_height", self.max_height, TREE_HEIGHT_RANGE)?;
        check(&owner, "likelihood", self.likelihood, (0.0, 1.0))?;
        if self.max_attempts < ATTEMPTS_RANGE.0 || self.max_attempts > ATTEMPTS_RANGE.1 {
            return Err(WorldError::invalid(
                format!("{owner}.max_attempts"),
                format!("{} is outside {}..={}", self.max_attempts, ATTEMPTS_RANGE.0, ATTEMPTS_RANGE.1),
            ));
        }
        if self.min_radius > self.max_radius {
            return Err(WorldError::invalid(format!("{owner}.min_radius"), "must not exceed max_radius"));
        }
        if self.min_scale > self.max_scale {
            return Err(WorldError::invalid(format!("{owner}.min_scale"), "must not exceed max_scale"));
        }
        if self.min_height > self.max_height {
            return Err(WorldError::invalid(format!("{owner}.min_height"), "must not exceed max_height"));
        }
        Ok(())
    }
}

fn check(owner: &str, field: &str, value: f32, (min, max): (f32, f32)) -> WorldResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(WorldError::invalid(format!("{owner}.{field}"), format!("{value} is outside {min}..={max}")));
    }
    Ok(())
}

// How rejection-sampling attempts are spent in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptBudget {
    // Each model spends its own `max_attempts` on its own random stream
    #[default]
    PerType,
    // One stream and this many attempts per cell, models taking turns in
    // declaration order
    Shared(u32),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreesSettings {
    pub attempt_budget: AttemptBudget,
    pub models: Vec<PlottedModel>,
}

impl TreesSettings {
    pub fn with_model(mut self, model: PlottedModel) -> Self {
        self.models.push(model);
        self
    }

    pub fn model(&self, name: &str) -> Option<&PlottedModel> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut PlottedModel> {
        self.models.iter_mut().find(|model| model.name == name)
    }

    pub fn validate(&self, grid: &str) -> WorldResult<()> {
        for model in &self.models {
            model.validate(grid)?;
        }
        if let AttemptBudget::Shared(attempts) = self.attempt_budget {
            if attempts < ATTEMPTS_RANGE.0 || attempts > ATTEMPTS_RANGE.1 {
                return Err(WorldError::invalid(
                    format!("{grid}.attempt_budget"),
                    format!("{attempts} is outside {}..={}", ATTEMPTS_RANGE.0, ATTEMPTS_RANGE.1),
                ));
            }
        }
        Ok(())
    }
}

// Accepted instance together with the numbers its clearance is checked with
#[derive(Debug, Clone)]
struct Footprint {
    instance: PlacedInstance,
    min_radius: f32,
    min_space: f32,
}

impl Footprint {
    fn clearance(&self, min_radius: f32, min_space: f32) -> f32 {
        (self.min_radius + min_radius).max(self.min_space.max(min_space))
    }

    fn blocks(&self, x: f32, z: f32, min_radius: f32, min_space: f32) -> bool {
        let dx = self.instance.position[0] - x;
        let dz = self.instance.position[2] - z;
        let clearance = self.clearance(min_radius, min_space);
        dx * dx + dz * dz < clearance * clearance
    }
}

// Cells settle in four phases by coordinate parity. Adjacent cells never
// share a phase, so every neighbour pair has a fixed order.
fn phase(coord: CellCoordinate) -> u8 {
    ((coord.x.rem_euclid(2) as u8) << 1) | coord.z.rem_euclid(2) as u8
}

// Rejection-sample trees in a cell. Trees already settled in the neighbours
// of an earlier phase count as accepted from the first attempt on, and those
// neighbours are recomputed here, so the result never depends on which cell
// generated first.
pub fn plot_trees(
    snapshot: &GridSnapshot,
    settings: &TreesSettings,
    coord: CellCoordinate,
) -> Result<Vec<PlacedInstance>, GenerationError> {
    if settings.models.is_empty() {
        return Ok(Vec::new());
    }
    let mut settled = HashMap::new();
    let own = settle(snapshot, settings, coord, &mut settled)?;
    Ok(own.into_iter().map(|tree| tree.instance).collect())
}

// Final trees of a cell, memoised per call. Recursion only moves to lower
// phases, so it is at most four levels deep.
fn settle(
    snapshot: &GridSnapshot,
    settings: &TreesSettings,
    coord: CellCoordinate,
    settled: &mut HashMap<CellCoordinate, Vec<Footprint>>,
) -> Result<Vec<Footprint>, GenerationError> {
    if let Some(trees) = settled.get(&coord) {
        return Ok(trees.clone());
    }
    let mut blockers = Vec::new();
    for neighbour in coord.neighbours().filter(|n| phase(*n) < phase(coord)) {
        blockers.extend(settle(snapshot, settings, neighbour, settled)?);
    }
    let own = sample_cell(snapshot, settings, coord, blockers)?;
    settled.insert(coord, own.clone());
    Ok(own)
}

fn sample_cell(
    snapshot: &GridSnapshot,
    settings: &TreesSettings,
    coord: CellCoordinate,
    blockers: Vec<Footprint>,
) -> Result<Vec<Footprint>, GenerationError> {
    let first_own = blockers.len();
    let mut accepted = blockers;

    match settings.attempt_budget {
        AttemptBudget::PerType => {
            for (index, model) in settings.models.iter().enumerate() {
                let mut rng = cell_rng(snapshot.world_seed, snapshot.salt, coord, index as u64 + 1);
                for _ in 0..model.max_attempts {
                    attempt(snapshot, model, coord, &mut rng, &mut accepted)?;
                }
            }
        }
        AttemptBudget::Shared(attempts) => {
            let mut rng = cell_rng(snapshot.world_seed, snapshot.salt, coord, 0);
            for turn in 0..attempts as usize {
                let model = &settings.models[turn % settings.models.len()];
                attempt(snapshot, model, coord, &mut rng, &mut accepted)?;
            }
        }
    }

    Ok(accepted.split_off(first_own))
}

fn attempt(
    snapshot: &GridSnapshot,
    model: &PlottedModel,
    coord: CellCoordinate,
    rng: &mut ChaCha8Rng,
    accepted: &mut Vec<Footprint>,
) -> Result<(), GenerationError> {
    let cell_units = snapshot.settings.cell_size.units() as f32;
    let (origin_x, origin_z) = coord.origin(snapshot.settings.cell_size);
    let x = origin_x + rng.random::<f32>() * cell_units;
    let z = origin_z + rng.random::<f32>() * cell_units;

    let height = snapshot.world_noise.sample(x, z);
    if !height.is_finite() {
        return Err(GenerationError::NonFiniteSample { x, z });
    }
    if height < model.min_height || height > model.max_height {
        return Ok(());
    }
    if rng.random::<f32>() >= model.likelihood {
        return Ok(());
    }

    let metric = snapshot.noise.normalized(x, z);
    if !snapshot.rules.allows(&PlacementCandidate { x, z, height, metric }, rng) {
        return Ok(());
    }
    if accepted.iter().any(|other| other.blocks(x, z, model.min_radius, model.min_space_between)) {
        return Ok(());
    }

    let scale = lerp(model.min_scale, model.max_scale, rng.random());
    let radius = lerp(model.min_radius, model.max_radius, rng.random());
    let rotation = rng.random::<f32>() * TAU;
    accepted.push(Footprint {
        instance: PlacedInstance {
            position: [x, height, z],
            scale,
            rotation,
            source: model.name.clone(),
            radius,
        },
        min_radius: model.min_radius,
        min_space: model.min_space_between,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::cell::CellSize;
    use crate::terrain::content_grid::{ContentGrid, GridKind};
    use crate::terrain::noise::LayeredNoise;
    use crate::terrain::terrain_config::GridSettings;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn forest(budget: AttemptBudget) -> TreesSettings {
        TreesSettings {
            attempt_budget: budget,
            models: vec![
                PlottedModel {
                    min_radius: 2.0,
                    max_radius: 3.0,
                    min_space_between: 4.0,
                    likelihood: 0.8,
                    max_attempts: 64,
                    ..PlottedModel::new("Fir")
                },
                PlottedModel {
                    min_radius: 3.0,
                    max_radius: 4.0,
                    min_space_between: 6.0,
                    likelihood: 0.5,
                    max_attempts: 64,
                    ..PlottedModel::new("Oak")
                },
            ],
        }
    }

    fn snapshot(settings: &TreesSettings, seed: u64) -> GridSnapshot {
        let grid = ContentGrid::new("Trees", GridSettings::new(CellSize::Size32, 2), GridKind::Trees(settings.clone()));
        grid.snapshot_with(seed, Arc::new(LayeredNoise::new()))
    }

    fn distance(a: &PlacedInstance, b: &PlacedInstance) -> f32 {
        let dx = a.position[0] - b.position[0];
        let dz = a.position[2] - b.position[2];
        (dx * dx + dz * dz).sqrt()
    }

    fn clearance(settings: &TreesSettings, a: &PlacedInstance, b: &PlacedInstance) -> f32 {
        let ma = settings.model(&a.source).unwrap();
        let mb = settings.model(&b.source).unwrap();
        (ma.min_radius + mb.min_radius).max(ma.min_space_between.max(mb.min_space_between))
    }

    #[test]
    fn test_repeatable_placement() {
        let settings = forest(AttemptBudget::PerType);
        let snap = snapshot(&settings, 123);
        let a = plot_trees(&snap, &settings, CellCoordinate::new(3, -4)).unwrap();
        let b = plot_trees(&snap, &settings, CellCoordinate::new(3, -4)).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);

        let other_seed = plot_trees(&snapshot(&settings, 124), &settings, CellCoordinate::new(3, -4)).unwrap();
        assert_ne!(a, other_seed);
    }

    #[test]
    fn test_instances_inside_cell_with_drawn_ranges() {
        let settings = forest(AttemptBudget::PerType);
        let snap = snapshot(&settings, 9);
        for tree in plot_trees(&snap, &settings, CellCoordinate::new(0, 0)).unwrap() {
            assert!((0.0..32.0).contains(&tree.position[0]));
            assert!((0.0..32.0).contains(&tree.position[2]));
            let model = settings.model(&tree.source).unwrap();
            assert!(tree.radius >= model.min_radius && tree.radius <= model.max_radius);
            assert!(tree.scale >= model.min_scale && tree.scale <= model.max_scale);
        }
    }

    #[test]
    fn test_height_band_filters_everything() {
        let mut settings = forest(AttemptBudget::PerType);
        for model in &mut settings.models {
            // Flat world sits at 0
            model.min_height = 10.0;
        }
        let snap = snapshot(&settings, 1);
        assert!(plot_trees(&snap, &settings, CellCoordinate::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_zero_likelihood_places_nothing() {
        let mut settings = forest(AttemptBudget::Shared(200));
        for model in &mut settings.models {
            model.likelihood = 0.0;
        }
        let snap = snapshot(&settings, 1);
        assert!(plot_trees(&snap, &settings, CellCoordinate::new(1, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_budget_modes_differ() {
        let per_type = forest(AttemptBudget::PerType);
        let shared = forest(AttemptBudget::Shared(128));
        let coord = CellCoordinate::new(2, 5);
        let a = plot_trees(&snapshot(&per_type, 5), &per_type, coord).unwrap();
        let b = plot_trees(&snapshot(&shared, 5), &shared, coord).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_shared_budget_caps_attempts() {
        let mut settings = forest(AttemptBudget::Shared(3));
        for model in &mut settings.models {
            model.likelihood = 1.0;
        }
        let snap = snapshot(&settings, 77);
        assert!(plot_trees(&snap, &settings, CellCoordinate::new(0, 0)).unwrap().len() <= 3);
    }

    #[test]
    fn test_validation() {
        let mut settings = forest(AttemptBudget::PerType);
        assert!(settings.validate("Trees").is_ok());
        settings.models[0].likelihood = 1.5;
        let err = settings.validate("Trees").unwrap_err();
        assert!(err.to_string().contains("Trees.trees.Fir.likelihood"));
        let shared = TreesSettings { attempt_budget: AttemptBudget::Shared(0), ..forest(AttemptBudget::PerType) };
        assert!(shared.validate("Trees").is_err());
    }

    fn wide_crowns(cell_size: CellSize, radius: f32, space: f32) -> (TreesSettings, GridSnapshot) {
        let settings = TreesSettings::default().with_model(PlottedModel {
            min_radius: radius,
            max_radius: radius,
            min_space_between: space,
            likelihood: 1.0,
            max_attempts: 200,
            ..PlottedModel::new("Wide")
        });
        let grid = ContentGrid::new("Trees", GridSettings::new(cell_size, 2), GridKind::Trees(settings.clone()));
        let snap = grid.snapshot_with(31, Arc::new(LayeredNoise::new()));
        (settings, snap)
    }

    // A cell only stays empty if every spot in it is crowded by trees the
    // neighbours really kept. "Room" is an 8x8 square whose every point
    // clears all neighbour trees.
    fn check_no_empty_cell_with_room(cell_size: CellSize, radius: f32, space: f32) {
        let (settings, snap) = wide_crowns(cell_size, radius, space);
        let units = cell_size.units() as f32;
        let clearance = (2.0 * radius).max(space);
        let margin = 4.0 * std::f32::consts::SQRT_2;

        let mut finals = HashMap::new();
        for x in -1..9 {
            for z in -1..9 {
                let coord = CellCoordinate::new(x, z);
                finals.insert(coord, plot_trees(&snap, &settings, coord).unwrap());
            }
        }

        let mut placed = 0;
        for x in 0..8 {
            for z in 0..8 {
                let coord = CellCoordinate::new(x, z);
                placed += finals[&coord].len();
                for neighbour in coord.neighbours() {
                    for a in &finals[&coord] {
                        for b in &finals[&neighbour] {
                            assert!(distance(a, b) + 1e-4 >= clearance, "{coord} crowds {neighbour}");
                        }
                    }
                }
                if !finals[&coord].is_empty() {
                    continue;
                }

                let (ox, oz) = coord.origin(cell_size);
                let mut offset = 4.0;
                while offset <= units - 4.0 {
                    let mut other = 4.0;
                    while other <= units - 4.0 {
                        let (px, pz) = (ox + offset, oz + other);
                        let roomy = coord.neighbours().flat_map(|n| finals[&n].iter()).all(|tree| {
                            let dx = tree.position[0] - px;
                            let dz = tree.position[2] - pz;
                            (dx * dx + dz * dz).sqrt() >= clearance + margin
                        });
                        assert!(!roomy, "{coord} is empty with room around ({px}, {pz})");
                        other += 1.0;
                    }
                    offset += 1.0;
                }
            }
        }
        assert!(placed > 0);
    }

    #[test]
    fn test_wide_crowns_leave_no_needless_gaps() {
        check_no_empty_cell_with_room(CellSize::Size32, 16.0, 24.0);
        check_no_empty_cell_with_room(CellSize::Size16, 10.0, 16.0);
    }

    #[test]
    fn test_phases_differ_between_neighbours() {
        for x in -3..3 {
            for z in -3..3 {
                let coord = CellCoordinate::new(x, z);
                assert!(coord.neighbours().all(|n| phase(n) != phase(coord)));
            }
        }
        assert_eq!(phase(CellCoordinate::new(-2, 4)), 0);
        assert_eq!(phase(CellCoordinate::new(-1, -1)), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_spacing_holds_across_neighbourhood(seed in 0u64..10_000, cx in -20i32..20, cz in -20i32..20) {
            let settings = forest(AttemptBudget::PerType);
            let snap = snapshot(&settings, seed);
            let centre = CellCoordinate::new(cx, cz);
            let mut cells = vec![centre];
            cells.extend(centre.neighbours());

            let mut placed = Vec::new();
            for cell in cells {
                placed.extend(plot_trees(&snap, &settings, cell).unwrap());
            }
            let own = plot_trees(&snap, &settings, centre).unwrap();
            for a in &own {
                for b in &placed {
                    if a == b {
                        continue;
                    }
                    prop_assert!(distance(a, b) + 1e-4 >= clearance(&settings, a, b));
                }
            }
        }
    }
}
