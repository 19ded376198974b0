use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::error::GenerationError;
use crate::terrain::cell::{CellCoordinate, CellState};
use crate::terrain::content_grid::CellPayload;
use crate::terrain::terrain_config::ThrottleBudget;
use crate::threading::CellCompletion;

#[derive(Debug, Clone)]
pub struct CellEntry {
    pub state: CellState,
    // Admission that produced the current state. Only a completion carrying
    // this epoch may be applied.
    pub epoch: u64,
    payload: Option<Arc<CellPayload>>,
}

// What one reconcile pass did, in the order it happened
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub admitted: Vec<(CellCoordinate, u64)>,
    pub applied: Vec<(CellCoordinate, Arc<CellPayload>)>,
    pub removed: Vec<CellCoordinate>,
    pub failures: Vec<(CellCoordinate, GenerationError)>,
    pub discarded_stale: usize,
    pub abandoned: usize,
    pub waiting: usize,
}

/// Lifecycle bookkeeping for the cells of one content grid.
///
/// Only the control thread touches this. Workers hand results back as
/// [`CellCompletion`]s which are matched against the entry's epoch here.
#[derive(Debug, Default)]
pub struct CellManager {
    entries: HashMap<CellCoordinate, CellEntry>,
    next_epoch: u64,
}

impl CellManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, coord: &CellCoordinate) -> CellState {
        self.entries.get(coord).map_or(CellState::Unloaded, |entry| entry.state)
    }

    pub fn entry(&self, coord: &CellCoordinate) -> Option<&CellEntry> {
        self.entries.get(coord)
    }

    pub fn payload(&self, coord: &CellCoordinate) -> Option<&Arc<CellPayload>> {
        self.entries.get(coord).and_then(|entry| entry.payload.as_ref())
    }

    pub fn loaded(&self) -> impl Iterator<Item = (CellCoordinate, &Arc<CellPayload>)> {
        self.entries
            .iter()
            .filter_map(|(coord, entry)| entry.payload.as_ref().map(|payload| (*coord, payload)))
    }

    pub fn loaded_count(&self) -> usize {
        self.count(CellState::Loaded)
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.state.is_in_flight()).count()
    }

    fn count(&self, state: CellState) -> usize {
        self.entries.values().filter(|entry| entry.state == state).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Diff the present cells against `desired` (nearest first) and apply the
    // completions that arrived since the last pass.
    pub fn reconcile(
        &mut self,
        centre: CellCoordinate,
        desired: &[CellCoordinate],
        mut completions: Vec<CellCompletion>,
        budget: ThrottleBudget,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let wanted: HashSet<CellCoordinate> = desired.iter().copied().collect();

        // In-flight cells that left the view lose their entry; whatever their
        // worker returns no longer matches anything.
        let before = self.entries.len();
        self.entries
            .retain(|coord, entry| !(entry.state.is_in_flight() && !wanted.contains(coord)));
        outcome.abandoned = before - self.entries.len();

        // Admission order
        completions.sort_by_key(|completion| completion.epoch);
        let mut retry_later = HashSet::new();
        for completion in completions {
            let current = self.entries.get_mut(&completion.coord).filter(|entry| {
                entry.state == CellState::Generating && entry.epoch == completion.epoch
            });
            let Some(entry) = current else {
                outcome.discarded_stale += 1;
                continue;
            };
            match completion.result {
                Ok(payload) => {
                    entry.state = CellState::Loaded;
                    entry.payload = Some(Arc::clone(&payload));
                    outcome.applied.push((completion.coord, payload));
                }
                Err(error) => {
                    self.entries.remove(&completion.coord);
                    retry_later.insert(completion.coord);
                    outcome.failures.push((completion.coord, error));
                }
            }
        }

        // Farthest first
        let mut leaving: Vec<CellCoordinate> = self
            .entries
            .iter()
            .filter(|(coord, entry)| entry.state == CellState::Loaded && !wanted.contains(*coord))
            .map(|(coord, _)| *coord)
            .collect();
        leaving.sort_by_key(|coord| (Reverse(coord.distance_squared(&centre)), *coord));
        for coord in leaving.into_iter().take(budget.removals_per_frame as usize) {
            if let Some(entry) = self.entries.get_mut(&coord) {
                entry.state = CellState::Unloading;
                entry.payload = None;
                outcome.removed.push(coord);
            }
        }
        self.entries.retain(|_, entry| entry.state != CellState::Unloading);

        for coord in desired {
            if self.entries.contains_key(coord) {
                continue;
            }
            if retry_later.contains(coord) || outcome.admitted.len() >= budget.additions_per_frame as usize {
                outcome.waiting += 1;
                continue;
            }
            let epoch = self.next_epoch;
            self.next_epoch += 1;
            self.entries.insert(
                *coord,
                CellEntry {
                    state: CellState::Queued,
                    epoch,
                    payload: None,
                },
            );
            outcome.admitted.push((*coord, epoch));
        }

        outcome
    }

    // Queued -> Generating once the task is handed to a worker
    pub fn mark_generating(&mut self, coord: &CellCoordinate, epoch: u64) -> bool {
        match self.entries.get_mut(coord) {
            Some(entry) if entry.state == CellState::Queued && entry.epoch == epoch => {
                entry.state = CellState::Generating;
                true
            }
            _ => false,
        }
    }

    // Drop every entry regardless of budgets. Returns the cells that were
    // loaded. Epochs keep counting so results still in flight are stale.
    pub fn clear(&mut self) -> Vec<CellCoordinate> {
        let mut loaded: Vec<CellCoordinate> = self
            .entries
            .drain()
            .filter(|(_, entry)| entry.state == CellState::Loaded)
            .map(|(coord, _)| coord)
            .collect();
        loaded.sort();
        loaded
    }
}
