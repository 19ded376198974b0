use rayon::ThreadPoolBuilder;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

use crate::core::error::{GenerationError, WorldResult};
use crate::terrain::cell::CellCoordinate;
use crate::terrain::content_grid::{CellPayload, GridSnapshot};

// Result of one generation task, routed back to its grid by id
#[derive(Debug)]
pub struct CellCompletion {
    pub grid_id: u64,
    pub coord: CellCoordinate,
    pub epoch: u64,
    pub result: Result<Arc<CellPayload>, GenerationError>,
}

// Worker count for a configured value; 0 leaves one core for the control thread
pub fn resolve_thread_count(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        num_cpus::get().saturating_sub(1).max(1)
    }
}

/// Rayon pool that runs cell generation off the control thread.
///
/// Every task reports through a single completion channel which the control
/// thread drains once per tick. Tasks never touch grid state; they only read
/// the snapshot they were given.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    num_threads: usize,
    sender: Sender<CellCompletion>,
    receiver: Receiver<CellCompletion>,
}

impl WorkerPool {
    pub fn new(size: usize) -> WorldResult<WorkerPool> {
        let num_threads = resolve_thread_count(size);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("worldpager-worker-{index}"))
            .build()?;

        info!(num_threads, "Created generation worker pool");

        let (sender, receiver) = mpsc::channel();
        Ok(WorkerPool {
            pool,
            num_threads,
            sender,
            receiver,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    // Generate one cell in the background
    pub fn spawn_generation(&self, grid_id: u64, coord: CellCoordinate, epoch: u64, snapshot: Arc<GridSnapshot>) {
        let sender = self.sender.clone();
        self.pool.spawn(move || {
            let result = run_guarded(|| snapshot.generate_cell(coord)).map(Arc::new);
            // The receiver only goes away when the pool is shutting down
            let _ = sender.send(CellCompletion {
                grid_id,
                coord,
                epoch,
                result,
            });
        });
    }

    // Everything that finished since the last call, without blocking
    pub fn drain_completions(&self) -> Vec<CellCompletion> {
        self.receiver.try_iter().collect()
    }

    // Tasks already running finish in the background; their results are dropped
    pub fn shutdown(self) {
        let WorkerPool { pool, num_threads, sender, receiver } = self;
        drop(receiver);
        drop(sender);
        drop(pool);
        debug!(num_threads, "Worker pool shut down");
    }
}

// Runs a task, turning a panic into a generation error
pub fn run_guarded<T, F>(task: F) -> Result<T, GenerationError>
where
    F: FnOnce() -> Result<T, GenerationError>,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(message) = payload.downcast_ref::<&str>() {
                message.to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(GenerationError::Panicked(message))
        }
    }
}
