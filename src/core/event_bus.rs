use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::terrain::cell::CellCoordinate;
use crate::terrain::content_grid::CellPayload;

// Boxed event handler type
type BoxedHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Type-keyed publish/subscribe used to hand streaming results to whatever
/// renders them. Events are published on the control thread while a tick is
/// running.
pub struct EventBus {
    handlers: Mutex<HashMap<TypeId, Vec<BoxedHandler>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            handlers: Mutex::new(HashMap::new()),
        }
    }

    // A handler that panicked elsewhere must not silence the bus
    fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, Vec<BoxedHandler>>> {
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Subscribe to a specific event type
    pub fn subscribe<T>(&self, handler: Arc<dyn Fn(&T) + Send + Sync + 'static>)
    where
        T: Send + Sync + 'static,
    {
        // Create a type-erased handler
        let boxed_handler: BoxedHandler = Arc::new(move |event: &dyn Any| {
            if let Some(specific_event) = event.downcast_ref::<T>() {
                handler(specific_event);
            }
        });

        self.lock().entry(TypeId::of::<T>()).or_default().push(boxed_handler);
    }

    // Publish an event to all relevant handlers
    pub fn publish<T>(&self, event: T)
    where
        T: Send + Sync + 'static,
    {
        // Handlers run without the lock held so they may subscribe or publish
        let handlers = match self.lock().get(&TypeId::of::<T>()) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count<T: 'static>(&self) -> usize {
        self.lock().get(&TypeId::of::<T>()).map_or(0, Vec::len)
    }
}

// A cell payload was applied to a grid
#[derive(Debug, Clone)]
pub struct CellApplied {
    pub grid: String,
    pub coord: CellCoordinate,
    pub payload: Arc<CellPayload>,
}

// A loaded cell left a grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRemoved {
    pub grid: String,
    pub coord: CellCoordinate,
}

// A grid dropped its cells to regenerate them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRefreshed {
    pub grid: String,
    pub dropped_cells: usize,
}
