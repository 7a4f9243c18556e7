//! Worker registry.
//!
//! The registry holds every worker available to a parser and computes the
//! global handling map: which worker gets each definition name.
//!
//! # Example
//!
//! ```ignore
//! use defpipe::registry::WorkerRegistry;
//!
//! let mut registry = WorkerRegistry::new();
//! registry.add(Arc::new(TextureWorker::new()));
//! registry.add(Arc::new(SceneWorker::new()));
//!
//! let map = registry.compute_definitions();
//! ```

mod graph;
pub mod types;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

pub use graph::{CycleError, DependencyGraph};
pub use types::{HandlingMap, Worker, WorkerId, WorkerRef};

/// The set of workers a parser can hand definitions to.
///
/// At most one worker is stored per id; registration order decides who
/// claims a name first.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerRef>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Returns false if a worker with the same id is
    /// already registered.
    pub fn add(&mut self, worker: WorkerRef) -> bool {
        let id = worker.identity().id;
        if self.get(&id).is_some() {
            debug!(worker = %worker.identity(), "worker already registered");
            return false;
        }
        self.workers.push(worker);
        true
    }

    /// Register several workers.
    pub fn add_all(&mut self, workers: impl IntoIterator<Item = WorkerRef>) -> &mut Self {
        for worker in workers {
            self.add(worker);
        }
        self
    }

    pub fn get(&self, id: &Uuid) -> Option<&WorkerRef> {
        self.workers.iter().find(|w| w.identity().id == *id)
    }

    /// Registered workers in registration order.
    pub fn workers(&self) -> &[WorkerRef] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Compute the global handling map.
    ///
    /// A name goes to the first worker that claims it. A later claimant only
    /// takes it over if it overwrites and explicitly recognizes the current
    /// owner's id.
    pub fn compute_definitions(&self) -> HandlingMap {
        let mut map = HandlingMap::new();

        for worker in &self.workers {
            for name in worker.definitions() {
                match map.get(&name).map(Arc::clone) {
                    None => {
                        map.insert(name, Arc::clone(worker));
                    }
                    Some(owner) => {
                        let owner_id = owner.identity();
                        if worker.overwrites() && worker.is_overwritten(&owner_id.id) {
                            debug!(
                                definition = %name,
                                from = %owner_id,
                                to = %worker.identity(),
                                "definition overwritten"
                            );
                            map.insert(name, Arc::clone(worker));
                        } else {
                            debug!(
                                definition = %name,
                                owner = %owner_id,
                                rejected = %worker.identity(),
                                "definition already claimed"
                            );
                        }
                    }
                }
            }
        }

        map
    }
}
