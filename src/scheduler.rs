//! Working stage: run the selected workers over their nodes.
//!
//! Every worker with at least one assigned top-level node gets its own
//! thread. That thread first waits until each worker it depends on has
//! finished all of its nodes, then processes its own nodes on one thread per
//! node and joins them. A worker's result is the conjunction of its node
//! results.
//!
//! Completion is signalled by dropping the sending half of a zero-capacity
//! channel: every dependent holds a receiver, and `recv` returns as soon as
//! the sender is gone.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{Context, ErrorCode, ParseError};
use crate::parser::Node;
use crate::pipeline::ParserHandle;
use crate::registry::{HandlingMap, WorkerRef};

#[derive(Debug, Default)]
struct Lists {
    launched: Vec<String>,
    finished: Vec<String>,
}

/// Names of the workers launched and finished in the current Working stage.
#[derive(Debug, Default)]
pub struct SessionState {
    lists: Mutex<Lists>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_launched(&self, name: &str) {
        self.lock().launched.push(name.to_string());
    }

    fn mark_finished(&self, name: &str) {
        self.lock().finished.push(name.to_string());
    }

    /// Launched workers, in launch order.
    pub fn launched(&self) -> Vec<String> {
        self.lock().launched.clone()
    }

    /// Finished workers, in completion order.
    pub fn finished(&self) -> Vec<String> {
        self.lock().finished.clone()
    }

    pub fn is_finished(&self, name: &str) -> bool {
        self.lock().finished.iter().any(|n| n == name)
    }
}

enum NodeOutcome {
    Processed(bool),
    Cancelled,
}

/// Dispatches one session's nodes to its workers.
pub struct Scheduler<'a> {
    context: &'a Context,
    map: &'a HandlingMap,
    parser: &'a ParserHandle,
    session: &'a SessionState,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        context: &'a Context,
        map: &'a HandlingMap,
        parser: &'a ParserHandle,
        session: &'a SessionState,
    ) -> Self {
        Self {
            context,
            map,
            parser,
            session,
        }
    }

    /// Run every worker to completion. Returns true if every node was
    /// processed successfully.
    pub fn run(&self) -> bool {
        let root = self.context.root();
        let assigned = self.partition(&root);

        // One completion signal per selected worker, launched or not
        let mut senders: HashMap<Uuid, Sender<()>> = HashMap::new();
        let mut receivers: HashMap<Uuid, Receiver<()>> = HashMap::new();
        for worker in self.map.workers() {
            let id = worker.identity().id;
            let (tx, rx) = bounded::<()>(0);
            receivers.insert(id, rx);
            if assigned.iter().any(|(w, _)| w.identity().id == id) {
                senders.insert(id, tx);
            } else {
                debug!(worker = %worker.identity(), "no nodes assigned, complete");
            }
        }

        let (done_tx, done_rx) = unbounded::<(String, bool)>();

        thread::scope(|s| {
            for (worker, nodes) in &assigned {
                let name = worker.identity().name.clone();
                let release = senders.remove(&worker.identity().id);
                let waits = self.dependency_signals(worker, &receivers);
                let done_tx = done_tx.clone();

                self.session.mark_launched(&name);
                debug!(worker = %name, nodes = nodes.len(), waits = waits.len(), "launching worker");

                s.spawn(move || {
                    let ok = self.run_worker(worker, nodes, &waits);
                    self.session.mark_finished(&name);
                    drop(release);
                    let _ = done_tx.send((name, ok));
                });
            }
            drop(done_tx);

            let mut success = true;
            for (name, ok) in done_rx.iter() {
                info!(worker = %name, ok, "worker finished");
                if !ok {
                    success = false;
                    if !self.parser.should_stop() {
                        self.context.push_error(ParseError::new(
                            ErrorCode::WorkerFailed,
                            format!("worker '{}' failed to process its definitions", name),
                        ));
                    }
                }
            }
            success
        })
    }

    /// Group top-level nodes by assigned worker, in order of first use.
    fn partition<'n>(&self, root: &'n Node) -> Vec<(WorkerRef, Vec<&'n Node>)> {
        let mut assigned: Vec<(WorkerRef, Vec<&'n Node>)> = Vec::new();

        for node in &root.children {
            let Some(worker) = node.name().and_then(|name| self.map.get(name)) else {
                continue;
            };
            let id = worker.identity().id;
            match assigned.iter_mut().find(|(w, _)| w.identity().id == id) {
                Some((_, nodes)) => nodes.push(node),
                None => assigned.push((WorkerRef::clone(worker), vec![node])),
            }
        }

        assigned
    }

    /// Completion receivers for the workers `worker` depends on.
    fn dependency_signals(
        &self,
        worker: &WorkerRef,
        receivers: &HashMap<Uuid, Receiver<()>>,
    ) -> Vec<(String, Receiver<()>)> {
        let own = worker.identity().id;
        let mut waits: Vec<(String, Receiver<()>)> = Vec::new();
        let mut seen = vec![own];

        for dependency in worker.dependent_definitions() {
            let Some(owner) = self.map.get(&dependency) else {
                warn!(worker = %worker.identity(), definition = %dependency, "dependency has no worker");
                continue;
            };
            let id = owner.identity().id;
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(rx) = receivers.get(&id) {
                waits.push((owner.identity().name.clone(), rx.clone()));
            }
        }

        waits
    }

    fn run_worker(&self, worker: &WorkerRef, nodes: &[&Node], waits: &[(String, Receiver<()>)]) -> bool {
        for (dependency, rx) in waits {
            debug!(worker = %worker.identity(), dependency = %dependency, "waiting");
            // Err means the sender is gone: the dependency has finished
            let _ = rx.recv();
        }

        if self.parser.should_stop() {
            self.cancelled(worker, nodes.len());
            return false;
        }

        let outcomes: Vec<thread::Result<NodeOutcome>> = thread::scope(|s| {
            let handles: Vec<_> = nodes
                .iter()
                .map(|&node| {
                    s.spawn(move || {
                        if self.parser.should_stop() {
                            return NodeOutcome::Cancelled;
                        }
                        NodeOutcome::Processed(worker.process(node, self.context, self.map, self.parser))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut ok = true;
        let mut cancelled = 0;
        for (outcome, node) in outcomes.into_iter().zip(nodes) {
            match outcome {
                Ok(NodeOutcome::Processed(result)) => ok &= result,
                Ok(NodeOutcome::Cancelled) => {
                    cancelled += 1;
                    ok = false;
                }
                Err(_) => {
                    ok = false;
                    self.context.push_error(
                        ParseError::new(
                            ErrorCode::WorkerFailed,
                            format!(
                                "worker '{}' panicked while processing '{}'",
                                worker.identity(),
                                node.name().unwrap_or_default()
                            ),
                        )
                        .in_file(node.source_file.clone()),
                    );
                }
            }
        }
        if cancelled > 0 {
            self.cancelled(worker, cancelled);
        }

        ok
    }

    fn cancelled(&self, worker: &WorkerRef, count: usize) {
        self.context.push_error(ParseError::new(
            ErrorCode::Cancelled,
            format!(
                "worker '{}' skipped {} definition(s) after a stop request",
                worker.identity(),
                count
            ),
        ));
    }
}
