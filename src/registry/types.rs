//! Worker identity, the worker contract, and the handling map.
//!
//! Workers are identified by a UUID; the name is for humans. Two workers
//! with the same id are the same worker no matter what they are called.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

use crate::context::Context;
use crate::parser::Node;
use crate::pipeline::ParserHandle;

/// Identity of a worker.
#[derive(Debug, Clone)]
pub struct WorkerId {
    pub name: String,
    pub id: Uuid,
    /// Whether this worker may take over names claimed by others.
    pub overwrite: bool,
}

impl WorkerId {
    /// Identity with a fresh random id.
    pub fn new(name: impl Into<String>, overwrite: bool) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            overwrite,
        }
    }

    /// Identity whose id is derived from the name, so the same name always
    /// yields the same id.
    pub fn named(name: impl Into<String>, overwrite: bool) -> Self {
        let name = name.into();
        Self {
            id: Self::id_for(&name),
            name,
            overwrite,
        }
    }

    /// The id [`WorkerId::named`] assigns to `name`.
    pub fn id_for(name: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

impl PartialEq for WorkerId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkerId {}

impl Hash for WorkerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A pluggable handler for a set of definition names.
///
/// `process` is called once for every top-level node whose name the worker
/// was assigned, possibly from several threads at once. Anything a worker
/// reads from or records into the context must go through the context's
/// accessors.
pub trait Worker: Send + Sync {
    fn identity(&self) -> &WorkerId;

    /// Definition names this worker claims.
    fn definitions(&self) -> Vec<String>;

    /// Definition names whose workers must finish before this one starts.
    fn dependent_definitions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Must agree with [`Worker::definitions`].
    fn handles(&self, name: &str) -> bool {
        self.definitions().iter().any(|d| d == name)
    }

    /// Whether this worker may take over names already claimed by another.
    fn overwrites(&self) -> bool {
        self.identity().overwrite
    }

    /// Whether this worker recognizes the worker with `id` as one it may
    /// take names from. Only consulted when [`Worker::overwrites`] is true.
    fn is_overwritten(&self, _id: &Uuid) -> bool {
        false
    }

    /// Turn one node into whatever this worker produces. Returns false on
    /// failure; details belong in the context's error list.
    fn process(
        &self,
        node: &Node,
        context: &Context,
        map: &HandlingMap,
        parser: &ParserHandle,
    ) -> bool;
}

/// Shared handle to a registered worker.
pub type WorkerRef = Arc<dyn Worker>;

/// Assignment of definition names to workers.
#[derive(Clone, Default)]
pub struct HandlingMap {
    entries: BTreeMap<String, WorkerRef>,
}

impl HandlingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `name` to `worker`, returning the previous owner.
    pub fn insert(&mut self, name: impl Into<String>, worker: WorkerRef) -> Option<WorkerRef> {
        self.entries.insert(name.into(), worker)
    }

    pub fn get(&self, name: &str) -> Option<&WorkerRef> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerRef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Each distinct worker once, ordered by the first name it owns.
    pub fn workers(&self) -> Vec<WorkerRef> {
        let mut seen = Vec::new();
        let mut workers = Vec::new();
        for worker in self.entries.values() {
            let id = worker.identity().id;
            if !seen.contains(&id) {
                seen.push(id);
                workers.push(Arc::clone(worker));
            }
        }
        workers
    }

    /// Names assigned to the worker with `id`.
    pub fn names_for(&self, id: &Uuid) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, w)| w.identity().id == *id)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl fmt::Debug for HandlingMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, w)| (k, &w.identity().name)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(WorkerId, Vec<&'static str>);

    impl Worker for Stub {
        fn identity(&self) -> &WorkerId {
            &self.0
        }

        fn definitions(&self) -> Vec<String> {
            self.1.iter().map(|s| s.to_string()).collect()
        }

        fn process(&self, _: &Node, _: &Context, _: &HandlingMap, _: &ParserHandle) -> bool {
            true
        }
    }

    #[test]
    fn test_identity_equality_is_by_id() {
        let a = WorkerId::named("textures", false);
        let mut b = WorkerId::named("textures", true);
        assert_eq!(a, b);

        b.id = Uuid::new_v4();
        assert_ne!(a, b);
        assert_ne!(WorkerId::new("x", false), WorkerId::new("x", false));
    }

    #[test]
    fn test_named_ids_are_stable() {
        assert_eq!(WorkerId::named("scene", false).id, WorkerId::id_for("scene"));
        assert_ne!(WorkerId::id_for("scene"), WorkerId::id_for("shader"));
    }

    #[test]
    fn test_default_handles_follows_definitions() {
        let stub = Stub(WorkerId::named("s", false), vec!["Texture", "Image"]);
        assert!(stub.handles("Image"));
        assert!(!stub.handles("Shader"));
        assert!(!stub.overwrites());
    }

    #[test]
    fn test_workers_are_distinct() {
        let w1: WorkerRef = Arc::new(Stub(WorkerId::named("one", false), vec!["A", "B"]));
        let w2: WorkerRef = Arc::new(Stub(WorkerId::named("two", false), vec!["C"]));

        let mut map = HandlingMap::new();
        map.insert("A", Arc::clone(&w1));
        map.insert("B", Arc::clone(&w1));
        map.insert("C", Arc::clone(&w2));

        let workers = map.workers();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].identity().name, "one");
        assert_eq!(map.names_for(&w1.identity().id), vec!["A", "B"]);
        assert_eq!(format!("{:?}", map), r#"{"A": "one", "B": "one", "C": "two"}"#);
    }
}
