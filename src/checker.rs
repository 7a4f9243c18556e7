//! Checking stage: pick the workers one parsed tree actually needs.
//!
//! The global handling map is restricted to the top-level names present in
//! the tree, then closed over every selected worker's dependencies. Names no
//! worker claims are dropped with one warning per definition. A dependency nobody claims, or a
//! cycle between the selected workers, empties the map: no worker runs.

use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, ErrorCode, ParseError};
use crate::registry::{DependencyGraph, HandlingMap};

/// Build the session handling map for the tree held by `context`.
///
/// Errors are recorded in `context`. An empty map is returned when checking
/// fails; it is also empty when the tree has no resolvable names.
pub fn check(context: &Context, global: &HandlingMap) -> HandlingMap {
    let mut session = HandlingMap::new();
    let root = context.root();

    for node in &root.children {
        let Some(name) = node.name() else { continue };
        if session.contains(name) {
            continue;
        }
        match global.get(name) {
            Some(worker) => {
                debug!(definition = name, worker = %worker.identity(), "selected worker");
                session.insert(name, Arc::clone(worker));
            }
            None => {
                context.push_error(
                    ParseError::new(
                        ErrorCode::UnresolvedDefinition,
                        format!("no worker handles definition '{}'", name),
                    )
                    .at(node.source_file.clone(), node.line),
                );
            }
        }
    }

    if !close_dependencies(context, global, &mut session) {
        return HandlingMap::new();
    }

    if let Err(cycle) = dependency_graph(&session).topological_sort() {
        context.push_error(ParseError::new(
            ErrorCode::CircularDependency,
            cycle.to_string(),
        ));
        return HandlingMap::new();
    }

    session
}

/// Add the owner of every dependency until nothing new is added. Returns
/// false, after recording a critical error, if a dependency has no owner.
fn close_dependencies(context: &Context, global: &HandlingMap, session: &mut HandlingMap) -> bool {
    loop {
        let mut added = false;

        for worker in session.workers() {
            for dependency in worker.dependent_definitions() {
                if session.contains(&dependency) {
                    continue;
                }
                match global.get(&dependency) {
                    Some(owner) => {
                        debug!(
                            definition = %dependency,
                            worker = %owner.identity(),
                            required_by = %worker.identity(),
                            "selected dependency"
                        );
                        session.insert(dependency, Arc::clone(owner));
                        added = true;
                    }
                    None => {
                        context.push_error(ParseError::new(
                            ErrorCode::UnresolvedDependency,
                            format!(
                                "worker '{}' depends on '{}', which no worker handles",
                                worker.identity(),
                                dependency
                            ),
                        ));
                        return false;
                    }
                }
            }
        }

        if !added {
            return true;
        }
    }
}

/// Worker-to-worker edges of a session map. A worker depending on one of
/// its own names adds no edge.
pub fn dependency_graph(session: &HandlingMap) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for worker in session.workers() {
        let id = worker.identity();
        graph.register(id.clone());

        for dependency in worker.dependent_definitions() {
            if let Some(owner) = session.get(&dependency) {
                if owner.identity() != id {
                    graph.add_dependency(id.clone(), owner.identity().clone());
                }
            }
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{build_tree, Node};
    use crate::pipeline::ParserHandle;
    use crate::registry::{Worker, WorkerId, WorkerRef, WorkerRegistry};

    struct Deps {
        id: WorkerId,
        names: Vec<&'static str>,
        deps: Vec<&'static str>,
    }

    impl Worker for Deps {
        fn identity(&self) -> &WorkerId {
            &self.id
        }

        fn definitions(&self) -> Vec<String> {
            self.names.iter().map(|s| s.to_string()).collect()
        }

        fn dependent_definitions(&self) -> Vec<String> {
            self.deps.iter().map(|s| s.to_string()).collect()
        }

        fn process(&self, _: &Node, _: &Context, _: &HandlingMap, _: &ParserHandle) -> bool {
            true
        }
    }

    fn worker(name: &str, names: Vec<&'static str>, deps: Vec<&'static str>) -> WorkerRef {
        Arc::new(Deps {
            id: WorkerId::named(name, false),
            names,
            deps,
        })
    }

    fn context_for(source: &str) -> Context {
        let ctx = Context::new();
        ctx.attach(build_tree(source, "test.def").nodes);
        ctx
    }

    fn global(workers: Vec<WorkerRef>) -> HandlingMap {
        let mut registry = WorkerRegistry::new();
        registry.add_all(workers);
        registry.compute_definitions()
    }

    #[test]
    fn test_restricts_to_present_names() {
        let ctx = context_for("[A one][A two]");
        let map = global(vec![
            worker("wa", vec!["A"], vec![]),
            worker("wb", vec!["B"], vec![]),
        ]);

        let session = check(&ctx, &map);
        assert_eq!(session.names().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_unresolved_definition_is_soft() {
        let ctx = context_for("[A]\n[Unknown]\n[Unknown]");
        let map = global(vec![worker("wa", vec!["A"], vec![])]);

        let session = check(&ctx, &map);
        assert_eq!(session.len(), 1);

        let errors = ctx.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == ErrorCode::UnresolvedDefinition));
        assert_eq!(errors[0].filepath, "test.def");
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![2, 3]);
        assert!(!ctx.has_critical_error());
    }

    #[test]
    fn test_dependencies_are_closed_transitively() {
        // C needs B, B needs A; only C is present in the tree
        let ctx = context_for("[C]");
        let map = global(vec![
            worker("wa", vec!["A"], vec![]),
            worker("wb", vec!["B"], vec!["A"]),
            worker("wc", vec!["C"], vec!["B"]),
        ]);

        let session = check(&ctx, &map);
        assert_eq!(session.names().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_unresolved_dependency_fails_closed() {
        let ctx = context_for("[A][B][C]");
        let map = global(vec![
            worker("wa", vec!["A"], vec![]),
            worker("wb", vec!["B"], vec![]),
            worker("wc", vec!["C"], vec!["Missing"]),
        ]);

        let session = check(&ctx, &map);
        assert!(session.is_empty());
        assert!(ctx.has_critical_error());
        assert_eq!(ctx.errors()[0].code, ErrorCode::UnresolvedDependency);
    }

    #[test]
    fn test_cycle_fails_closed() {
        let ctx = context_for("[A][D]");
        let map = global(vec![
            worker("wa", vec!["A"], vec!["B"]),
            worker("wb", vec!["B"], vec!["A"]),
            worker("wd", vec!["D"], vec![]),
        ]);

        let session = check(&ctx, &map);
        assert!(session.is_empty());
        assert_eq!(ctx.errors()[0].code, ErrorCode::CircularDependency);
        assert!(ctx.errors()[0].critical);
    }

    #[test]
    fn test_self_dependency_is_not_a_cycle() {
        let ctx = context_for("[Material]");
        let map = global(vec![worker(
            "materials",
            vec!["Material", "BaseMaterial"],
            vec!["BaseMaterial"],
        )]);

        let session = check(&ctx, &map);
        assert_eq!(session.len(), 2);
        assert!(!ctx.has_critical_error());
    }

    #[test]
    fn test_nameless_nodes_are_ignored() {
        let ctx = context_for("[][\"\"]");
        let session = check(&ctx, &global(vec![]));
        // The quoted empty string is a word, so it is looked up
        assert!(session.is_empty());
        assert_eq!(ctx.error_count(), 1);
    }
}
