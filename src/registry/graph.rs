//! Dependency graph between workers.
//!
//! Tracks which workers wait on which others, so a selection of workers can
//! be checked for cycles before any of them is started.

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::WorkerId;

/// A dependency graph tracking which workers wait on which.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Adjacency list: worker -> workers it depends on.
    dependencies: HashMap<WorkerId, HashSet<WorkerId>>,

    /// Reverse adjacency list: worker -> workers that depend on it.
    dependents: HashMap<WorkerId, HashSet<WorkerId>>,

    /// All known workers (including those with no dependencies).
    workers: HashSet<WorkerId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker in the graph (even if it has no dependencies).
    pub fn register(&mut self, id: WorkerId) {
        self.workers.insert(id);
    }

    /// Add a dependency: `from` waits on `to`.
    ///
    /// Both workers are registered automatically.
    pub fn add_dependency(&mut self, from: WorkerId, to: WorkerId) {
        self.workers.insert(from.clone());
        self.workers.insert(to.clone());

        self.dependencies
            .entry(from.clone())
            .or_default()
            .insert(to.clone());

        self.dependents.entry(to).or_default().insert(from);
    }

    /// Workers `id` waits on directly.
    pub fn dependencies_of(&self, id: &WorkerId) -> impl Iterator<Item = &WorkerId> {
        self.dependencies.get(id).into_iter().flatten()
    }

    /// Workers waiting on `id` directly.
    pub fn dependents_of(&self, id: &WorkerId) -> impl Iterator<Item = &WorkerId> {
        self.dependents.get(id).into_iter().flatten()
    }

    pub fn dependency_count(&self, id: &WorkerId) -> usize {
        self.dependencies.get(id).map_or(0, |s| s.len())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Order workers so every worker comes after everything it waits on
    /// (Kahn's algorithm). Fails with the offending path on a cycle.
    pub fn topological_sort(&self) -> Result<Vec<WorkerId>, CycleError> {
        // in_degree[x] = number of unprocessed workers x waits on
        let mut in_degree: HashMap<&WorkerId, usize> = self
            .workers
            .iter()
            .map(|w| (w, self.dependency_count(w)))
            .collect();

        let mut queue: VecDeque<&WorkerId> = in_degree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(self.workers.len());

        while let Some(worker) = queue.pop_front() {
            result.push(worker.clone());

            for dependent in self.dependents_of(worker) {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if result.len() != self.workers.len() {
            return Err(CycleError {
                cycle: self.find_cycle(),
            });
        }

        Ok(result)
    }

    fn find_cycle(&self) -> Vec<WorkerId> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for start in &self.workers {
            if !visited.contains(start) {
                if let Some(cycle) = self.dfs_find_cycle(start, &mut visited, &mut on_stack, &mut path) {
                    return cycle;
                }
            }
        }

        Vec::new()
    }

    fn dfs_find_cycle(
        &self,
        node: &WorkerId,
        visited: &mut HashSet<WorkerId>,
        on_stack: &mut HashSet<WorkerId>,
        path: &mut Vec<WorkerId>,
    ) -> Option<Vec<WorkerId>> {
        visited.insert(node.clone());
        on_stack.insert(node.clone());
        path.push(node.clone());

        for dep in self.dependencies_of(node) {
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(dep) {
                let start = path.iter().position(|x| x == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
        }

        path.pop();
        on_stack.remove(node);
        None
    }
}

/// Error returned when a cycle is detected in the dependency graph.
#[derive(Debug)]
pub struct CycleError {
    /// The workers involved in the cycle, first one repeated at the end.
    pub cycle: Vec<WorkerId>,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Circular dependency detected: ")?;
        for (i, worker) in self.cycle.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", worker)?;
        }
        Ok(())
    }
}

impl std::error::Error for CycleError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(name: &str) -> WorkerId {
        WorkerId::named(name, false)
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_sort().unwrap().is_empty());
    }

    #[test]
    fn test_linear_dependencies() {
        let mut graph = DependencyGraph::new();

        // scenes wait on shaders, shaders wait on textures
        let textures = w("textures");
        let shaders = w("shaders");
        let scenes = w("scenes");

        graph.add_dependency(shaders.clone(), textures.clone());
        graph.add_dependency(scenes.clone(), shaders.clone());

        let sorted = graph.topological_sort().unwrap();
        let pos = |id: &WorkerId| sorted.iter().position(|x| x == id).unwrap();

        assert!(pos(&textures) < pos(&shaders));
        assert!(pos(&shaders) < pos(&scenes));
    }

    #[test]
    fn test_diamond_dependencies() {
        let mut graph = DependencyGraph::new();

        let a = w("a");
        let b = w("b");
        let c = w("c");
        let d = w("d");

        graph.add_dependency(b.clone(), a.clone());
        graph.add_dependency(c.clone(), a.clone());
        graph.add_dependency(d.clone(), b.clone());
        graph.add_dependency(d.clone(), c.clone());
        graph.register(w("loner"));

        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted.len(), 5);
        let pos = |id: &WorkerId| sorted.iter().position(|x| x == id).unwrap();

        assert!(pos(&a) < pos(&b));
        assert!(pos(&a) < pos(&c));
        assert!(pos(&d) > pos(&b));
        assert!(pos(&d) > pos(&c));
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = DependencyGraph::new();

        let a = w("a");
        let b = w("b");
        let c = w("c");

        graph.add_dependency(a.clone(), b.clone());
        graph.add_dependency(b.clone(), c.clone());
        graph.add_dependency(c.clone(), a.clone());

        let err = graph.topological_sort().unwrap_err();
        assert_eq!(err.cycle.len(), 4);
        assert_eq!(err.cycle.first(), err.cycle.last());
        assert!(err.to_string().starts_with("Circular dependency detected: "));
    }

    #[test]
    fn test_dependents_of() {
        let mut graph = DependencyGraph::new();

        let textures = w("textures");
        let shaders = w("shaders");
        let meshes = w("meshes");

        graph.add_dependency(shaders.clone(), textures.clone());
        graph.add_dependency(meshes.clone(), textures.clone());

        let dependents: HashSet<_> = graph.dependents_of(&textures).collect();
        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains(&shaders));
        assert_eq!(graph.dependency_count(&textures), 0);
        assert_eq!(graph.dependencies_of(&meshes).count(), 1);
    }
}
