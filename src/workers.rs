//! Workers declared in the project manifest.
//!
//! A declared worker claims the names listed for it, waits on the listed
//! dependencies, and records every node it is given. The CLI uses them to
//! check the definitions of a project without any domain-specific code.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::Context;
use crate::parser::Node;
use crate::pipeline::ParserHandle;
use crate::registry::{HandlingMap, Worker, WorkerId};

/// Manifest entry describing one worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSpec {
    pub name: String,
    /// Definition names the worker claims.
    pub definitions: Vec<String>,
    /// Definition names whose workers must finish first.
    pub depends: Vec<String>,
    /// Whether the worker may take over names claimed by others.
    pub overwrite: bool,
    /// Workers, by name, whose names this one may take over.
    pub supersedes: Vec<String>,
}

/// A node handed to a declared worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedDefinition {
    pub name: String,
    pub arguments: Vec<String>,
    /// Number of nodes in the definition's block, at any depth.
    pub nested: usize,
    pub file: String,
}

/// Worker built from a [`WorkerSpec`].
#[derive(Debug)]
pub struct DeclaredWorker {
    id: WorkerId,
    spec: WorkerSpec,
    supersedes: Vec<Uuid>,
    processed: Mutex<Vec<ProcessedDefinition>>,
}

impl DeclaredWorker {
    pub fn new(spec: WorkerSpec) -> Self {
        let id = WorkerId::named(spec.name.clone(), spec.overwrite);
        let supersedes = spec
            .supersedes
            .iter()
            .map(|name| WorkerId::id_for(name))
            .collect();
        Self {
            id,
            spec,
            supersedes,
            processed: Mutex::new(Vec::new()),
        }
    }

    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    /// Everything processed so far, in completion order.
    pub fn processed(&self) -> Vec<ProcessedDefinition> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Worker for DeclaredWorker {
    fn identity(&self) -> &WorkerId {
        &self.id
    }

    fn definitions(&self) -> Vec<String> {
        self.spec.definitions.clone()
    }

    fn dependent_definitions(&self) -> Vec<String> {
        self.spec.depends.clone()
    }

    fn is_overwritten(&self, id: &Uuid) -> bool {
        self.supersedes.contains(id)
    }

    fn process(&self, node: &Node, _context: &Context, _map: &HandlingMap, _parser: &ParserHandle) -> bool {
        let Some(name) = node.name() else {
            return false;
        };
        debug!(worker = %self.id, definition = name, "processing");

        let record = ProcessedDefinition {
            name: name.to_string(),
            arguments: node.arguments().to_vec(),
            nested: node.descendant_count(),
            file: node.source_file.clone(),
        };
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        true
    }
}
