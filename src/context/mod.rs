//! Per-session state shared between the parsing stage and the workers.
//!
//! A [`Context`] owns the definition tree of one parse session, the ordered
//! list of errors raised while processing it, the file currently being
//! parsed, and a typed local variable store. Every accessor goes through a
//! single lock, so workers running on different threads may read the tree
//! and append errors concurrently.
//!
//! The tree is kept behind an [`Arc`]: once the parsing stage ends the root
//! is only read, and [`Context::root`] hands out a snapshot without holding
//! the lock while workers walk it.

mod error;
mod value;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use crate::parser::Node;

pub use error::{ErrorCode, ParseError};
pub use value::Value;

#[derive(Debug, Default)]
struct Inner {
    root: Arc<Node>,
    errors: Vec<ParseError>,
    current_file: String,
    locals: HashMap<String, Value>,
}

/// Lock-guarded owner of one parse session's tree and errors.
#[derive(Debug, Default)]
pub struct Context {
    inner: Mutex<Inner>,
}

impl Context {
    /// Create an empty context with a bare root node.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the root node.
    pub fn root(&self) -> Arc<Node> {
        Arc::clone(&self.lock().root)
    }

    /// Append top-level definitions to the root.
    pub fn attach(&self, nodes: Vec<Node>) {
        let mut inner = self.lock();
        Arc::make_mut(&mut inner.root).children.extend(nodes);
    }

    /// Name of every direct child of the root that has at least one word,
    /// in tree order.
    pub fn first_level_definition_names(&self) -> Vec<String> {
        self.lock()
            .root
            .children
            .iter()
            .filter_map(|n| n.name().map(|s| s.to_string()))
            .collect()
    }

    /// Record an error. Critical errors are logged at error level, the rest
    /// as warnings.
    pub fn push_error(&self, err: ParseError) {
        if err.critical {
            error!(code = err.code_value(), file = %err.filepath, line = err.line, "{}", err.message);
        } else {
            warn!(code = err.code_value(), file = %err.filepath, line = err.line, "{}", err.message);
        }
        self.lock().errors.push(err);
    }

    /// Record several errors in order.
    pub fn extend_errors(&self, errors: impl IntoIterator<Item = ParseError>) {
        for err in errors {
            self.push_error(err);
        }
    }

    /// All errors recorded so far, in order.
    pub fn errors(&self) -> Vec<ParseError> {
        self.lock().errors.clone()
    }

    pub fn error_count(&self) -> usize {
        self.lock().errors.len()
    }

    /// True iff any recorded error is critical.
    pub fn has_critical_error(&self) -> bool {
        self.lock().errors.iter().any(|e| e.critical)
    }

    pub fn set_current_file(&self, path: impl Into<String>) {
        self.lock().current_file = path.into();
    }

    pub fn current_file(&self) -> String {
        self.lock().current_file.clone()
    }

    /// Set a local variable, returning the previous value.
    pub fn set_local(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().locals.insert(name.into(), value.into())
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.lock().locals.get(name).cloned()
    }

    pub fn local_int(&self, name: &str) -> Option<i64> {
        self.lock().locals.get(name).and_then(Value::as_int)
    }

    pub fn local_str(&self, name: &str) -> Option<String> {
        self.lock()
            .locals
            .get(name)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    pub fn remove_local(&self, name: &str) -> Option<Value> {
        self.lock().locals.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn named(name: &str) -> Node {
        Node {
            words: vec![name.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_first_level_names_skip_nameless() {
        let ctx = Context::new();
        ctx.attach(vec![named("A"), Node::default(), named("B")]);

        assert_eq!(ctx.first_level_definition_names(), vec!["A", "B"]);
        assert_eq!(ctx.root().children.len(), 3);
    }

    #[test]
    fn test_attach_after_snapshot_keeps_snapshot() {
        let ctx = Context::new();
        ctx.attach(vec![named("A")]);
        let snapshot = ctx.root();
        ctx.attach(vec![named("B")]);

        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(ctx.root().children.len(), 2);
    }

    #[test]
    fn test_critical_error_flag() {
        let ctx = Context::new();
        assert!(!ctx.has_critical_error());

        ctx.push_error(ParseError::new(ErrorCode::UnresolvedDefinition, "soft"));
        assert!(!ctx.has_critical_error());

        ctx.push_error(ParseError::new(ErrorCode::MissingBracket, "hard"));
        assert!(ctx.has_critical_error());
        assert_eq!(ctx.error_count(), 2);
        assert_eq!(ctx.errors()[0].code, ErrorCode::UnresolvedDefinition);
    }

    #[test]
    fn test_locals() {
        let ctx = Context::new();
        assert!(ctx.set_local("version", 2i64).is_none());
        assert_eq!(ctx.local_int("version"), Some(2));
        assert_eq!(ctx.set_local("version", 3i64), Some(Value::Int(2)));
        ctx.set_local("name", "scene");
        assert_eq!(ctx.local_str("name").as_deref(), Some("scene"));
        assert_eq!(ctx.remove_local("name"), Some(Value::from("scene")));
        assert!(ctx.local("name").is_none());
    }

    #[test]
    fn test_concurrent_error_pushes() {
        let ctx = Context::new();
        thread::scope(|s| {
            for i in 0..8 {
                let ctx = &ctx;
                s.spawn(move || {
                    for j in 0..25 {
                        ctx.push_error(ParseError::new(
                            ErrorCode::WorkerFailed,
                            format!("{}-{}", i, j),
                        ));
                    }
                });
            }
        });
        assert_eq!(ctx.error_count(), 200);
    }
}
