//! Parser state machine and the handle shared with workers.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

/// Where a parser is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserState {
    Idling,
    Preprocessing,
    Parsing,
    Working,
    Finished,
}

impl ParserState {
    /// Whether a session is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            ParserState::Preprocessing | ParserState::Parsing | ParserState::Working
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ParserState::Idling => "idling",
            ParserState::Preprocessing => "preprocessing",
            ParserState::Parsing => "parsing",
            ParserState::Working => "working",
            ParserState::Finished => "finished",
        }
    }
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug)]
struct Cell {
    state: ParserState,
    /// Bumped by every new session and every reset. A session only moves
    /// the state while its generation is current.
    generation: u64,
}

#[derive(Debug)]
struct Shared {
    cell: Mutex<Cell>,
    changed: Condvar,
}

/// Cloneable view of a parser's state, handed to workers.
///
/// A handle bound to a session (the one workers receive) reports
/// [`should_stop`](Self::should_stop) once that session has been reset,
/// even if a newer session is already running.
#[derive(Debug, Clone)]
pub struct ParserHandle {
    shared: Arc<Shared>,
    session: Option<u64>,
}

impl Default for ParserHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cell: Mutex::new(Cell {
                    state: ParserState::Idling,
                    generation: 0,
                }),
                changed: Condvar::new(),
            }),
            session: None,
        }
    }

    /// A handle bound to session `generation`.
    pub(crate) fn for_session(&self, generation: u64) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            session: Some(generation),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell> {
        self.shared.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ParserState {
        self.lock().state
    }

    /// Whether this handle's session was reset. Always false for a handle
    /// not bound to a session.
    pub fn should_stop(&self) -> bool {
        match self.session {
            Some(generation) => self.lock().generation != generation,
            None => false,
        }
    }

    /// Block until the parser is in `state`.
    ///
    /// Only `Finished` and `Idling` are reliable targets: the intermediate
    /// states can be left again before this thread wakes, in which case the
    /// wait lasts until the next session passes through `state`.
    pub fn wait(&self, state: ParserState) {
        let guard = self.lock();
        let _guard = self
            .shared
            .changed
            .wait_while(guard, |cell| cell.state != state)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Block until the parser is in `state` or `timeout` elapses.
    pub fn wait_timeout(&self, state: ParserState, timeout: Duration) -> WaitOutcome {
        let guard = self.lock();
        let (_guard, result) = self
            .shared
            .changed
            .wait_timeout_while(guard, timeout, |cell| cell.state != state)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Ready
        }
    }

    /// Start a new session. Returns its generation, or None while another
    /// session is in flight.
    pub(crate) fn begin(&self) -> Option<u64> {
        let mut cell = self.lock();
        if cell.state.is_busy() {
            return None;
        }
        cell.generation += 1;
        cell.state = ParserState::Preprocessing;
        self.shared.changed.notify_all();
        info!(generation = cell.generation, "session started");
        Some(cell.generation)
    }

    /// Move session `generation` to `state`. Returns false if the session
    /// was reset in the meantime.
    pub(crate) fn transition(&self, generation: u64, state: ParserState) -> bool {
        let mut cell = self.lock();
        if cell.generation != generation {
            return false;
        }
        if cell.state != state {
            info!(from = %cell.state, to = %state, "parser state");
            cell.state = state;
            self.shared.changed.notify_all();
        }
        true
    }

    /// Whether `generation` is still the current session.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Back to idling. Handles bound to the running session start
    /// reporting `should_stop`.
    pub(crate) fn reset(&self) {
        let mut cell = self.lock();
        cell.generation += 1;
        cell.state = ParserState::Idling;
        self.shared.changed.notify_all();
        info!("parser reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_begin_and_transition() {
        let handle = ParserHandle::new();
        assert_eq!(handle.state(), ParserState::Idling);

        let generation = handle.begin().unwrap();
        assert_eq!(handle.state(), ParserState::Preprocessing);
        assert!(handle.begin().is_none());

        assert!(handle.transition(generation, ParserState::Finished));
        assert_eq!(handle.state(), ParserState::Finished);
        assert!(handle.begin().is_some());
    }

    #[test]
    fn test_reset_invalidates_generation() {
        let handle = ParserHandle::new();
        let generation = handle.begin().unwrap();
        let old = handle.for_session(generation);
        assert!(!old.should_stop());

        handle.reset();
        assert!(old.should_stop());
        assert!(!handle.should_stop());
        assert_eq!(handle.state(), ParserState::Idling);
        assert!(!handle.transition(generation, ParserState::Working));
        assert_eq!(handle.state(), ParserState::Idling);
        assert!(!handle.is_current(generation));
    }

    #[test]
    fn test_new_session_does_not_revive_reset_one() {
        let handle = ParserHandle::new();
        let first = handle.for_session(handle.begin().unwrap());
        handle.reset();

        let second = handle.for_session(handle.begin().unwrap());
        assert!(first.should_stop());
        assert!(!second.should_stop());
    }

    #[test]
    fn test_wait_sees_transition_from_other_thread() {
        let handle = ParserHandle::new();
        let generation = handle.begin().unwrap();

        let worker = handle.clone();
        let t = thread::spawn(move || {
            worker.transition(generation, ParserState::Working);
            worker.transition(generation, ParserState::Finished);
        });

        handle.wait(ParserState::Finished);
        assert_eq!(handle.state(), ParserState::Finished);
        t.join().unwrap();
    }

    #[test]
    fn test_wait_timeout() {
        let handle = ParserHandle::new();
        assert_eq!(
            handle.wait_timeout(ParserState::Finished, Duration::from_millis(20)),
            WaitOutcome::TimedOut
        );
        assert_eq!(
            handle.wait_timeout(ParserState::Idling, Duration::from_millis(20)),
            WaitOutcome::Ready
        );
    }

    #[test]
    fn test_busy_states() {
        assert!(!ParserState::Idling.is_busy());
        assert!(ParserState::Working.is_busy());
        assert!(!ParserState::Finished.is_busy());
    }
}
