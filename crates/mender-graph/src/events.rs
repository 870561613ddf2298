//! Run event stream for observability.
//!
//! The engine emits [`RunEvent`]s through a [`tokio::sync::broadcast`]
//! channel so observers (loggers, metrics, UIs) can follow run progress
//! without coupling to the execution loop.

use serde::{Deserialize, Serialize};

use mender_types::RunStatus;

/// Events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        graph: String,
    },
    NodeStarted {
        run_id: String,
        node: String,
    },
    NodeCompleted {
        run_id: String,
        node: String,
        updated_fields: Vec<String>,
        state_version: u64,
    },
    EdgeResolved {
        run_id: String,
        from: String,
        to: String,
    },
    CheckpointSaved {
        run_id: String,
        sequence: u64,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        steps: usize,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers. Silently dropped when
    /// nobody is listening.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
