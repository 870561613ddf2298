//! Fix generator: produces candidate code for an identified root cause.
//!
//! Pure request/response. Retrying a rejected fix is the graph's job, never
//! the generator's.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::{MenderError, Result};

/// Everything a generator gets to work with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixRequest {
    /// Root-cause analysis produced upstream.
    pub analysis: String,
    /// Validation feedback from earlier cycles, oldest first.
    pub prior_errors: Vec<String>,
    /// The code being repaired, when available.
    pub original_code: Option<String>,
}

/// Generates candidate fix code.
#[async_trait]
pub trait FixGenerator: Send + Sync {
    /// Produce code text for the request. One request, one response.
    async fn generate(&self, request: &FixRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ScriptedFixGenerator
// ---------------------------------------------------------------------------

/// Deterministic double: replies with a queue of canned responses and
/// records every request it saw. Fails once the script runs dry.
#[derive(Default)]
pub struct ScriptedFixGenerator {
    replies: tokio::sync::Mutex<VecDeque<String>>,
    requests: tokio::sync::Mutex<Vec<FixRequest>>,
    calls: AtomicUsize,
}

impl ScriptedFixGenerator {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: tokio::sync::Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: tokio::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<FixRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl FixGenerator for ScriptedFixGenerator {
    async fn generate(&self, request: &FixRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| MenderError::Collaborator {
                collaborator: "fix_generator".into(),
                message: "scripted replies exhausted".into(),
            })
    }
}
