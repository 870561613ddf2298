//! Publisher: ships a validated fix for human review.
//!
//! The graph reaches the publish step at most once per successful run, so
//! implementations only need to be idempotent-safe for a single call.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::Result;

/// How the publish attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Created,
    Failed,
}

/// What the forge handed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub status: PublishStatus,
    /// Reference URL of the created review item; empty on failure.
    pub url: String,
}

/// Publishes a validated fix (e.g. opens a pull request).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, code: &str, description: &str) -> Result<PublishReceipt>;
}

// ---------------------------------------------------------------------------
// SimulatedPublisher
// ---------------------------------------------------------------------------

/// Stand-in for a real forge: records everything it was asked to publish
/// and hands back a plausible review URL. Used when no credentials are
/// configured, and by tests.
pub struct SimulatedPublisher {
    repo: String,
    counter: AtomicUsize,
    published: tokio::sync::Mutex<Vec<(String, String)>>,
}

impl SimulatedPublisher {
    /// `repo` in `owner/name` form, used to shape the simulated URL.
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            counter: AtomicUsize::new(0),
            published: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// `(code, description)` pairs received so far, in call order.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for SimulatedPublisher {
    async fn publish(&self, code: &str, description: &str) -> Result<PublishReceipt> {
        let number = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.published
            .lock()
            .await
            .push((code.to_string(), description.to_string()));
        let url = format!("https://github.com/{}/pull/{number}", self.repo);
        tracing::info!(url = %url, "simulated publish");
        Ok(PublishReceipt {
            status: PublishStatus::Created,
            url,
        })
    }
}
