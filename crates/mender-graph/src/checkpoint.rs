//! Checkpoint store: append-only state snapshots keyed by run identifier.
//!
//! When a store is attached to the engine, one [`Checkpoint`] is written
//! after every completed node-merge. Histories are append-only per run and
//! assume a single writer per run identifier.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_types::Result;

use crate::state::State;

/// Snapshot of a run's state right after a node's update was merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    /// Position within the run's history, starting at 0.
    pub sequence: u64,
    /// The node whose merge produced this snapshot.
    pub node: String,
    pub state_version: u64,
    pub values: BTreeMap<String, serde_json::Value>,
    /// RFC 3339 timestamp of when the snapshot was taken.
    pub timestamp: String,
}

impl Checkpoint {
    pub fn capture(run_id: &str, sequence: u64, node: &str, state: &State) -> Self {
        Self {
            run_id: run_id.to_string(),
            sequence,
            node: node.to_string(),
            state_version: state.version(),
            values: state.snapshot(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Persistence backend for run checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append one checkpoint to the run's history.
    async fn append(&self, checkpoint: Checkpoint) -> Result<()>;

    /// The full history for a run, in append order. Empty for unknown runs.
    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>>;

    /// The most recent checkpoint for a run.
    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.history(run_id).await?.pop())
    }
}

// ---------------------------------------------------------------------------
// MemoryCheckpointStore
// ---------------------------------------------------------------------------

/// In-process store; histories live for the life of the process.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    runs: tokio::sync::RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn append(&self, checkpoint: Checkpoint) -> Result<()> {
        self.runs
            .write()
            .await
            .entry(checkpoint.run_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self
            .runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// FileCheckpointStore
// ---------------------------------------------------------------------------

/// Durable store: one JSON-lines file per run under a root directory.
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.root.join(format!("{run_id}.jsonl"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn append(&self, checkpoint: Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.run_path(&checkpoint.run_id);
        let mut line = serde_json::to_string(&checkpoint)?;
        line.push('\n');

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        let mut file = options.open(&path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await?;
        tracing::debug!(path = %path.display(), sequence = checkpoint.sequence, "checkpoint appended");
        Ok(())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let path = self.run_path(run_id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let mut history = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            history.push(serde_json::from_str(line)?);
        }
        Ok(history)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MergePolicy, PartialUpdate, StateSchema};
    use std::sync::Arc;

    fn sample_state(marker: &str) -> State {
        let schema = Arc::new(
            StateSchema::builder()
                .field("marker", MergePolicy::Overwrite)
                .build(),
        );
        State::new(schema)
            .merge(&PartialUpdate::new().with("marker", marker))
            .unwrap()
    }

    #[tokio::test]
    async fn memory_store_appends_in_order() {
        let store = MemoryCheckpointStore::new();
        for seq in 0..3u64 {
            store
                .append(Checkpoint::capture("run-1", seq, "node", &sample_state("m")))
                .await
                .unwrap();
        }
        let history = store.history("run-1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn memory_store_isolates_runs() {
        let store = MemoryCheckpointStore::new();
        store
            .append(Checkpoint::capture("run-a", 0, "n", &sample_state("a")))
            .await
            .unwrap();
        store
            .append(Checkpoint::capture("run-b", 0, "n", &sample_state("b")))
            .await
            .unwrap();

        let a = store.history("run-a").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].values.get("marker").unwrap(), "a");
        assert!(store.history("run-c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_returns_most_recent() {
        let store = MemoryCheckpointStore::new();
        assert!(store.latest("run-1").await.unwrap().is_none());

        store
            .append(Checkpoint::capture("run-1", 0, "first", &sample_state("x")))
            .await
            .unwrap();
        store
            .append(Checkpoint::capture("run-1", 1, "second", &sample_state("y")))
            .await
            .unwrap();

        let latest = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence, 1);
        assert_eq!(latest.node, "second");
    }

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store
            .append(Checkpoint::capture("run-1", 0, "alpha", &sample_state("one")))
            .await
            .unwrap();
        store
            .append(Checkpoint::capture("run-1", 1, "beta", &sample_state("two")))
            .await
            .unwrap();

        let history = store.history("run-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].node, "alpha");
        assert_eq!(history[1].node, "beta");
        assert_eq!(history[1].values.get("marker").unwrap(), "two");
    }

    #[tokio::test]
    async fn file_store_unknown_run_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nested"));
        assert!(store.history("nobody").await.unwrap().is_empty());
        assert!(store.latest("nobody").await.unwrap().is_none());
    }

    #[test]
    fn checkpoint_serialization_preserves_fields() {
        let cp = Checkpoint::capture("run-7", 3, "gamma", &sample_state("z"));
        let json = serde_json::to_string(&cp).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, "run-7");
        assert_eq!(restored.sequence, 3);
        assert_eq!(restored.node, "gamma");
        assert_eq!(restored.state_version, 1);
        assert_eq!(restored.timestamp, cp.timestamp);
    }
}
