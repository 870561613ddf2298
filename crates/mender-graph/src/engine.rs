//! The execution loop.
//!
//! `Ready → Running(node) → {Running(next) | Succeeded | Exhausted | Aborted}`.
//! The engine executes the current node, merges its partial update, resolves
//! the next destination against the post-merge state, and repeats until a
//! terminal sentinel is reached or a guard vetoes further iteration. Retry
//! semantics are expressed as graph topology (loop-back edges), never as an
//! engine-level retry wrapper, so every attempt stays visible in the run
//! transcript.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mender_types::{MenderError, Result, RunStatus};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::events::{EventEmitter, RunEvent};
use crate::graph::Graph;
use crate::routing::Target;
use crate::state::{PartialUpdate, State};

/// Default absolute cap on node executions per run.
pub const DEFAULT_NODE_EXECUTION_CAP: usize = 100;

// ---------------------------------------------------------------------------
// Configuration and run inputs
// ---------------------------------------------------------------------------

/// Engine configuration. No process-wide state: everything the engine needs
/// arrives through this struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Absolute cap on total node executions per run, independent of any
    /// domain iteration counter. Guarantees termination for graphs whose
    /// edge rules never reach a terminal sentinel.
    pub max_node_executions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_executions: DEFAULT_NODE_EXECUTION_CAP,
        }
    }
}

/// Caller-held handle to cancel a run between node executions.
/// Cancellation never interrupts a node mid-flight.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run options.
#[derive(Default)]
pub struct RunOptions {
    /// Run identifier for checkpoints and events; a UUID v4 is generated
    /// when absent.
    pub run_id: Option<String>,
    pub cancel: Option<CancelToken>,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// What a finished run hands back to the caller.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    /// Final state: the snapshot as of the last completed merge.
    pub state: State,
    /// Names of executed nodes, in execution order.
    pub transcript: Vec<String>,
    /// The causal error for `Aborted` runs; `None` otherwise.
    pub error: Option<MenderError>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives runs of one validated [`Graph`]. Cheap to share: runs are fully
/// isolated and may execute concurrently on the same engine.
pub struct Engine {
    graph: Arc<Graph>,
    config: EngineConfig,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    events: EventEmitter,
}

impl Engine {
    pub fn new(graph: Graph, config: EngineConfig) -> Self {
        Self {
            graph: Arc::new(graph),
            config,
            checkpoints: None,
            events: EventEmitter::default(),
        }
    }

    /// Attach a checkpoint store; one snapshot is appended per completed
    /// node-merge.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Execute a run with default options.
    pub async fn run(&self, initial: PartialUpdate) -> Result<RunReport> {
        self.run_with(initial, RunOptions::default()).await
    }

    /// Execute a run from entry to termination.
    ///
    /// Returns `Err` only for pre-run configuration problems (an initial
    /// value for an undeclared field). Everything that happens after the
    /// first node starts is reported through [`RunReport::status`]: node
    /// and merge failures, routing misconfiguration, the execution cap,
    /// and cancellation all end the run as `Aborted` with the causal error
    /// preserved, alongside the state as of the last completed merge.
    pub async fn run_with(&self, initial: PartialUpdate, options: RunOptions) -> Result<RunReport> {
        let run_id = options
            .run_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut state = State::with_initial(self.graph.schema(), &initial)?;
        let mut transcript: Vec<String> = Vec::new();
        let mut current = self.graph.entry().to_string();
        let mut sequence: u64 = 0;

        tracing::info!(run_id = %run_id, graph = %self.graph.name(), entry = %current, "run started");
        self.events.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
            graph: self.graph.name().to_string(),
        });

        let (status, error) = loop {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    tracing::info!(run_id = %run_id, node = %current, "run cancelled");
                    break (RunStatus::Aborted, Some(MenderError::Cancelled));
                }
            }

            if transcript.len() >= self.config.max_node_executions {
                tracing::warn!(
                    run_id = %run_id,
                    limit = self.config.max_node_executions,
                    "node execution cap reached; graph never reached a terminal sentinel"
                );
                break (
                    RunStatus::Aborted,
                    Some(MenderError::IterationLimitExceeded {
                        limit: self.config.max_node_executions,
                    }),
                );
            }

            // The designated retry-entry node advances the cycle counter by
            // exactly one as it begins execution.
            if let Some(retry) = self.graph.retry() {
                if retry.node == current {
                    match state.merge(&retry.guard.bump(&state)) {
                        Ok(next) => {
                            tracing::debug!(
                                run_id = %run_id,
                                attempts = retry.guard.attempts(&next),
                                "retry cycle entered"
                            );
                            state = next;
                        }
                        Err(e) => break (RunStatus::Aborted, Some(e)),
                    }
                }
            }

            let node = match self.graph.node(&current) {
                Some(node) => node,
                None => {
                    // Unreachable for a built graph; kept as a typed failure
                    // rather than a panic.
                    break (
                        RunStatus::Aborted,
                        Some(MenderError::InvalidGraph(format!(
                            "current node '{current}' is not registered"
                        ))),
                    );
                }
            };

            self.events.emit(RunEvent::NodeStarted {
                run_id: run_id.clone(),
                node: current.clone(),
            });
            tracing::info!(run_id = %run_id, node = %current, "node started");

            let update = match node.run(&state).await {
                Ok(update) => update,
                Err(cause) => {
                    tracing::warn!(run_id = %run_id, node = %current, error = %cause, "node failed");
                    break (
                        RunStatus::Aborted,
                        Some(MenderError::NodeExecution {
                            node: current.clone(),
                            cause: Box::new(cause),
                        }),
                    );
                }
            };

            let updated_fields: Vec<String> = update.fields().map(String::from).collect();
            state = match state.merge(&update) {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(run_id = %run_id, node = %current, error = %e, "merge rejected");
                    break (RunStatus::Aborted, Some(e));
                }
            };
            transcript.push(current.clone());
            tracing::debug!(
                run_id = %run_id,
                node = %current,
                version = state.version(),
                fields = ?updated_fields,
                "update merged"
            );
            self.events.emit(RunEvent::NodeCompleted {
                run_id: run_id.clone(),
                node: current.clone(),
                updated_fields,
                state_version: state.version(),
            });

            if let Some(store) = &self.checkpoints {
                let checkpoint = Checkpoint::capture(&run_id, sequence, &current, &state);
                if let Err(e) = store.append(checkpoint).await {
                    tracing::warn!(run_id = %run_id, error = %e, "checkpoint write failed");
                    break (RunStatus::Aborted, Some(e));
                }
                self.events.emit(RunEvent::CheckpointSaved {
                    run_id: run_id.clone(),
                    sequence,
                });
                sequence += 1;
            }

            let rule = match self.graph.rule(&current) {
                Some(rule) => rule,
                None => {
                    break (
                        RunStatus::Aborted,
                        Some(MenderError::InvalidGraph(format!(
                            "node '{current}' has no outgoing rule"
                        ))),
                    );
                }
            };
            match rule.resolve(&current, &state) {
                Ok(Target::Succeed) => break (RunStatus::Succeeded, None),
                Ok(Target::Exhaust) => break (RunStatus::Exhausted, None),
                Ok(Target::Node(next)) => {
                    self.events.emit(RunEvent::EdgeResolved {
                        run_id: run_id.clone(),
                        from: current.clone(),
                        to: next.clone(),
                    });
                    tracing::debug!(run_id = %run_id, from = %current, to = %next, "edge resolved");
                    current = next;
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, node = %current, error = %e, "routing rejected");
                    break (RunStatus::Aborted, Some(e));
                }
            }
        };

        tracing::info!(
            run_id = %run_id,
            status = %status,
            steps = transcript.len(),
            "run finished"
        );
        self.events.emit(RunEvent::RunFinished {
            run_id: run_id.clone(),
            status,
            steps: transcript.len(),
        });

        Ok(RunReport {
            run_id,
            status,
            state,
            transcript,
            error,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
