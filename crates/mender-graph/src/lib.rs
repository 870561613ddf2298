//! Cyclic state-graph execution engine.
//!
//! This crate implements the core Mender runtime: a typed, versioned state
//! container with per-field merge policies, a node registry, predicate-driven
//! edge resolution with closed destination sets, a cycle guard bounding retry
//! loops, the sequential execution loop, and an optional append-only
//! checkpoint store.
//!
//! Graphs may contain cycles; termination is guaranteed by the designated
//! iteration counter consulted by routing predicates plus an engine-level
//! absolute cap on node executions. Retry policy is always graph topology —
//! loop-back edges — so every attempt is visible in the run transcript.

pub mod checkpoint;
pub mod cycle;
pub mod engine;
pub mod events;
pub mod graph;
pub mod node;
pub mod routing;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use cycle::{CycleGuard, DEFAULT_MAX_ITERATIONS};
pub use engine::{
    CancelToken, Engine, EngineConfig, RunOptions, RunReport, DEFAULT_NODE_EXECUTION_CAP,
};
pub use events::{EventEmitter, RunEvent};
pub use graph::{Graph, GraphBuilder, RetryLoop};
pub use node::{DynNode, FnNode, Node, NodeRegistry};
pub use routing::{EdgeRule, RouterFn, Target};
pub use state::{MergePolicy, PartialUpdate, State, StateSchema, StateSchemaBuilder};

pub use mender_types::{MenderError, Result, RunStatus};
