//! Cycle guard: the bounded-iteration policy for retry loops.
//!
//! Graphs may legally contain cycles. Termination of the retry loop is the
//! job of a designated counter field in state: it increments by exactly one
//! each time the designated retry-entry node begins execution (per-cycle
//! counting, not per-node), and routing predicates consult it to force the
//! `exhausted` terminal once the ceiling is reached. The engine additionally
//! enforces an absolute cap on total node executions per run, independent of
//! this counter.

use serde_json::json;

use crate::state::{PartialUpdate, State};

/// Default ceiling on retry-loop cycles.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Watches a designated counter field against a configured ceiling.
///
/// The counter is authoritative and monotonically non-decreasing within a
/// run; it is the only field that may force termination due to iteration
/// exhaustion.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    field: String,
    ceiling: u32,
}

impl CycleGuard {
    pub fn new(field: impl Into<String>, ceiling: u32) -> Self {
        Self {
            field: field.into(),
            ceiling,
        }
    }

    /// A guard over `field` with the default ceiling of 3.
    pub fn with_default_ceiling(field: impl Into<String>) -> Self {
        Self::new(field, DEFAULT_MAX_ITERATIONS)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Current attempt count recorded in state; 0 when unset.
    pub fn attempts(&self, state: &State) -> u64 {
        state.get_u64(&self.field)
    }

    /// `true` once the counter has reached the ceiling.
    pub fn exhausted(&self, state: &State) -> bool {
        self.attempts(state) >= u64::from(self.ceiling)
    }

    /// The overwrite-merge that advances the counter by exactly one.
    pub fn bump(&self, state: &State) -> PartialUpdate {
        PartialUpdate::new().with(self.field.clone(), json!(self.attempts(state) + 1))
    }
}
