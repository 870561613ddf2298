//! Edge resolution: fixed successors, routing predicates, terminal sentinels.
//!
//! After a node completes and its update is merged, the engine consults the
//! node's single outgoing [`EdgeRule`]. Conditional rules carry a predicate
//! over the post-merge state plus the closed set of destinations it may
//! return; anything outside that set is a configuration error.

use serde::{Deserialize, Serialize};

use mender_types::{MenderError, Result};

use crate::state::State;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Where control flows after a node: another node, or a terminal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Continue with the named node.
    Node(String),
    /// End the run with status `succeeded`.
    Succeed,
    /// End the run with status `exhausted` — gave up within policy.
    Exhaust,
}

impl Target {
    pub fn node(name: impl Into<String>) -> Self {
        Target::Node(name.into())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Target::Node(_))
    }

    /// Display name used in logs and events.
    pub fn describe(&self) -> &str {
        match self {
            Target::Node(name) => name,
            Target::Succeed => "<succeed>",
            Target::Exhaust => "<exhaust>",
        }
    }
}

// ---------------------------------------------------------------------------
// EdgeRule
// ---------------------------------------------------------------------------

/// Predicate over post-merge state, returning one of a closed destination set.
pub type RouterFn = dyn Fn(&State) -> Target + Send + Sync;

/// The single outgoing resolution rule of a node.
pub enum EdgeRule {
    /// Unconditional successor.
    Direct(Target),
    /// Predicate-driven successor with a declared destination set.
    Conditional {
        router: Box<RouterFn>,
        targets: Vec<Target>,
    },
}

impl EdgeRule {
    pub fn direct(target: Target) -> Self {
        EdgeRule::Direct(target)
    }

    pub fn conditional(
        targets: Vec<Target>,
        router: impl Fn(&State) -> Target + Send + Sync + 'static,
    ) -> Self {
        EdgeRule::Conditional {
            router: Box::new(router),
            targets,
        }
    }

    /// Every destination this rule may produce.
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            EdgeRule::Direct(target) => vec![target],
            EdgeRule::Conditional { targets, .. } => targets.iter().collect(),
        }
    }

    /// Resolve the successor of `node` against the post-merge `state`.
    ///
    /// For conditional rules the predicate result is checked against the
    /// declared destination set; a stray destination fails with
    /// [`MenderError::RoutingConfiguration`]. This is the runtime backstop
    /// behind the build-time target validation.
    pub fn resolve(&self, node: &str, state: &State) -> Result<Target> {
        match self {
            EdgeRule::Direct(target) => Ok(target.clone()),
            EdgeRule::Conditional { router, targets } => {
                let chosen = router(state);
                if targets.contains(&chosen) {
                    Ok(chosen)
                } else {
                    Err(MenderError::RoutingConfiguration {
                        node: node.to_string(),
                        destination: chosen.describe().to_string(),
                    })
                }
            }
        }
    }
}

impl std::fmt::Debug for EdgeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeRule::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            EdgeRule::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("targets", targets)
                .finish_non_exhaustive(),
        }
    }
}
