//! Self-healing remediation workflow on the Mender graph engine.
//!
//! Investigate → fix → validate → publish, with a bounded self-correction
//! loop: a rejected fix routes back to the investigator carrying the
//! validator's findings, up to a configured number of attempt cycles.
//!
//! ```text
//!   investigator ──► mechanic ──► validator ──► publisher ──► <succeed>
//!        ▲   ▲                        │
//!        │   └────────────────────────┘  (fix rejected, budget left)
//!        └── (root cause unclear, budget left)
//! ```
//!
//! All node bodies delegate their real work to the collaborator traits in
//! `mender-collab`; this crate wires them into a validated graph.

pub mod analyst;
pub mod nodes;
pub mod routing;
pub mod state;

use std::sync::Arc;

use mender_collab::{FixGenerator, FixValidator, LogFilter, LogSource, Publisher};
use mender_graph::{CycleGuard, Graph, GraphBuilder, Target, DEFAULT_MAX_ITERATIONS};
use mender_types::Result;

pub use analyst::{Analysis, Analyst, ScriptedAnalyst, SignatureAnalyst};
pub use nodes::{
    InvestigatorNode, MechanicNode, PublisherNode, ValidatorNode, INVESTIGATOR, MECHANIC,
    PUBLISHER, VALIDATOR,
};
pub use routing::{investigation_gate, validation_gate};
pub use state::{initial_state, schema, ITERATION_COUNT};

/// Workflow configuration, passed explicitly into the graph factory.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Ceiling on self-correction cycles before the run exhausts.
    pub max_iterations: u32,
    /// What the investigator fetches each cycle.
    pub log_filter: LogFilter,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            log_filter: LogFilter::default(),
        }
    }
}

/// The external collaborators the workflow delegates to.
pub struct Collaborators {
    pub logs: Arc<dyn LogSource>,
    pub analyst: Arc<dyn Analyst>,
    pub generator: Arc<dyn FixGenerator>,
    pub validator: Arc<dyn FixValidator>,
    pub publisher: Arc<dyn Publisher>,
}

/// Build and validate the self-healing graph.
///
/// The investigator is the designated retry-entry node: the iteration
/// counter advances once per entry, and both gates consult it against
/// `config.max_iterations`.
pub fn self_healing_graph(collaborators: Collaborators, config: &WorkflowConfig) -> Result<Graph> {
    let guard = CycleGuard::new(ITERATION_COUNT, config.max_iterations);

    GraphBuilder::new("self_healing", schema())
        .add_node(InvestigatorNode::new(
            collaborators.logs,
            collaborators.analyst,
            config.log_filter.clone(),
        ))
        .add_node(MechanicNode::new(collaborators.generator))
        .add_node(ValidatorNode::new(collaborators.validator))
        .add_node(PublisherNode::new(collaborators.publisher))
        .entry_point(INVESTIGATOR)
        .retry_loop(INVESTIGATOR, guard.clone())
        .add_conditional_edge(
            INVESTIGATOR,
            vec![
                Target::node(MECHANIC),
                Target::node(INVESTIGATOR),
                Target::Exhaust,
            ],
            investigation_gate(guard.clone()),
        )
        .add_edge(MECHANIC, Target::node(VALIDATOR))
        .add_conditional_edge(
            VALIDATOR,
            vec![
                Target::node(PUBLISHER),
                Target::node(INVESTIGATOR),
                Target::Exhaust,
            ],
            validation_gate(guard),
        )
        .add_edge(PUBLISHER, Target::Succeed)
        .build()
}
