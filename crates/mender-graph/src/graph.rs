//! Graph definition and build-time validation.
//!
//! A [`Graph`] is the immutable composition the engine executes: a state
//! schema, a node registry, exactly one outgoing [`EdgeRule`] per node, an
//! entry node, and an optional designated retry loop. [`GraphBuilder::build`]
//! catches configuration-shape errors — unknown destinations, undeclared
//! node outputs, a missing entry — before any run starts.

use std::collections::HashMap;
use std::sync::Arc;

use mender_types::{MenderError, Result};

use crate::cycle::CycleGuard;
use crate::node::{DynNode, Node, NodeRegistry};
use crate::routing::{EdgeRule, Target};
use crate::state::{MergePolicy, StateSchema};

// ---------------------------------------------------------------------------
// RetryLoop
// ---------------------------------------------------------------------------

/// The designated retry-entry node and its cycle guard. The engine advances
/// the guard's counter each time this node begins execution.
#[derive(Debug, Clone)]
pub struct RetryLoop {
    pub node: String,
    pub guard: CycleGuard,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// An executable graph: validated, immutable, shareable across runs.
pub struct Graph {
    name: String,
    schema: Arc<StateSchema>,
    registry: NodeRegistry,
    rules: HashMap<String, EdgeRule>,
    entry: String,
    retry: Option<RetryLoop>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("entry", &self.entry)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Arc<StateSchema> {
        Arc::clone(&self.schema)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn retry(&self) -> Option<&RetryLoop> {
        self.retry.as_ref()
    }

    pub fn node(&self, name: &str) -> Option<&DynNode> {
        self.registry.get(name)
    }

    pub fn rule(&self, name: &str) -> Option<&EdgeRule> {
        self.rules.get(name)
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

pub struct GraphBuilder {
    name: String,
    schema: StateSchema,
    registry: NodeRegistry,
    rules: HashMap<String, EdgeRule>,
    duplicate_rules: Vec<String>,
    entry: Option<String>,
    retry: Option<RetryLoop>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>, schema: StateSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            registry: NodeRegistry::new(),
            rules: HashMap::new(),
            duplicate_rules: Vec::new(),
            entry: None,
            retry: None,
        }
    }

    pub fn add_node(mut self, node: impl Node + 'static) -> Self {
        self.registry.register(node);
        self
    }

    /// Unconditional edge `from → to`.
    pub fn add_edge(self, from: impl Into<String>, to: Target) -> Self {
        self.set_rule(from.into(), EdgeRule::direct(to))
    }

    /// Conditional edge: after `from`, run `router` against the post-merge
    /// state; it must return one of `targets`.
    pub fn add_conditional_edge(
        self,
        from: impl Into<String>,
        targets: Vec<Target>,
        router: impl Fn(&crate::state::State) -> Target + Send + Sync + 'static,
    ) -> Self {
        self.set_rule(from.into(), EdgeRule::conditional(targets, router))
    }

    fn set_rule(mut self, from: String, rule: EdgeRule) -> Self {
        if self.rules.contains_key(&from) {
            self.duplicate_rules.push(from.clone());
        }
        self.rules.insert(from, rule);
        self
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Designate `node` as the retry-entry node watched by `guard`.
    pub fn retry_loop(mut self, node: impl Into<String>, guard: CycleGuard) -> Self {
        self.retry = Some(RetryLoop {
            node: node.into(),
            guard,
        });
        self
    }

    /// Validate the composition and freeze it into a [`Graph`].
    pub fn build(self) -> Result<Graph> {
        let entry = self
            .entry
            .ok_or_else(|| MenderError::InvalidGraph("no entry node designated".into()))?;
        if !self.registry.has(&entry) {
            return Err(MenderError::InvalidGraph(format!(
                "entry node '{entry}' is not registered"
            )));
        }

        if let Some(dup) = self.duplicate_rules.first() {
            return Err(MenderError::InvalidGraph(format!(
                "node '{dup}' has more than one outgoing rule"
            )));
        }

        for (from, rule) in &self.rules {
            if !self.registry.has(from) {
                return Err(MenderError::InvalidGraph(format!(
                    "edge rule declared for unknown node '{from}'"
                )));
            }
            if let EdgeRule::Conditional { targets, .. } = rule {
                if targets.is_empty() {
                    return Err(MenderError::InvalidGraph(format!(
                        "conditional rule for '{from}' declares no destinations"
                    )));
                }
            }
            for target in rule.targets() {
                if let Target::Node(to) = target {
                    if !self.registry.has(to) {
                        return Err(MenderError::InvalidGraph(format!(
                            "rule for '{from}' points at unknown node '{to}'"
                        )));
                    }
                }
            }
        }

        // Exactly one outgoing rule per node.
        for name in self.registry.names() {
            if !self.rules.contains_key(name) {
                return Err(MenderError::InvalidGraph(format!(
                    "node '{name}' has no outgoing rule"
                )));
            }
        }

        // Declared outputs must exist in the schema.
        for name in self.registry.names() {
            let node = self.registry.get(name).expect("registered");
            for field in node.declared_outputs() {
                if !self.schema.contains(&field) {
                    return Err(MenderError::InvalidGraph(format!(
                        "node '{name}' declares output '{field}' which has no merge policy"
                    )));
                }
            }
        }

        if let Some(retry) = &self.retry {
            if !self.registry.has(&retry.node) {
                return Err(MenderError::InvalidGraph(format!(
                    "retry-entry node '{}' is not registered",
                    retry.node
                )));
            }
            match self.schema.policy(retry.guard.field()) {
                Some(MergePolicy::Overwrite) => {}
                Some(MergePolicy::Append) => {
                    return Err(MenderError::InvalidGraph(format!(
                        "cycle guard field '{}' must use the overwrite policy",
                        retry.guard.field()
                    )));
                }
                None => {
                    return Err(MenderError::InvalidGraph(format!(
                        "cycle guard field '{}' has no merge policy",
                        retry.guard.field()
                    )));
                }
            }
        }

        Ok(Graph {
            name: self.name,
            schema: Arc::new(self.schema),
            registry: self.registry,
            rules: self.rules,
            entry,
            retry: self.retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FnNode;
    use crate::state::PartialUpdate;
    use serde_json::json;

    fn schema() -> StateSchema {
        StateSchema::builder()
            .field("out", MergePolicy::Overwrite)
            .field_with_default("attempts", MergePolicy::Overwrite, json!(0))
            .field("log", MergePolicy::Append)
            .build()
    }

    fn noop(name: &str) -> FnNode {
        FnNode::new(name, |_| Ok(PartialUpdate::new()))
    }

    #[test]
    fn minimal_graph_builds() {
        let graph = GraphBuilder::new("mini", schema())
            .add_node(noop("only"))
            .entry_point("only")
            .add_edge("only", Target::Succeed)
            .build()
            .unwrap();

        assert_eq!(graph.name(), "mini");
        assert_eq!(graph.entry(), "only");
        assert_eq!(graph.node_count(), 1);
        assert!(graph.node("only").is_some());
        assert!(graph.rule("only").is_some());
        assert!(graph.retry().is_none());
    }

    #[test]
    fn missing_entry_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .add_edge("a", Target::Succeed)
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("entry")));
    }

    #[test]
    fn unregistered_entry_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .add_edge("a", Target::Succeed)
            .entry_point("ghost")
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("ghost")));
    }

    #[test]
    fn edge_to_unknown_node_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_edge("a", Target::node("missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("missing")));
    }

    #[test]
    fn conditional_target_to_unknown_node_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_conditional_edge("a", vec![Target::node("phantom"), Target::Succeed], |_| {
                Target::Succeed
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("phantom")));
    }

    #[test]
    fn node_without_rule_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .add_node(noop("b"))
            .entry_point("a")
            .add_edge("a", Target::node("b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("'b' has no outgoing rule")));
    }

    #[test]
    fn duplicate_rule_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .add_edge("a", Target::Exhaust)
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("more than one")));
    }

    #[test]
    fn empty_conditional_destination_set_fails() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_conditional_edge("a", Vec::new(), |_| Target::Succeed)
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("no destinations")));
    }

    #[test]
    fn undeclared_output_fails_at_build_time() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a").with_outputs(&["no_such_field"]))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("no_such_field")));
    }

    #[test]
    fn declared_outputs_within_schema_build() {
        let graph = GraphBuilder::new("g", schema())
            .add_node(noop("a").with_outputs(&["out", "log"]))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn retry_loop_requires_registered_node() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .retry_loop("ghost", CycleGuard::new("attempts", 3))
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("ghost")));
    }

    #[test]
    fn guard_field_must_be_declared_overwrite() {
        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .retry_loop("a", CycleGuard::new("log", 3))
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("overwrite")));

        let err = GraphBuilder::new("g", schema())
            .add_node(noop("a"))
            .entry_point("a")
            .add_edge("a", Target::Succeed)
            .retry_loop("a", CycleGuard::new("undeclared", 3))
            .build()
            .unwrap_err();
        assert!(matches!(err, MenderError::InvalidGraph(msg) if msg.contains("no merge policy")));
    }

    #[test]
    fn cyclic_topology_is_structurally_legal() {
        let graph = GraphBuilder::new("loop", schema())
            .add_node(noop("a"))
            .add_node(noop("b"))
            .entry_point("a")
            .add_edge("a", Target::node("b"))
            .add_edge("b", Target::node("a"))
            .build();
        assert!(graph.is_ok());
    }
}
