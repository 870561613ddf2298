//! Node trait, dynamic dispatch wrapper, and node registry.

use std::collections::HashMap;

use async_trait::async_trait;

use mender_types::Result;

use crate::state::{PartialUpdate, State};

// ---------------------------------------------------------------------------
// Node trait
// ---------------------------------------------------------------------------

/// A named unit of state-transforming work.
///
/// A node receives the current immutable state snapshot and returns a
/// partial update — never the full state. Nodes hold no state between
/// invocations; everything persistent flows through [`State`]. A node may
/// call one external collaborator per invocation.
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique name of this node within its graph.
    fn name(&self) -> &str;

    /// Fields this node may write. Checked against the schema at
    /// graph-build time; not enforced at runtime.
    fn declared_outputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute this node against the current state.
    async fn run(&self, state: &State) -> Result<PartialUpdate>;
}

// ---------------------------------------------------------------------------
// DynNode — object-safe wrapper
// ---------------------------------------------------------------------------

pub struct DynNode(Box<dyn Node>);

impl DynNode {
    pub fn new(node: impl Node + 'static) -> Self {
        Self(Box::new(node))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn declared_outputs(&self) -> Vec<String> {
        self.0.declared_outputs()
    }

    pub async fn run(&self, state: &State) -> Result<PartialUpdate> {
        self.0.run(state).await
    }
}

// ---------------------------------------------------------------------------
// FnNode — a node from a plain function
// ---------------------------------------------------------------------------

/// A node backed by a synchronous pure function. Handy for routing-only
/// steps and for tests; nodes that await a collaborator implement [`Node`]
/// directly.
pub struct FnNode {
    name: String,
    outputs: Vec<String>,
    work: Box<dyn Fn(&State) -> Result<PartialUpdate> + Send + Sync>,
}

impl FnNode {
    pub fn new(
        name: impl Into<String>,
        work: impl Fn(&State) -> Result<PartialUpdate> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            outputs: Vec::new(),
            work: Box::new(work),
        }
    }

    /// Declare the fields this node writes.
    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl Node for FnNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    async fn run(&self, state: &State) -> Result<PartialUpdate> {
        (self.work)(state)
    }
}

// ---------------------------------------------------------------------------
// NodeRegistry
// ---------------------------------------------------------------------------

/// Name-keyed collection of the nodes a graph can execute.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, DynNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own name. Re-registering a name replaces
    /// the previous node.
    pub fn register(&mut self, node: impl Node + 'static) {
        let dyn_node = DynNode::new(node);
        self.nodes.insert(dyn_node.name().to_string(), dyn_node);
    }

    pub fn get(&self, name: &str) -> Option<&DynNode> {
        self.nodes.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}
