//! Paths through the resolution DAG, recorded for diagnostics.

use std::cell::RefCell;
use std::fmt;

use serde::Serialize;

use super::dag::NodeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PathNode {
    pub node_id: NodeId,
    pub description: String,
}

/// Nodes visited from the traversal root, root first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResolutionPath {
    pub nodes: Vec<PathNode>,
}

impl ResolutionPath {
    pub fn new(nodes: Vec<PathNode>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last_node(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// `prefix` followed by this path.
    pub fn with_prefix(&self, prefix: &ResolutionPath) -> Self {
        let mut nodes = prefix.nodes.clone();
        nodes.extend(self.nodes.iter().cloned());
        Self { nodes }
    }

    /// Everything but the last node.
    pub fn parent_path(&self) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.pop();
        Self { nodes }
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .nodes
            .iter()
            .map(|n| format!("[Resolve {}]", n.description))
            .collect();
        f.write_str(&rendered.join(" -> "))
    }
}

/// Stack of nodes on the current traversal path. Entries are pushed on node
/// entry and popped when the returned guard drops, including on unwind.
#[derive(Debug, Default)]
pub struct PathTracker {
    stack: RefCell<Vec<PathNode>>,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "the node is popped when the guard drops"]
    pub fn enter(&self, node_id: NodeId, description: String) -> PathGuard<'_> {
        self.stack.borrow_mut().push(PathNode {
            node_id,
            description,
        });
        PathGuard { tracker: self }
    }

    pub fn current(&self) -> ResolutionPath {
        ResolutionPath::new(self.stack.borrow().clone())
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

pub struct PathGuard<'a> {
    tracker: &'a PathTracker,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.tracker.stack.borrow_mut().pop();
    }
}
