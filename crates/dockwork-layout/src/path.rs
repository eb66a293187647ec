//! Root-to-node addressing by id chain.

use std::fmt;

use crate::node::{DockModelError, NodeId};
use crate::tree::DockTree;

/// Chain of node ids from the root to a target node.
///
/// Equality compares the full sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<NodeId>);

impl NodePath {
    /// Build a path from explicit ids, root first.
    pub fn new(ids: Vec<NodeId>) -> Result<Self, DockModelError> {
        if ids.is_empty() {
            return Err(DockModelError::EmptyPath);
        }
        Ok(Self(ids))
    }

    /// Parse `a/b/c`. Segments are trimmed; blank segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, DockModelError> {
        let ids = raw
            .split('/')
            .map(NodeId::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ids)
    }

    /// Path of `node_id` obtained by walking parent links.
    pub fn from_node(tree: &DockTree, node_id: &NodeId) -> Result<Self, DockModelError> {
        let mut current = tree
            .node(node_id.as_str())
            .ok_or_else(|| DockModelError::MissingNode {
                node_id: node_id.clone(),
            })?;
        let mut ids = vec![current.id().clone()];
        while let Some(parent_id) = current.parent() {
            let Some(parent) = tree.node(parent_id.as_str()) else {
                break;
            };
            if ids.contains(parent.id()) {
                break;
            }
            ids.push(parent.id().clone());
            current = parent;
        }
        ids.reverse();
        Ok(Self(ids))
    }

    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    /// Id of the addressed node.
    #[must_use]
    pub fn target(&self) -> &NodeId {
        // Construction guarantees at least one id.
        &self.0[self.0.len() - 1]
    }

    /// Resolve the addressed node in `tree`.
    ///
    /// Walks children by id from the root. If the root id differs or a link
    /// is broken, falls back to a depth-first search for the target id.
    #[must_use]
    pub fn resolve<'a>(&self, tree: &'a DockTree) -> Option<&'a NodeId> {
        self.walk_children(tree).or_else(|| {
            tree.walk()
                .find(|record| record.id() == self.target())
                .map(|record| record.id())
        })
    }

    fn walk_children<'a>(&self, tree: &'a DockTree) -> Option<&'a NodeId> {
        let (first, rest) = self.0.split_first()?;
        if tree.root() != first {
            return None;
        }
        let mut current = tree.root();
        for wanted in rest {
            current = tree
                .children(current.as_str())
                .into_iter()
                .find(|child| *child == wanted)?;
        }
        Some(current)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, id) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            f.write_str(id.as_str())?;
        }
        Ok(())
    }
}
