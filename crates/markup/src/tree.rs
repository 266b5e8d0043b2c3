//! Finalized tree: an arena of nodes addressed by [`NodeId`] plus two derived indices.
//!
//! Ownership runs strictly downwards through the child lists. The parent index is a
//! separate handle -> handle map used only for upward navigation, and the id index maps an
//! `id` attribute value to the node that carries it. Both indices are global: the id index is
//! not scoped to any subtree, and on collisions the most recently recorded node wins.
use std::collections::{HashMap, HashSet};

use crate::query::{NodeMut, NodeRef};
use crate::traverse::BreadthFirst;
use crate::types::{Node, NodeId};

const ID_ATTR: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("node {0:?} is reachable through more than one parent")]
    SharedNode(NodeId),
    #[error("provisional node {0:?} is reachable from the root")]
    ProvisionalNode(NodeId),
    #[error("parent index maps {child:?} to {found:?}, expected {expected:?}")]
    WrongParent {
        child: NodeId,
        expected: NodeId,
        found: Option<NodeId>,
    },
    #[error("parent index has {0} entries for unreachable nodes")]
    DanglingParents(usize),
    #[error("id index entry {id:?} points at {node:?}, which does not carry that id")]
    StaleId { id: String, node: NodeId },
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TreeIndices {
    pub(crate) ids: HashMap<String, NodeId>,
    pub(crate) parents: HashMap<NodeId, NodeId>,
}

impl TreeIndices {
    /// Indexes a node that has just been finalized: its id, and itself as the parent of
    /// its children.
    pub(crate) fn record(&mut self, arena: &[Node], id: NodeId) {
        let node = &arena[id.index()];
        if let Some(value) = node.attr(ID_ATTR) {
            self.ids.insert(value.to_string(), id);
        }
        for &child in node.children() {
            self.parents.insert(child, id);
        }
    }

    pub(crate) fn shrink(&mut self) {
        self.ids.shrink_to_fit();
        self.parents.shrink_to_fit();
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    indices: TreeIndices,
}

impl Tree {
    pub(crate) fn from_parts(nodes: Vec<Node>, indices: TreeIndices) -> Self {
        debug_assert!(matches!(nodes.first(), Some(Node::Root { .. })));
        Self { nodes, indices }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of nodes in the arena, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(NodeId::ROOT).is_empty()
    }

    pub fn declaration(&self) -> Option<&str> {
        match &self.nodes[NodeId::ROOT.index()] {
            Node::Root { declaration, .. } => declaration.as_deref(),
            _ => None,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.indices.parents.get(&id).copied()
    }

    pub fn get_root(&self) -> NodeRef<'_> {
        NodeRef::new(self, NodeId::ROOT)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.node(id).map(|_| NodeRef::new(self, id))
    }

    /// Global lookup through the id index. A miss is not an error.
    pub fn find_by_id(&self, id: &str) -> Option<NodeRef<'_>> {
        let node = *self.indices.ids.get(id)?;
        Some(NodeRef::new(self, node))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<NodeMut<'_>> {
        if self.node(id).is_none() {
            return None;
        }
        Some(NodeMut::new(self, id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<NodeMut<'_>> {
        let node = *self.indices.ids.get(id)?;
        Some(NodeMut::new(self, node))
    }

    /// Replaces the first attribute named `key` or appends it. Keeps the id index in step
    /// when `key` is `id`. Returns false for kinds that carry no attributes.
    pub(crate) fn set_attr(&mut self, id: NodeId, key: &str, value: &str) -> bool {
        let Some(attributes) = self
            .nodes
            .get_mut(id.index())
            .and_then(Node::attributes_mut)
        else {
            return false;
        };
        let previous = match attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
            None => {
                attributes.push((key.to_string(), value.to_string()));
                None
            }
        };
        if key == ID_ATTR {
            if let Some(old) = previous {
                if self.indices.ids.get(&old) == Some(&id) {
                    self.indices.ids.remove(&old);
                }
            }
            self.indices.ids.insert(value.to_string(), id);
        }
        true
    }

    /// Checks that the derived indices agree with the owned structure.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::new();
        for (id, _) in BreadthFirst::new(self, NodeId::ROOT, None) {
            if !seen.insert(id) {
                return Err(InvariantViolation::SharedNode(id));
            }
            let node = &self.nodes[id.index()];
            if let Node::Provisional { .. } = node {
                return Err(InvariantViolation::ProvisionalNode(id));
            }
            for &child in node.children() {
                let found = self.parent(child);
                if found != Some(id) {
                    return Err(InvariantViolation::WrongParent {
                        child,
                        expected: id,
                        found,
                    });
                }
            }
        }
        let dangling = self
            .indices
            .parents
            .keys()
            .filter(|child| !seen.contains(*child))
            .count();
        if dangling > 0 {
            return Err(InvariantViolation::DanglingParents(dangling));
        }
        for (value, &node) in &self.indices.ids {
            let carries = seen.contains(&node)
                && self.nodes[node.index()].attr(ID_ATTR) == Some(value.as_str());
            if !carries {
                return Err(InvariantViolation::StaleId {
                    id: value.clone(),
                    node,
                });
            }
        }
        Ok(())
    }
}
