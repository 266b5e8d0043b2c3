use std::collections::VecDeque;

use crate::tree::Tree;
use crate::types::NodeId;

/// Breadth-first walk yielding `(node, depth)`, starting with the seed at depth 0.
///
/// With `max_depth` set, nodes deeper than it are neither yielded nor expanded.
pub struct BreadthFirst<'a> {
    tree: &'a Tree,
    queue: VecDeque<(NodeId, usize)>,
    max_depth: Option<usize>,
}

impl<'a> BreadthFirst<'a> {
    pub fn new(tree: &'a Tree, seed: NodeId, max_depth: Option<usize>) -> Self {
        let mut queue = VecDeque::new();
        if tree.node(seed).is_some() {
            queue.push_back((seed, 0));
        }
        Self {
            tree,
            queue,
            max_depth,
        }
    }
}

impl Iterator for BreadthFirst<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.queue.pop_front()?;
        if self.max_depth.is_none_or(|max| depth < max) {
            self.queue.extend(
                self.tree
                    .children(id)
                    .iter()
                    .map(|&child| (child, depth + 1)),
            );
        }
        Some((id, depth))
    }
}

/// Walks upwards through the parent index, nearest ancestor first.
pub fn ancestors(tree: &Tree, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::successors(tree.parent(id), move |&current| tree.parent(current))
}

/// Every node of the subtree at `id`, parent before children, in document order.
pub fn preorder(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        out.push(current);
        stack.extend(tree.children(current).iter().rev().copied());
    }
    out
}
