//! Scoped search and the chainable node handles.
//!
//! Searches are breadth-first from a seed node. The seed itself sits at depth 0 and is
//! tested against the criterion like any other node, so a `Children` search on an element
//! that matches returns that element first.
use std::fmt;

use crate::printer::node_to_markup;
use crate::traverse::{BreadthFirst, ancestors, preorder};
use crate::tree::Tree;
use crate::types::{Node, NodeId};

const CLASS_ATTR: &str = "class";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("search takes exactly one criterion, got {0}")]
    AmbiguousSearch(String),
    #[error("search needs a tag, attribute or attribute value criterion")]
    MissingCriterion,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Criterion {
    Tag(String),
    HasAttr(String),
    /// Compares against the first attribute with that key.
    AttrEquals(String, String),
}

impl Criterion {
    pub fn tag(tag: impl Into<String>) -> Self {
        Criterion::Tag(tag.into())
    }

    pub fn has_attr(key: impl Into<String>) -> Self {
        Criterion::HasAttr(key.into())
    }

    pub fn attr_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Criterion::AttrEquals(key.into(), value.into())
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Criterion::Tag(tag) => node.tag() == tag,
            Criterion::HasAttr(key) => node.attr(key).is_some(),
            Criterion::AttrEquals(key, value) => node.attr(key) == Some(value.as_str()),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Tag(tag) => write!(f, "tag={tag}"),
            Criterion::HasAttr(key) => write!(f, "[{key}]"),
            Criterion::AttrEquals(key, value) => write!(f, "[{key}={value:?}]"),
        }
    }
}

/// Loosely-typed search request as a caller might assemble it from optional inputs.
#[derive(Clone, Debug, Default)]
pub struct SearchSpec {
    criteria: Vec<Criterion>,
}

impl SearchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.criteria.push(Criterion::tag(tag));
        self
    }

    pub fn attr(mut self, key: impl Into<String>) -> Self {
        self.criteria.push(Criterion::has_attr(key));
        self
    }

    pub fn attr_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.push(Criterion::attr_eq(key, value));
        self
    }

    /// The single criterion of this request.
    pub fn criterion(&self) -> Result<&Criterion, QueryError> {
        match self.criteria.as_slice() {
            [] => Err(QueryError::MissingCriterion),
            [only] => Ok(only),
            many => Err(QueryError::AmbiguousSearch(
                many.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// The seed and its direct children.
    Children,
    Descendants,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    First,
    All,
}

pub fn find(
    tree: &Tree,
    node: NodeId,
    criterion: &Criterion,
    scope: Scope,
    cardinality: Cardinality,
) -> Vec<NodeId> {
    let max_depth = match scope {
        Scope::Children => Some(1),
        Scope::Descendants => None,
    };
    let mut matches = Vec::new();
    for (id, _) in BreadthFirst::new(tree, node, max_depth) {
        let Some(candidate) = tree.node(id) else {
            continue;
        };
        if criterion.matches(candidate) {
            matches.push(id);
            if cardinality == Cardinality::First {
                break;
            }
        }
    }
    matches
}

pub fn find_with(
    tree: &Tree,
    node: NodeId,
    spec: &SearchSpec,
    scope: Scope,
    cardinality: Cardinality,
) -> Result<Vec<NodeId>, QueryError> {
    let criterion = spec.criterion()?;
    Ok(find(tree, node, criterion, scope, cardinality))
}

/// Read-only view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(tree: &'a Tree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn node(&self) -> &'a Node {
        match self.tree.node(self.id) {
            Some(node) => node,
            None => unreachable!("node handles are only created for live ids"),
        }
    }

    pub fn tag(&self) -> &'a str {
        self.node().tag()
    }

    pub fn attributes(&self) -> &'a [(String, String)] {
        self.node().attributes()
    }

    pub fn get_attr(&self, key: &str) -> Option<&'a str> {
        self.node().attr(key)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr(CLASS_ATTR)
            .is_some_and(|value| value.split_whitespace().any(|token| token == class))
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree.parent(self.id).map(|id| NodeRef::new(self.tree, id))
    }

    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        ancestors(tree, self.id).map(move |id| NodeRef::new(tree, id))
    }

    pub fn find(&self, criterion: &Criterion, scope: Scope, cardinality: Cardinality) -> Vec<NodeRef<'a>> {
        find(self.tree, self.id, criterion, scope, cardinality)
            .into_iter()
            .map(|id| NodeRef::new(self.tree, id))
            .collect()
    }

    fn first(&self, criterion: &Criterion, scope: Scope) -> Option<NodeRef<'a>> {
        self.find(criterion, scope, Cardinality::First).into_iter().next()
    }

    /// First match among this node and its direct children.
    pub fn child(&self, criterion: &Criterion) -> Option<NodeRef<'a>> {
        self.first(criterion, Scope::Children)
    }

    pub fn children(&self, criterion: &Criterion) -> Vec<NodeRef<'a>> {
        self.find(criterion, Scope::Children, Cardinality::All)
    }

    /// First match among this node and all its descendants.
    pub fn descendant(&self, criterion: &Criterion) -> Option<NodeRef<'a>> {
        self.first(criterion, Scope::Descendants)
    }

    pub fn descendants(&self, criterion: &Criterion) -> Vec<NodeRef<'a>> {
        self.find(criterion, Scope::Descendants, Cardinality::All)
    }

    /// Concatenated text of every text node in the subtree, in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for id in preorder(self.tree, self.id) {
            if let Some(Node::Text { text }) = self.tree.node(id) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn to_markup(&self) -> String {
        node_to_markup(self.tree, self.id)
    }
}

/// Mutable view of one node. Mutators edit the tree in place and return the handle for
/// chaining.
pub struct NodeMut<'a> {
    tree: &'a mut Tree,
    id: NodeId,
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(tree: &'a mut Tree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn view(&self) -> NodeRef<'_> {
        NodeRef::new(self.tree, self.id)
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.tree.node(self.id).and_then(|node| node.attr(key))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.view().has_class(class)
    }

    /// Replaces the first attribute named `key`, or appends it when absent.
    pub fn set_attr(&mut self, key: &str, value: &str) -> &mut Self {
        if !self.tree.set_attr(self.id, key, value) {
            log::debug!(
                target: "markup.query",
                "ignoring attribute {key:?} on {:?}, which carries no attributes",
                self.id
            );
        }
        self
    }

    /// Appends `class` to the class list unless it is already one of its tokens.
    pub fn add_class(&mut self, class: &str) -> &mut Self {
        let updated = match self.get_attr(CLASS_ATTR) {
            None => class.to_string(),
            Some(current) if current.split_whitespace().any(|token| token == class) => {
                return self;
            }
            Some(current) if current.trim().is_empty() => class.to_string(),
            Some(current) => format!("{current} {class}"),
        };
        self.set_attr(CLASS_ATTR, &updated)
    }

    /// Discards every existing class and sets `class` as the only one.
    pub fn set_class(&mut self, class: &str) -> &mut Self {
        self.set_attr(CLASS_ATTR, class)
    }
}
