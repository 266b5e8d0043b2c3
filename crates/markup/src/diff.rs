//! Structural comparison of two trees into an ordered edit script.
//!
//! Contract:
//! - Nodes are paired by position, never by identity. Paths address the left tree.
//! - Nodes of a different kind or tag are replaced wholesale: the left subtree is deleted
//!   children-first, then the right subtree is added parent-first. Nothing below a
//!   replaced position is compared.
//! - Attributes are compared by key, first occurrence winning, and reported as additions,
//!   then removals, then changes.
//! - Surplus children are a single add or delete each, at their index.
//! - Root declarations and the self-closing marker take no part in the comparison.
//!
//! The script is meant for inspection. It is not guaranteed to replay as a patch.
use std::collections::BTreeSet;
use std::fmt;

use crate::tree::Tree;
use crate::types::{Node, NodeId};

const CLASS_ATTR: &str = "class";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PathElement {
    Child { index: usize, tag: String },
    Attribute(String),
}

/// Address of a node or attribute. The empty path is the node the comparison started at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct TreePath(Vec<PathElement>);

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize, tag: &str) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Child {
            index,
            tag: tag.to_string(),
        });
        Self(elements)
    }

    pub fn attribute(&self, name: &str) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Attribute(name.to_string()));
        Self(elements)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn tail(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            match element {
                PathElement::Child { tag, .. } => f.write_str(tag)?,
                PathElement::Attribute(name) => f.write_str(name)?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EditOp {
    /// Insert the right-tree node `node` (with its subtree) as child `position` of `path`.
    AddNode {
        path: TreePath,
        node: NodeId,
        position: usize,
    },
    DeleteNode {
        path: TreePath,
    },
    UpdateAttribute {
        path: TreePath,
        old: String,
        new: String,
    },
    AddAttribute {
        path: TreePath,
        value: String,
    },
    DeleteAttribute {
        path: TreePath,
    },
    UpdateBody {
        path: TreePath,
        body: String,
    },
}

impl EditOp {
    pub fn path(&self) -> &TreePath {
        match self {
            EditOp::AddNode { path, .. }
            | EditOp::DeleteNode { path }
            | EditOp::UpdateAttribute { path, .. }
            | EditOp::AddAttribute { path, .. }
            | EditOp::DeleteAttribute { path }
            | EditOp::UpdateBody { path, .. } => path,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            EditOp::AddNode { .. } => "add-node",
            EditOp::DeleteNode { .. } => "delete-node",
            EditOp::UpdateAttribute { .. } => "update-attribute",
            EditOp::AddAttribute { .. } => "add-attribute",
            EditOp::DeleteAttribute { .. } => "delete-attribute",
            EditOp::UpdateBody { .. } => "update-body",
        }
    }

    /// For an update of a `class` attribute, the tokens present on exactly one side, sorted.
    pub fn class_token_delta(&self) -> Option<Vec<String>> {
        let EditOp::UpdateAttribute { path, old, new } = self else {
            return None;
        };
        match path.tail() {
            Some(PathElement::Attribute(name)) if name == CLASS_ATTR => {}
            _ => return None,
        }
        let old: BTreeSet<&str> = old.split_whitespace().collect();
        let new: BTreeSet<&str> = new.split_whitespace().collect();
        Some(
            old.symmetric_difference(&new)
                .map(|token| token.to_string())
                .collect(),
        )
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind_name(), self.path())?;
        match self {
            EditOp::AddNode { node, position, .. } => write!(f, " #{} at {position}", node.0),
            EditOp::UpdateAttribute { old, new, .. } => write!(f, " {old:?} -> {new:?}"),
            EditOp::AddAttribute { value, .. } => write!(f, " {value:?}"),
            EditOp::UpdateBody { body, .. } => write!(f, " {body:?}"),
            EditOp::DeleteNode { .. } | EditOp::DeleteAttribute { .. } => Ok(()),
        }
    }
}

enum Work {
    Compare {
        left: NodeId,
        right: NodeId,
        path: TreePath,
    },
    Emit(EditOp),
}

pub fn diff(left: &Tree, right: &Tree) -> Vec<EditOp> {
    diff_nodes(left, left.root_id(), right, right.root_id())
}

/// Compares the subtree at `left_id` with the one at `right_id`. Paths are relative to
/// `left_id`.
pub fn diff_nodes(left: &Tree, left_id: NodeId, right: &Tree, right_id: NodeId) -> Vec<EditOp> {
    let mut ops = Vec::new();
    let mut work = vec![Work::Compare {
        left: left_id,
        right: right_id,
        path: TreePath::root(),
    }];
    while let Some(item) = work.pop() {
        let (lid, rid, path) = match item {
            Work::Emit(op) => {
                ops.push(op);
                continue;
            }
            Work::Compare { left, right, path } => (left, right, path),
        };
        let (Some(lnode), Some(rnode)) = (left.node(lid), right.node(rid)) else {
            continue;
        };

        if !lnode.same_shape(rnode) {
            log::trace!(
                target: "markup.diff",
                "replacing {} with {} at [{path}]",
                lnode.tag(),
                rnode.tag()
            );
            emit_deletes(left, lid, &path, &mut ops);
            emit_adds(right, rid, &path, &mut ops);
            continue;
        }

        compare_attributes(lnode, rnode, &path, &mut ops);
        if let (Some(old), Some(new)) = (lnode.body(), rnode.body()) {
            if old != new {
                ops.push(EditOp::UpdateBody {
                    path: path.clone(),
                    body: new.to_string(),
                });
            }
        }

        let lchildren = lnode.children();
        let rchildren = rnode.children();
        let mut pending = Vec::with_capacity(lchildren.len().max(rchildren.len()));
        for index in 0..lchildren.len().max(rchildren.len()) {
            let step = match (lchildren.get(index), rchildren.get(index)) {
                (Some(&l), Some(&r)) => Work::Compare {
                    left: l,
                    right: r,
                    path: path.child(index, tag_of(left, l)),
                },
                (Some(&l), None) => Work::Emit(EditOp::DeleteNode {
                    path: path.child(index, tag_of(left, l)),
                }),
                (None, Some(&r)) => Work::Emit(EditOp::AddNode {
                    path: path.clone(),
                    node: r,
                    position: index,
                }),
                (None, None) => break,
            };
            pending.push(step);
        }
        work.extend(pending.into_iter().rev());
    }
    log::debug!(target: "markup.diff", "edit script has {} operations", ops.len());
    ops
}

fn tag_of(tree: &Tree, id: NodeId) -> &str {
    tree.node(id).map(Node::tag).unwrap_or_default()
}

/// Every node of the left subtree at `path`, children before their parent.
fn emit_deletes(tree: &Tree, id: NodeId, path: &TreePath, ops: &mut Vec<EditOp>) {
    let mut stack = vec![(id, path.clone(), false)];
    while let Some((id, path, expanded)) = stack.pop() {
        if expanded {
            ops.push(EditOp::DeleteNode { path });
            continue;
        }
        let children = tree.children(id);
        stack.push((id, path.clone(), true));
        for (index, &child) in children.iter().enumerate().rev() {
            stack.push((child, path.child(index, tag_of(tree, child)), false));
        }
    }
}

/// Every node of the right subtree, parents before their children. The top node lands at
/// `path`; each add names the path of its parent.
fn emit_adds(tree: &Tree, id: NodeId, path: &TreePath, ops: &mut Vec<EditOp>) {
    let (parent, position) = match (path.parent(), path.tail()) {
        (Some(parent), Some(PathElement::Child { index, .. })) => (parent, *index),
        _ => (TreePath::root(), 0),
    };
    // The replaced node keeps its position but takes the right-hand tag in descendant paths.
    let top = if path.is_root() {
        TreePath::root()
    } else {
        parent.child(position, tag_of(tree, id))
    };
    let mut stack = vec![(id, parent, position, top)];
    while let Some((id, parent, position, here)) = stack.pop() {
        ops.push(EditOp::AddNode {
            path: parent,
            node: id,
            position,
        });
        for (index, &child) in tree.children(id).iter().enumerate().rev() {
            stack.push((
                child,
                here.clone(),
                index,
                here.child(index, tag_of(tree, child)),
            ));
        }
    }
}

/// First occurrence of every key, in stored order.
fn first_occurrences(attributes: &[(String, String)]) -> Vec<(&str, &str)> {
    let mut seen = BTreeSet::new();
    attributes
        .iter()
        .filter(|(key, _)| seen.insert(key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

fn compare_attributes(left: &Node, right: &Node, path: &TreePath, ops: &mut Vec<EditOp>) {
    let lattrs = first_occurrences(left.attributes());
    let rattrs = first_occurrences(right.attributes());
    let lookup = |attrs: &[(&str, &str)], key: &str| {
        attrs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    };

    for &(key, value) in &rattrs {
        if lookup(&lattrs, key).is_none() {
            ops.push(EditOp::AddAttribute {
                path: path.attribute(key),
                value: value.to_string(),
            });
        }
    }
    for &(key, _) in &lattrs {
        if lookup(&rattrs, key).is_none() {
            ops.push(EditOp::DeleteAttribute {
                path: path.attribute(key),
            });
        }
    }
    for &(key, old) in &lattrs {
        if let Some(new) = lookup(&rattrs, key) {
            if old != new {
                ops.push(EditOp::UpdateAttribute {
                    path: path.attribute(key),
                    old: old.to_string(),
                    new,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn script(left: &str, right: &str) -> Vec<String> {
        let left = parse(left).expect("left");
        let right = parse(right).expect("right");
        diff(&left, &right).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn identical_trees_diff_empty() {
        let doc = "<!DOCTYPE html><html><body><p class=\"a\">x<br>y</p><!-- c --></body></html>";
        let tree = parse(doc).expect("parse");
        assert!(diff(&tree, &tree).is_empty());
    }

    #[test]
    fn single_attribute_change_has_precise_path() {
        let left = parse(r#"<html class="foo"></html>"#).expect("left");
        let right = parse(r#"<html class="bar"></html>"#).expect("right");
        let ops = diff(&left, &right);
        assert_eq!(ops.len(), 1);
        let EditOp::UpdateAttribute { path, old, new } = &ops[0] else {
            panic!("unexpected op {:?}", ops[0]);
        };
        assert_eq!(path.to_string(), "html.class");
        assert_eq!((old.as_str(), new.as_str()), ("foo", "bar"));
        assert_eq!(
            path.elements(),
            [
                PathElement::Child {
                    index: 0,
                    tag: "html".to_string()
                },
                PathElement::Attribute("class".to_string()),
            ]
        );
    }

    #[test]
    fn tag_mismatch_replaces_the_subtree() {
        let left = parse(r#"<html class="foo"><div>body0</div></html>"#).expect("left");
        let right = parse(r#"<html class="foo"><span>body0</span></html>"#).expect("right");
        let ops = diff(&left, &right);
        let kinds: Vec<&str> = ops.iter().map(EditOp::kind_name).collect();
        assert_eq!(kinds, ["delete-node", "delete-node", "add-node", "add-node"]);
        assert_eq!(ops[0].path().to_string(), "html.div.#text");
        assert_eq!(ops[1].path().to_string(), "html.div");
        let EditOp::AddNode {
            path,
            node,
            position,
        } = &ops[2]
        else {
            panic!("unexpected op {:?}", ops[2]);
        };
        assert_eq!(path.to_string(), "html");
        assert_eq!(*position, 0);
        assert_eq!(right.node(*node).map(Node::tag), Some("span"));
        assert_eq!(ops[3].path().to_string(), "html.span");
    }

    #[test]
    fn text_versus_element_is_a_replacement() {
        let ops = script("<p>a</p>", "<p><b>a</b></p>");
        assert_eq!(
            ops,
            [
                "delete-node [p.#text]",
                "add-node [p] #2 at 0",
                "add-node [p.b] #3 at 0",
            ]
        );
    }

    #[test]
    fn attribute_changes_are_ordered_added_removed_changed() {
        let ops = script(
            r#"<a href="/a" title="t" rel="x"></a>"#,
            r#"<a href="/b" id="n" rel="x" target="_blank"></a>"#,
        );
        assert_eq!(
            ops,
            [
                r#"add-attribute [a.id] "n""#,
                r#"add-attribute [a.target] "_blank""#,
                "delete-attribute [a.title]",
                r#"update-attribute [a.href] "/a" -> "/b""#,
            ]
        );
    }

    #[test]
    fn duplicate_keys_compare_first_occurrence() {
        assert!(script(r#"<p k="1" k="2"></p>"#, r#"<p k="1" k="3"></p>"#).is_empty());
    }

    #[test]
    fn body_changes_on_text_and_comments() {
        let ops = script("<p>old<!-- a --></p>", "<p>new<!-- b --></p>");
        assert_eq!(
            ops,
            [r#"update-body [p.#text] "new""#, r#"update-body [p.#comment] "b""#]
        );
    }

    #[test]
    fn surplus_children_pad_as_adds_and_deletes() {
        let ops = script("<ul><li>a</li></ul>", "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(ops, ["add-node [ul] #4 at 1"]);
        let ops = script("<ul><li>a</li><li>b</li></ul>", "<ul><li>a</li></ul>");
        assert_eq!(ops, ["delete-node [ul.li]"]);
    }

    #[test]
    fn declarations_and_self_closing_markers_are_ignored() {
        assert!(script("<!DOCTYPE html><br/>", "<br>").is_empty());
    }

    #[test]
    fn subtree_diff_is_relative_to_the_left_node() {
        let left = parse(r#"<body><nav><li class="item">a</li></nav></body>"#).expect("left");
        let right = parse(r#"<main><nav><li class="item active">a</li></nav></main>"#)
            .expect("right");
        let find_nav = |tree: &Tree| {
            tree.get_root()
                .descendant(&crate::Criterion::tag("nav"))
                .expect("nav")
                .id()
        };
        let ops = diff_nodes(&left, find_nav(&left), &right, find_nav(&right));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path().to_string(), "li.class");
        assert_eq!(ops[0].class_token_delta(), Some(vec!["active".to_string()]));
    }

    #[test]
    fn replacement_at_the_comparison_root() {
        let left = parse("<div>x</div>").expect("left");
        let right = parse("<span>x</span>").expect("right");
        let ldiv = left.children(left.root_id())[0];
        let rspan = right.children(right.root_id())[0];
        let ops: Vec<String> = diff_nodes(&left, ldiv, &right, rspan)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            ops,
            [
                "delete-node [#text]",
                "delete-node []",
                "add-node [] #1 at 0",
                "add-node [] #2 at 0",
            ]
        );
    }

    #[test]
    fn class_token_delta_only_applies_to_class_updates() {
        let op = EditOp::UpdateAttribute {
            path: TreePath::root().child(0, "li").attribute("class"),
            old: "item active x".to_string(),
            new: "x item b".to_string(),
        };
        assert_eq!(
            op.class_token_delta(),
            Some(vec!["active".to_string(), "b".to_string()])
        );
        let op = EditOp::UpdateAttribute {
            path: TreePath::root().child(0, "a").attribute("href"),
            old: "a".to_string(),
            new: "b".to_string(),
        };
        assert_eq!(op.class_token_delta(), None);
    }

    #[test]
    fn path_navigation() {
        let path = TreePath::root().child(0, "html").child(2, "body");
        assert_eq!(path.to_string(), "html.body");
        assert_eq!(
            path.tail(),
            Some(&PathElement::Child {
                index: 2,
                tag: "body".to_string()
            })
        );
        assert_eq!(path.parent().map(|p| p.to_string()), Some("html".to_string()));
        assert!(TreePath::root().is_root());
        assert_eq!(TreePath::root().parent(), None);
    }
}
