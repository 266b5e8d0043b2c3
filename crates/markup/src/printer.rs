//! Renders a tree back to markup text.
//!
//! Attributes are written as `key="value"` in stored order. Text and attribute values are
//! emitted verbatim, exactly as the tokenizer kept them. A value holding `"` switches to
//! single quotes, or to no quotes when it holds both kinds, so the output always reparses
//! to the same attributes.
use std::fmt::{self, Write};

use crate::tree::Tree;
use crate::types::{Node, NodeId};

enum Step<'a> {
    Open(NodeId),
    Close(&'a str),
}

pub fn to_markup(tree: &Tree) -> String {
    node_to_markup(tree, tree.root_id())
}

pub fn node_to_markup(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_node(tree, id, &mut out);
    out
}

pub fn write_node<W: Write>(tree: &Tree, id: NodeId, out: &mut W) -> fmt::Result {
    let mut stack = vec![Step::Open(id)];
    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Open(id) => id,
            Step::Close(tag) => {
                write!(out, "</{tag}>")?;
                continue;
            }
        };
        let Some(node) = tree.node(id) else {
            continue;
        };
        match node {
            Node::Root {
                declaration,
                children,
            } => {
                if let Some(declaration) = declaration {
                    write!(out, "<!{declaration}>")?;
                }
                stack.extend(children.iter().rev().map(|&child| Step::Open(child)));
            }
            Node::Paired {
                tag,
                attributes,
                children,
            } => {
                write_start_tag(out, tag, attributes, false)?;
                stack.push(Step::Close(tag));
                stack.extend(children.iter().rev().map(|&child| Step::Open(child)));
            }
            Node::Standalone {
                tag,
                attributes,
                self_closing,
            } => write_start_tag(out, tag, attributes, *self_closing)?,
            // Only reachable while a parse is still in flight.
            Node::Provisional { tag, attributes } => {
                write_start_tag(out, tag, attributes, false)?
            }
            Node::Text { text } => out.write_str(text)?,
            Node::Comment { text } => write!(out, "<!-- {text} -->")?,
        }
    }
    Ok(())
}

fn write_start_tag<W: Write>(
    out: &mut W,
    tag: &str,
    attributes: &[(String, String)],
    self_closing: bool,
) -> fmt::Result {
    out.write_char('<')?;
    out.write_str(tag)?;
    for (key, value) in attributes {
        write!(out, " {key}=")?;
        write_attr_value(out, value)?;
    }
    if self_closing {
        out.write_char('/')?;
    }
    out.write_char('>')
}

fn write_attr_value<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    if !value.contains('"') {
        return write!(out, "\"{value}\"");
    }
    if !value.contains('\'') {
        return write!(out, "'{value}'");
    }
    let unquotable = !value.starts_with(['"', '\''])
        && !value.contains(|c: char| c.is_ascii_whitespace() || c == '>');
    if unquotable {
        out.write_str(value)?;
        if value.ends_with('/') {
            // keep a trailing `/` from reading as `/>`
            out.write_char(' ')?;
        }
        return Ok(());
    }
    // Not something the tokenizer produces; only reachable through `set_attr`.
    write!(out, "\"{}\"", value.replace('"', "&quot;"))
}
