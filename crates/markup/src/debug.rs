use crate::tree::Tree;
use crate::types::{Node, NodeId};

const INDENT_STEP: &str = "  ";
const PREVIEW_CHARS: usize = 40;

fn trimmed_nonempty_slice(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn push_preview_replace_newlines(out: &mut String, s: &str, max_chars: usize) {
    let mut truncated = false;
    for (i, ch) in s.chars().enumerate() {
        if i == max_chars {
            truncated = true;
            break;
        }
        out.push(if ch == '\n' { ' ' } else { ch });
    }
    if truncated {
        out.push('…');
    }
}

fn push_attr(line: &mut String, node: &Node, key: &str) {
    if let Some(value) = node.attr(key).filter(|v| !v.is_empty()) {
        line.push(' ');
        line.push_str(key);
        line.push_str("=\"");
        line.push_str(value);
        line.push('"');
    }
}

/// One line per node, indented by depth, stopping after `cap` nodes. Whitespace-only text
/// is skipped; other text and comments are previewed.
pub fn outline(tree: &Tree, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(tree.root_id(), 0)];
    while out.len() < cap {
        let Some((id, depth)) = stack.pop() else {
            break;
        };
        let Some(node) = tree.node(id) else {
            continue;
        };
        let indent = INDENT_STEP.repeat(depth);
        let mut line = String::with_capacity(indent.len() + 64);
        line.push_str(&indent);
        match node {
            Node::Root { declaration, .. } => match declaration {
                Some(declaration) => {
                    line.push_str("<!");
                    line.push_str(declaration);
                    line.push('>');
                }
                None => line.push_str("#root"),
            },
            Node::Paired { tag, .. }
            | Node::Standalone { tag, .. }
            | Node::Provisional { tag, .. } => {
                line.push('<');
                line.push_str(tag);
                push_attr(&mut line, node, "id");
                push_attr(&mut line, node, "class");
                line.push('>');
            }
            Node::Text { text } => {
                // whitespace-only text does not use up the cap
                let Some(trimmed) = trimmed_nonempty_slice(text) else {
                    continue;
                };
                line.push('"');
                push_preview_replace_newlines(&mut line, trimmed, PREVIEW_CHARS);
                line.push('"');
            }
            Node::Comment { text } => {
                line.push_str("<!-- ");
                push_preview_replace_newlines(&mut line, text, PREVIEW_CHARS);
                line.push_str(" -->");
            }
        }
        out.push(line);
        stack.extend(node.children().iter().rev().map(|&child| (child, depth + 1)));
    }
    out
}
