use std::fmt::Write;

use markup::{EditOp, Tree};

pub mod fixtures;

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => {
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    let mut out = String::new();
    fn line(lines: &[String], i: usize) -> &str {
        lines.get(i).map_or("<missing>", String::as_str)
    }
    let mismatch = (0..max).find(|&i| line(expected, i) != line(actual, i));
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(
                &mut out,
                "{marker} {:>4}  expected: {}",
                line_idx + 1,
                line(expected, line_idx)
            );
            let _ = writeln!(
                &mut out,
                "{marker} {:>4}    actual: {}",
                line_idx + 1,
                line(actual, line_idx)
            );
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// One line per edit operation. Added nodes are shown as the right-tree markup they stand
/// for, so snapshots do not depend on arena numbering.
pub fn format_edit_script(right: &Tree, ops: &[EditOp]) -> Vec<String> {
    ops.iter()
        .map(|op| {
            let mut line = format!("{} [{}]", op.kind_name(), op.path());
            let _ = match op {
                EditOp::AddNode { node, position, .. } => {
                    let markup = right
                        .get(*node)
                        .map(|n| n.to_markup())
                        .unwrap_or_default();
                    write!(&mut line, " {position} \"{}\"", escape_text(&markup))
                }
                EditOp::UpdateAttribute { old, new, .. } => write!(
                    &mut line,
                    " \"{}\" -> \"{}\"",
                    escape_text(old),
                    escape_text(new)
                ),
                EditOp::AddAttribute { value, .. } => {
                    write!(&mut line, " \"{}\"", escape_text(value))
                }
                EditOp::UpdateBody { body, .. } => write!(&mut line, " \"{}\"", escape_text(body)),
                EditOp::DeleteNode { .. } | EditOp::DeleteAttribute { .. } => Ok(()),
            };
            line
        })
        .collect()
}
