//! Streaming tree parser.
//!
//! Start tags cannot be classified when they are seen: `<p>` may own everything up to a later
//! `</p>`, while `<meta>` never gets a close tag at all. The parser therefore keeps a linear
//! working buffer of nodes in source order plus, per tag name, a stack of buffer positions of
//! still-open start tags.
//!
//! - A close tag pops the nearest open position of that name. Everything after it in the
//!   buffer becomes its children; any start tag among them that has not been closed by now is
//!   demoted to a standalone node.
//! - `finalize` moves whatever is left in the buffer under the root and builds the indices.
//!
//! There is no void-element table. Classification is purely by encounter order.
use std::collections::HashMap;
use std::mem;

use crate::tokenizer::tokenize;
use crate::tree::{Tree, TreeIndices};
use crate::types::{Node, NodeId, Token};

/// Fatal parse failure. No partial tree is produced.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed markup: end tag </{tag}> at byte {position} has no open start tag")]
    MalformedMarkup { tag: String, position: usize },
}

/// Configuration for tokenizing and tree building.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Fold tag and attribute names to ASCII lowercase.
    pub lowercase_names: bool,
    /// Elements whose content is raw text up to the matching close tag.
    pub rawtext_elements: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            lowercase_names: true,
            rawtext_elements: vec!["script".to_string(), "style".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParserState {
    /// Nothing fed since construction or the last `finalize`.
    Idle,
    Accumulating,
    /// A malformed close tag was seen; further input is ignored until `finalize`.
    Poisoned(ParseError),
}

/// Incremental parser; reusable sequentially, one document per `finalize`.
///
/// Several `feed` calls before one `finalize` are concatenated into a single document. Each
/// chunk must contain whole tokens.
#[derive(Debug)]
pub struct TreeParser {
    config: ParserConfig,
    state: ParserState,
    arena: Vec<Node>,
    /// Working buffer of not-yet-owned nodes, in source order.
    buffer: Vec<NodeId>,
    /// Tag name -> buffer positions of currently open start tags with that name.
    open_tags: HashMap<String, Vec<usize>>,
    indices: TreeIndices,
    /// Bytes consumed by earlier chunks, for error positions.
    offset: usize,
}

impl Default for TreeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            state: ParserState::Idle,
            arena: vec![Node::Root {
                declaration: None,
                children: Vec::new(),
            }],
            buffer: Vec::new(),
            open_tags: HashMap::new(),
            indices: TreeIndices::default(),
            offset: 0,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Tokenizes `text` and folds its events into the working buffer.
    pub fn feed(&mut self, text: &str) -> Result<(), ParseError> {
        if let ParserState::Poisoned(err) = &self.state {
            return Err(err.clone());
        }
        self.state = ParserState::Accumulating;
        let tokens = tokenize(text, &self.config);
        for token in tokens {
            if let Err(err) = self.push_token(token) {
                log::debug!(target: "markup.parser", "{err}");
                self.state = ParserState::Poisoned(err.clone());
                return Err(err);
            }
        }
        self.offset += text.len();
        Ok(())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.arena.len() as u32);
        self.arena.push(node);
        id
    }

    fn push_token(&mut self, token: Token) -> Result<(), ParseError> {
        match token {
            Token::Declaration(declaration) => {
                if let Node::Root { declaration: dt, .. } = &mut self.arena[NodeId::ROOT.index()]
                {
                    *dt = Some(declaration);
                }
            }
            Token::StartTag {
                name,
                attributes,
                self_closing: true,
                ..
            } => {
                let id = self.alloc(Node::Standalone {
                    tag: name,
                    attributes,
                    self_closing: true,
                });
                self.buffer.push(id);
                self.indices.record(&self.arena, id);
            }
            Token::StartTag {
                name, attributes, ..
            } => {
                let position = self.buffer.len();
                self.open_tags.entry(name.clone()).or_default().push(position);
                let id = self.alloc(Node::Provisional {
                    tag: name,
                    attributes,
                });
                self.buffer.push(id);
            }
            Token::EndTag { name, position } => self.close(name, position)?,
            Token::Text(text) => {
                let id = self.alloc(Node::Text { text });
                self.buffer.push(id);
            }
            Token::Comment(text) => {
                let id = self.alloc(Node::Comment { text });
                self.buffer.push(id);
            }
        }
        Ok(())
    }

    fn close(&mut self, name: String, position: usize) -> Result<(), ParseError> {
        let Some(start) = self.open_tags.get_mut(&name).and_then(Vec::pop) else {
            return Err(ParseError::MalformedMarkup {
                tag: name,
                position: self.offset + position,
            });
        };
        let id = self.buffer[start];
        let children = self.coalesce(start + 1);
        let node = &mut self.arena[id.index()];
        let Node::Provisional { attributes, .. } = node else {
            unreachable!("open tag stack only holds provisional nodes");
        };
        *node = Node::Paired {
            tag: name,
            attributes: mem::take(attributes),
            children,
        };
        self.buffer.truncate(start);
        self.buffer.push(id);
        self.indices.record(&self.arena, id);
        log::trace!(target: "markup.parser", "closed {id:?} at buffer position {start}");
        Ok(())
    }

    /// Drains the buffer from `from` onwards, demoting unclosed start tags to standalone
    /// nodes and forgetting their open positions.
    fn coalesce(&mut self, from: usize) -> Vec<NodeId> {
        let drained: Vec<NodeId> = self.buffer.drain(from..).collect();
        let mut demoted = Vec::new();
        // Positions grow within a stack, so walking backwards always finds the unclosed
        // start tag on top of its stack.
        for (offset, &id) in drained.iter().enumerate().rev() {
            let node = &mut self.arena[id.index()];
            if let Node::Provisional { tag, attributes } = node {
                if let Some(stack) = self.open_tags.get_mut(tag.as_str()) {
                    let top = stack.pop();
                    debug_assert_eq!(top, Some(from + offset));
                }
                *node = Node::Standalone {
                    tag: mem::take(tag),
                    attributes: mem::take(attributes),
                    self_closing: false,
                };
                demoted.push(id);
            }
        }
        // index in document order so a later duplicate id wins
        for &id in demoted.iter().rev() {
            self.indices.record(&self.arena, id);
        }
        drained
    }

    /// Moves every remaining buffered node under the root and returns the tree. Resets the
    /// parser to `Idle`; finalizing again without feeding yields an empty tree.
    pub fn finalize(&mut self) -> Result<Tree, ParseError> {
        let state = mem::replace(&mut self.state, ParserState::Idle);
        if let ParserState::Poisoned(err) = state {
            self.reset();
            return Err(err);
        }
        let children = self.coalesce(0);
        if let Node::Root { children: root_children, .. } = &mut self.arena[NodeId::ROOT.index()]
        {
            *root_children = children;
        }
        self.indices.record(&self.arena, NodeId::ROOT);

        let mut indices = mem::take(&mut self.indices);
        let arena = mem::take(&mut self.arena);
        indices.shrink();
        self.reset();
        let tree = Tree::from_parts(arena, indices);
        log::debug!(target: "markup.parser", "finalized tree with {} nodes", tree.len());
        #[cfg(feature = "parser_invariants")]
        if let Err(violation) = tree.check_invariants() {
            panic!("parser produced an inconsistent tree: {violation}");
        }
        Ok(tree)
    }

    fn reset(&mut self) {
        *self = Self::with_config(mem::take(&mut self.config));
    }
}

/// Parses one complete document.
pub fn parse(text: &str) -> Result<Tree, ParseError> {
    parse_with_config(text, &ParserConfig::default())
}

pub fn parse_with_config(text: &str, config: &ParserConfig) -> Result<Tree, ParseError> {
    let mut parser = TreeParser::with_config(config.clone());
    parser.feed(text)?;
    parser.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn kinds_of_children(tree: &Tree, id: NodeId) -> Vec<(NodeKind, String)> {
        tree.children(id)
            .iter()
            .map(|&c| {
                let node = tree.node(c).expect("child exists");
                (node.kind(), node.tag().to_string())
            })
            .collect()
    }

    #[test]
    fn matching_close_tag_makes_paired_node() {
        let tree = parse("<html><body>foo</body></html>").expect("parse");
        let root = tree.root_id();
        assert_eq!(
            kinds_of_children(&tree, root),
            vec![(NodeKind::Paired, "html".to_string())]
        );
        let html = tree.children(root)[0];
        assert_eq!(
            kinds_of_children(&tree, html),
            vec![(NodeKind::Paired, "body".to_string())]
        );
        let body = tree.children(html)[0];
        assert_eq!(
            kinds_of_children(&tree, body),
            vec![(NodeKind::Text, "#text".to_string())]
        );
    }

    #[test]
    fn unclosed_tag_before_close_becomes_standalone() {
        let tree = parse("<meta><body>x</body>").expect("parse");
        assert_eq!(
            kinds_of_children(&tree, tree.root_id()),
            vec![
                (NodeKind::Standalone, "meta".to_string()),
                (NodeKind::Paired, "body".to_string()),
            ]
        );
    }

    #[test]
    fn unclosed_tags_inside_parent_are_demoted_as_siblings() {
        let tree = parse("<ul><li>a<li>b</ul>").expect("parse");
        let ul = tree.children(tree.root_id())[0];
        assert_eq!(
            kinds_of_children(&tree, ul),
            vec![
                (NodeKind::Standalone, "li".to_string()),
                (NodeKind::Text, "#text".to_string()),
                (NodeKind::Standalone, "li".to_string()),
                (NodeKind::Text, "#text".to_string()),
            ]
        );
    }

    #[test]
    fn nearest_unclosed_same_name_wins() {
        let tree = parse("<div><div>in</div>out</div>").expect("parse");
        let outer = tree.children(tree.root_id())[0];
        assert_eq!(
            kinds_of_children(&tree, outer),
            vec![
                (NodeKind::Paired, "div".to_string()),
                (NodeKind::Text, "#text".to_string()),
            ]
        );
    }

    #[test]
    fn stray_end_tag_is_malformed() {
        let mut parser = TreeParser::new();
        let err = parser.feed("<html>foo</body></html>").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedMarkup {
                tag: "body".to_string(),
                position: 9,
            }
        );
        assert!(matches!(parser.state(), ParserState::Poisoned(_)));
        assert_eq!(parser.feed("<p></p>"), Err(err.clone()));
        assert_eq!(parser.finalize().unwrap_err(), err);
        assert_eq!(parser.state(), &ParserState::Idle);
    }

    #[test]
    fn end_tag_of_demoted_element_is_malformed() {
        let err = parse("<div><p>x</div></p>").unwrap_err();
        assert!(matches!(err, ParseError::MalformedMarkup { ref tag, .. } if tag == "p"));
    }

    #[test]
    fn error_positions_account_for_earlier_chunks() {
        let mut parser = TreeParser::new();
        parser.feed("<html>").expect("first chunk");
        let err = parser.feed("</body>").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedMarkup {
                tag: "body".to_string(),
                position: 6,
            }
        );
    }

    #[test]
    fn chunks_fed_before_finalize_form_one_document() {
        let mut parser = TreeParser::new();
        parser.feed("<html><body>").expect("chunk");
        parser.feed("x</body>").expect("chunk");
        parser.feed("</html>").expect("chunk");
        let tree = parser.finalize().expect("finalize");
        assert_eq!(
            kinds_of_children(&tree, tree.root_id()),
            vec![(NodeKind::Paired, "html".to_string())]
        );
    }

    #[test]
    fn finalize_twice_yields_empty_tree() {
        let mut parser = TreeParser::new();
        parser.feed("<!DOCTYPE html><p>a</p>").expect("feed");
        let first = parser.finalize().expect("first");
        assert_eq!(first.declaration(), Some("DOCTYPE html"));
        assert_eq!(first.children(first.root_id()).len(), 1);

        let second = parser.finalize().expect("second");
        assert_eq!(second.len(), 1);
        assert!(second.children(second.root_id()).is_empty());
        assert_eq!(second.declaration(), None);
    }

    #[test]
    fn parser_is_reusable_after_finalize() {
        let mut parser = TreeParser::new();
        parser.feed("<a></a>").expect("feed");
        let _ = parser.finalize().expect("first");
        assert_eq!(parser.state(), &ParserState::Idle);
        parser.feed("<b></b>").expect("feed");
        let tree = parser.finalize().expect("second");
        assert_eq!(
            kinds_of_children(&tree, tree.root_id()),
            vec![(NodeKind::Paired, "b".to_string())]
        );
    }

    #[test]
    fn finalize_demotes_leftover_start_tags() {
        let tree = parse("<link><p>x").expect("parse");
        assert_eq!(
            kinds_of_children(&tree, tree.root_id()),
            vec![
                (NodeKind::Standalone, "link".to_string()),
                (NodeKind::Standalone, "p".to_string()),
                (NodeKind::Text, "#text".to_string()),
            ]
        );
        tree.check_invariants().expect("consistent indices");
    }

    #[test]
    fn self_closing_tags_skip_the_open_stack() {
        let tree = parse("<div><br/>x</div>").expect("parse");
        let div = tree.children(tree.root_id())[0];
        let br = tree.children(div)[0];
        assert!(matches!(
            tree.node(br),
            Some(Node::Standalone {
                self_closing: true,
                ..
            })
        ));
    }

    #[test]
    fn ids_are_indexed_at_finalization_time() {
        let tree = parse(r#"<div id="a"><p id="a"></p><img id="b"></div>"#).expect("parse");
        let outer = tree.children(tree.root_id())[0];
        assert_eq!(tree.find_by_id("a").map(|n| n.id()), Some(outer));
        let img = tree.children(outer)[1];
        assert_eq!(tree.find_by_id("b").map(|n| n.id()), Some(img));
    }

    #[test]
    fn build_stress_deep_nesting() {
        let depth = 10_000;
        let input = format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let tree = parse(&input).expect("parse");
        let mut current = tree.root_id();
        for _ in 0..depth {
            let children = tree.children(current);
            assert_eq!(children.len(), 1);
            current = children[0];
            assert_eq!(tree.node(current).map(Node::kind), Some(NodeKind::Paired));
        }
        assert!(tree.children(current).is_empty());
    }
}
