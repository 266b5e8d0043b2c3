pub mod debug;
pub mod diff;
pub mod printer;
pub mod query;
pub mod traverse;

mod parser;
mod tokenizer;
mod tree;
mod types;

pub use crate::diff::{EditOp, PathElement, TreePath, diff, diff_nodes};
pub use crate::parser::{ParseError, ParserConfig, ParserState, TreeParser, parse, parse_with_config};
pub use crate::printer::{node_to_markup, to_markup, write_node};
pub use crate::query::{
    Cardinality, Criterion, NodeMut, NodeRef, QueryError, Scope, SearchSpec, find, find_with,
};
pub use crate::tokenizer::tokenize;
pub use crate::tree::{InvariantViolation, Tree};
pub use crate::types::{Attributes, Node, NodeId, NodeIndex, NodeKind, Token};
