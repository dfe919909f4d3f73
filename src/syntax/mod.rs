//! Front-end surface shared with the lexer and parser: spans, tokens,
//! production rules, and the syntax tree the analyzer consumes.

pub mod rules;
pub mod span;
pub mod token;
pub mod tree;

pub use rules::Rule;
pub use span::Span;
pub use token::{Category, LiteralValue, Token};
pub use tree::{NodeId, SyntaxTree};
