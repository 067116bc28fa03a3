//! Turns a lexeme stream into an expression AST, and a flat directive
//! stream into a directive tree.

pub mod block_builder;
pub mod error;
pub mod expr_parser;

pub use block_builder::build;
pub use error::ParseError;
pub use expr_parser::parse_tokens;

use lattice_core::{LatticeResult, Template};

/// Convenience entry point: tokenize and block-build a template source in
/// one call, for callers that don't need the intermediate flat stream.
pub fn parse_template(src: &[u8]) -> LatticeResult<Template> {
    let raw = lattice_lexer::tokenize(src)?;
    block_builder::build(raw)
}
