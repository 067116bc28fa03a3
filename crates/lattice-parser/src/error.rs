//! Leaf error type for both parsing phases (spec §4.C and §4.F): the
//! expression parser and the directive block builder both raise syntax
//! errors over an already-lexed token stream.
//!
//! Mirrors the teacher's `ParseError` (`lumen-compiler/src/compiler/parser.rs`):
//! a `thiserror`-derived enum folded into the umbrella
//! [`lattice_core::LatticeError`] at the call site via `?`/`.into()`.

use lattice_core::{ErrorKind, LatticeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("extra tokens in expression")]
    ExtraTokens { line: usize },
    #[error("expected {what}")]
    Expected { line: usize, what: String },
    #[error("expected an identifier after '.'")]
    ExpectedIdentAfterDot { line: usize },
    #[error("expected an expression, found '{found}'")]
    ExpectedExpression { line: usize, found: String },
    #[error("unexpected end of expression")]
    UnexpectedEndOfExpression { line: usize },
    #[error("stray '{kind}' with no matching opening block")]
    StrayDirective { line: usize, kind: String },
    #[error("'case' may not follow 'default' in a switch")]
    CaseAfterDefault { line: usize },
    #[error("switch may contain at most one 'default'")]
    MultipleDefaults { line: usize },
    #[error("expected 'end' to close block, found '{found}'")]
    ExpectedEnd { line: usize, found: String },
    #[error("unclosed block at end of source")]
    UnclosedBlock { line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::ExtraTokens { line }
            | ParseError::Expected { line, .. }
            | ParseError::ExpectedIdentAfterDot { line }
            | ParseError::ExpectedExpression { line, .. }
            | ParseError::UnexpectedEndOfExpression { line }
            | ParseError::StrayDirective { line, .. }
            | ParseError::CaseAfterDefault { line }
            | ParseError::MultipleDefaults { line }
            | ParseError::ExpectedEnd { line, .. }
            | ParseError::UnclosedBlock { line } => *line,
        }
    }
}

impl From<ParseError> for LatticeError {
    fn from(err: ParseError) -> Self {
        let line = err.line();
        LatticeError::new(ErrorKind::Syntax, line, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_syntax_kind_with_rendered_message() {
        let err: LatticeError = ParseError::UnclosedBlock { line: 7 }.into();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.line, 7);
        assert_eq!(err.message, "unclosed block at end of source");
    }
}
