//! Leaf error type for both scanning phases (spec §4.B and §4.E share one
//! enum since they are both "turn bytes into tokens" concerns over the same
//! byte cursor).
//!
//! Mirrors the teacher's `LexError` (`lumen-compiler/src/compiler/lexer.rs`):
//! a `thiserror`-derived enum, one variant per distinct failure shape, folded
//! into the umbrella [`lattice_core::LatticeError`] at the call site via
//! `?`/`.into()`.

use lattice_core::{ErrorKind, LatticeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected byte {byte:?} in expression")]
    UnexpectedByte { line: usize, byte: char },
    #[error("leading zero on decimal literal with more digits")]
    LeadingZeroDecimal { line: usize },
    #[error("empty exponent in number literal")]
    EmptyExponent { line: usize },
    #[error("number literal does not terminate at a punctuation or whitespace byte")]
    NumberNotAtBoundary { line: usize },
    #[error("invalid number literal '{text}'")]
    InvalidNumber { line: usize, text: String },
    #[error("missing digits after radix prefix")]
    MissingRadixDigits { line: usize },
    #[error("unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("unterminated string escape")]
    UnterminatedEscape { line: usize },
    #[error("\\x escape requires exactly two hex digits")]
    InvalidHexEscape { line: usize },
    #[error("unknown string escape '\\{escape}'")]
    UnknownEscape { line: usize, escape: char },
    #[error("string literal is not valid UTF-8")]
    InvalidUtf8String { line: usize },
    #[error("unrecognized directive introducer '${introducer}'")]
    UnrecognizedIntroducer { line: usize, introducer: char },
    #[error("unterminated '$' at end of template")]
    UnterminatedDollar { line: usize },
    #[error("unterminated comment")]
    UnterminatedComment { line: usize },
    #[error("unterminated include directive")]
    UnterminatedInclude { line: usize },
    #[error("expected a loop variable name after 'for'")]
    ExpectedLoopVariable { line: usize },
    #[error("expected '{expected}' to close directive")]
    ExpectedByte { line: usize, expected: char },
    #[error("expected '{expected}' in for-range directive")]
    ExpectedSequence { line: usize, expected: String },
    #[error("unknown directive keyword '{keyword}'")]
    UnknownKeyword { line: usize, keyword: String },
    #[error("expected 'from' or 'in' after for-loop variable, found '{found}'")]
    ExpectedForKeyword { line: usize, found: String },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedByte { line, .. }
            | LexError::LeadingZeroDecimal { line }
            | LexError::EmptyExponent { line }
            | LexError::NumberNotAtBoundary { line }
            | LexError::InvalidNumber { line, .. }
            | LexError::MissingRadixDigits { line }
            | LexError::UnterminatedString { line }
            | LexError::UnterminatedEscape { line }
            | LexError::InvalidHexEscape { line }
            | LexError::UnknownEscape { line, .. }
            | LexError::InvalidUtf8String { line }
            | LexError::UnrecognizedIntroducer { line, .. }
            | LexError::UnterminatedDollar { line }
            | LexError::UnterminatedComment { line }
            | LexError::UnterminatedInclude { line }
            | LexError::ExpectedLoopVariable { line }
            | LexError::ExpectedByte { line, .. }
            | LexError::ExpectedSequence { line, .. }
            | LexError::UnknownKeyword { line, .. }
            | LexError::ExpectedForKeyword { line, .. } => *line,
        }
    }
}

impl From<LexError> for LatticeError {
    fn from(err: LexError) -> Self {
        let line = err.line();
        LatticeError::new(ErrorKind::Syntax, line, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_syntax_kind_with_rendered_message() {
        let err: LatticeError = LexError::UnterminatedComment { line: 4 }.into();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.line, 4);
        assert_eq!(err.message, "unterminated comment");
    }
}
