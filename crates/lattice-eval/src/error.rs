//! Leaf error type for the expression evaluator and method catalog (spec
//! §4.D), mirroring the teacher's `TypeError`/`ResolveError`
//! (`lumen-compiler/src/compiler/lexer.rs`, `parser.rs`): a `thiserror`-derived
//! enum folded into the umbrella [`lattice_core::LatticeError`] via
//! `?`/`.into()`.

use lattice_core::{ErrorKind, LatticeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("object literal key must evaluate to a string or null")]
    ObjectKeyInvalid { line: usize },
    #[error("unary '{op}' requires a number")]
    UnaryRequiresNumber { line: usize, op: char },
    #[error("identifier lookup requires the current scope to be an object")]
    ScopeNotObject { line: usize },
    #[error("undefined name '{name}'")]
    UndefinedName { line: usize, name: String },
    #[error("'.' lookup requires an object")]
    LookupRequiresObject { line: usize },
    #[error("missing key '{name}'")]
    LookupMissingKey { line: usize, name: String },
    #[error("ordered comparison requires both operands to be numbers or both strings")]
    OrderedComparisonMismatch { line: usize },
    #[error("'+' requires two numbers, two strings, or two arrays")]
    AddTypeMismatch { line: usize },
    #[error("arithmetic operator requires two numbers")]
    ArithmeticRequiresNumbers { line: usize },
    #[error("'*' requires two numbers, or a string/array and a number")]
    MultiplyTypeMismatch { line: usize },
    #[error("repeat count must be a number")]
    RepeatCountNotNumber { line: usize },
    #[error("repeat count must be a whole number")]
    RepeatCountNotWhole { line: usize },
    #[error("bitwise operator requires numbers")]
    BitwiseRequiresNumbers { line: usize },
    #[error("bitwise operands must be whole, finite numbers")]
    BitwiseOperandsNotWhole { line: usize },
    #[error("index must be a number")]
    IndexNotNumber { line: usize },
    #[error("index must be a whole number")]
    IndexNotWhole { line: usize },
    #[error("index out of range")]
    IndexOutOfRange { line: usize },
    #[error("string index out of range")]
    StringIndexOutOfRange { line: usize },
    #[error("array index out of range")]
    ArrayIndexOutOfRange { line: usize },
    #[error("object index must be a string")]
    ObjectIndexNotString { line: usize },
    #[error("missing key '{key}'")]
    IndexMissingKey { line: usize, key: String },
    #[error("indexing requires a string, array, or object")]
    IndexingUnsupportedType { line: usize },
    #[error("range {bound} must be a number")]
    RangeBoundNotNumber { line: usize, bound: &'static str },
    #[error("range indexing is not supported on objects")]
    RangeOnObjectUnsupported { line: usize },
    #[error("range indexing requires a string or array")]
    RangeRequiresIndexable { line: usize },
    #[error("method '{name}' expects {expected} argument(s), found {found}")]
    ArityMismatch {
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("datetime pattern '{pattern}' contains an invalid format specifier")]
    InvalidDatetimePattern { line: usize, pattern: String },
}

impl EvalError {
    pub fn line(&self) -> usize {
        match self {
            EvalError::ObjectKeyInvalid { line }
            | EvalError::UnaryRequiresNumber { line, .. }
            | EvalError::ScopeNotObject { line }
            | EvalError::UndefinedName { line, .. }
            | EvalError::LookupRequiresObject { line }
            | EvalError::LookupMissingKey { line, .. }
            | EvalError::OrderedComparisonMismatch { line }
            | EvalError::AddTypeMismatch { line }
            | EvalError::ArithmeticRequiresNumbers { line }
            | EvalError::MultiplyTypeMismatch { line }
            | EvalError::RepeatCountNotNumber { line }
            | EvalError::RepeatCountNotWhole { line }
            | EvalError::BitwiseRequiresNumbers { line }
            | EvalError::BitwiseOperandsNotWhole { line }
            | EvalError::IndexNotNumber { line }
            | EvalError::IndexNotWhole { line }
            | EvalError::IndexOutOfRange { line }
            | EvalError::StringIndexOutOfRange { line }
            | EvalError::ArrayIndexOutOfRange { line }
            | EvalError::ObjectIndexNotString { line }
            | EvalError::IndexMissingKey { line, .. }
            | EvalError::IndexingUnsupportedType { line }
            | EvalError::RangeBoundNotNumber { line, .. }
            | EvalError::RangeOnObjectUnsupported { line }
            | EvalError::RangeRequiresIndexable { line }
            | EvalError::ArityMismatch { line, .. }
            | EvalError::InvalidDatetimePattern { line, .. } => *line,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UndefinedName { .. } | EvalError::LookupMissingKey { .. } => {
                ErrorKind::Name
            }
            EvalError::RepeatCountNotWhole { .. }
            | EvalError::BitwiseOperandsNotWhole { .. }
            | EvalError::IndexNotWhole { .. }
            | EvalError::IndexOutOfRange { .. }
            | EvalError::StringIndexOutOfRange { .. }
            | EvalError::ArrayIndexOutOfRange { .. }
            | EvalError::IndexMissingKey { .. }
            | EvalError::ArityMismatch { .. }
            | EvalError::InvalidDatetimePattern { .. } => ErrorKind::Value,
            _ => ErrorKind::Type,
        }
    }
}

impl From<EvalError> for LatticeError {
    fn from(err: EvalError) -> Self {
        let line = err.line();
        let kind = err.kind();
        LatticeError::new(kind, line, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_name_converts_to_name_kind() {
        let err: LatticeError = EvalError::UndefinedName {
            line: 2,
            name: "x".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Name);
        assert_eq!(err.message, "undefined name 'x'");
    }

    #[test]
    fn index_missing_key_converts_to_value_kind() {
        let err: LatticeError = EvalError::IndexMissingKey {
            line: 2,
            key: "x".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Value);
    }
}
