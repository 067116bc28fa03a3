//! Stable error taxonomy shared by every phase of the engine.
//!
//! Code ranges (teacher-style stable codes, see `lumen-compiler`'s
//! `error_codes.rs`):
//!   L0001-L0099  syntax (tokenizer / expression parser)
//!   L0100-L0199  type
//!   L0200-L0299  value
//!   L0300-L0399  name
//!   L0400-L0499  include
//!   L0500-L0599  IO
//!   L0600-L0699  JSON
//!   L0700-L0799  options
//!   L0800-L0899  allocation

use std::fmt;

/// The taxonomy from spec §7. Every fallible operation in the engine
/// reports one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Type,
    Value,
    Name,
    Include,
    Io,
    Json,
    Options,
    Allocation,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind's category. Individual
    /// sites may still want a more specific code; this is the fallback.
    pub const fn code_prefix(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "L00",
            ErrorKind::Type => "L01",
            ErrorKind::Value => "L02",
            ErrorKind::Name => "L03",
            ErrorKind::Include => "L04",
            ErrorKind::Io => "L05",
            ErrorKind::Json => "L06",
            ErrorKind::Options => "L07",
            ErrorKind::Allocation => "L08",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Type => "type",
            ErrorKind::Value => "value",
            ErrorKind::Name => "name",
            ErrorKind::Include => "include",
            ErrorKind::Io => "io",
            ErrorKind::Json => "json",
            ErrorKind::Options => "options",
            ErrorKind::Allocation => "allocation",
        };
        f.write_str(name)
    }
}

/// The error record returned through the public rendering entry points
/// (spec §6, "Error record"). Carries enough context to report a
/// `file:line: kind: message` diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeError {
    pub kind: ErrorKind,
    /// 1-based line number of the offending directive or expression.
    pub line: usize,
    /// Set when the error surfaces through an `include`.
    pub included_from: Option<String>,
    pub message: String,
}

impl LatticeError {
    pub fn new(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            included_from: None,
            message: message.into(),
        }
    }

    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, line, message)
    }

    pub fn type_error(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, line, message)
    }

    pub fn value(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, line, message)
    }

    pub fn name(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, line, message)
    }

    pub fn include(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Include, line, message)
    }

    pub fn io(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, line, message)
    }

    pub fn json(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Json, line, message)
    }

    pub fn options(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Options, 0, message)
    }

    /// Attach (or overwrite) the included-file tag as the error propagates
    /// back out through an `include` directive.
    pub fn with_included_from(mut self, file: impl Into<String>) -> Self {
        if self.included_from.is_none() {
            self.included_from = Some(file.into());
        }
        self
    }
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.included_from {
            Some(file) => write!(
                f,
                "{file}:{line}: {kind}: {message}",
                file = file,
                line = self.line,
                kind = self.kind,
                message = self.message
            ),
            None => write!(
                f,
                "{line}: {kind}: {message}",
                line = self.line,
                kind = self.kind,
                message = self.message
            ),
        }
    }
}

impl std::error::Error for LatticeError {}

pub type LatticeResult<T> = Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_include_tag() {
        let err = LatticeError::syntax(3, "unexpected token");
        assert_eq!(format!("{err}"), "3: syntax: unexpected token");
    }

    #[test]
    fn display_with_include_tag() {
        let err = LatticeError::name(1, "missing key 'x'").with_included_from("partial.tmpl");
        assert_eq!(format!("{err}"), "partial.tmpl:1: name: missing key 'x'");
    }

    #[test]
    fn with_included_from_does_not_overwrite_innermost_tag() {
        let err = LatticeError::include(5, "recursive include: a.tmpl")
            .with_included_from("a.tmpl")
            .with_included_from("b.tmpl");
        assert_eq!(err.included_from.as_deref(), Some("a.tmpl"));
    }
}
