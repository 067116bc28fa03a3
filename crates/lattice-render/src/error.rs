//! Leaf error types for include resolution (spec §4.G) and the renderer
//! walk (spec §4.H), mirroring the teacher's per-phase `thiserror` enums
//! (`lumen-compiler/src/compiler/lexer.rs`, `parser.rs`): folded into the
//! umbrella [`lattice_core::LatticeError`] at the call site via `?`/`.into()`.

use lattice_core::{ErrorKind, LatticeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("recursive include: {identifier}")]
    RecursiveInclude { line: usize, identifier: String },
    #[error("could not locate '{identifier}' in search path")]
    NotFoundInSearchPath { identifier: String },
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IncludeError {
    pub fn line(&self) -> usize {
        match self {
            IncludeError::RecursiveInclude { line, .. } => *line,
            IncludeError::NotFoundInSearchPath { .. } | IncludeError::Io { .. } => 0,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            IncludeError::RecursiveInclude { .. } | IncludeError::NotFoundInSearchPath { .. } => {
                ErrorKind::Include
            }
            IncludeError::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<IncludeError> for LatticeError {
    fn from(err: IncludeError) -> Self {
        let line = err.line();
        let kind = err.kind();
        LatticeError::new(kind, line, err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("for-range bounds must be numbers")]
    ForRangeBoundNotNumber { line: usize },
    #[error("for-in requires a string, array, or object")]
    ForInUnsupportedType { line: usize },
    #[error("loop scope requires the current scope to be an object")]
    LoopScopeNotObject { line: usize },
    #[error("emit callback returned 0 bytes written")]
    EmitZeroBytes { line: usize },
    #[error("failed to write rendered output: {source}")]
    SinkWrite {
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn line(&self) -> usize {
        match self {
            RenderError::ForRangeBoundNotNumber { line }
            | RenderError::ForInUnsupportedType { line }
            | RenderError::LoopScopeNotObject { line }
            | RenderError::EmitZeroBytes { line } => *line,
            RenderError::SinkWrite { .. } => 0,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            RenderError::EmitZeroBytes { .. } | RenderError::SinkWrite { .. } => ErrorKind::Io,
            _ => ErrorKind::Type,
        }
    }
}

impl From<RenderError> for LatticeError {
    fn from(err: RenderError) -> Self {
        let line = err.line();
        let kind = err.kind();
        LatticeError::new(kind, line, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_include_converts_to_include_kind() {
        let err: LatticeError = IncludeError::RecursiveInclude {
            line: 3,
            identifier: "self".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Include);
        assert_eq!(err.message, "recursive include: self");
    }

    #[test]
    fn emit_zero_bytes_converts_to_io_kind() {
        let err: LatticeError = RenderError::EmitZeroBytes { line: 5 }.into();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
