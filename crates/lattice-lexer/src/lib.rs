//! Bytes in, lexemes and a flat directive stream out. No knowledge of the
//! expression grammar or the directive tree lives here — that is
//! `lattice-parser`'s job; this crate only recognizes token shapes.

pub mod error;
pub mod expr_lexer;
pub mod template_lexer;
pub mod token;

pub use error::LexError;
pub use expr_lexer::ExprLexer;
pub use template_lexer::{tokenize, RawDirective};
pub use token::{Lexeme, Token};
