//! The tree-walking expression evaluator and its method catalog, generic
//! over any caller-supplied `lattice_core::ValueSystem`.

pub mod error;
pub mod eval;
pub mod methods;

pub use error::EvalError;
pub use eval::{eval, truthy, values_equal};
