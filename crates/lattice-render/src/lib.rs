//! Include resolution and the renderer walk: turns a parsed [`lattice_core::Template`]
//! and a caller-supplied root value into output bytes.

pub mod error;
pub mod include;
pub mod render;

pub use error::{IncludeError, RenderError};
pub use include::resolve_includes;
pub use render::{default_escape, render, render_to_buffer, render_to_file, RenderOptions};
