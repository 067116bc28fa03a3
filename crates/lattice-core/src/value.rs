//! The value capability (spec §4.A).
//!
//! The engine never depends on a concrete JSON representation. Instead a
//! caller implements [`ValueSystem`] over its own handle type, the way the
//! teacher workspace lets a `ToolProvider` plug a capability (filesystem,
//! JSON, HTTP, ...) behind a trait owned by the core crate. `lattice-json`
//! is the reference implementation, backed by `serde_json::Value`; nothing
//! in `lattice-lexer`, `lattice-parser`, `lattice-eval`, or `lattice-render`
//! mentions `serde_json` at all.
//!
//! Rust's ownership model replaces the source model's manual
//! parse/clone/free discipline: a `Handle` is dropped automatically when it
//! goes out of scope, so `ValueSystem` has no `free` method. Every operation
//! that would have returned a "fresh owned handle" in the C model simply
//! returns an owned `Handle` here; the borrow checker enforces that inputs
//! stay immutable for the caller and that only one owner releases a value.

use crate::error::LatticeResult;

/// The six type tags from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// The capability table, generalized as a trait over an opaque, caller-owned
/// `Handle` type. Every method here corresponds 1:1 to an operation listed
/// in spec §4.A ("parse a JSON string; print to a fresh JSON string;
/// release; construct a primitive or an empty container; deep-clone; query
/// type, primitive value, length; index; append; enumerate object keys").
///
/// Implementations must uphold: `clone` is a deep value copy (arrays and
/// objects recursively), `keys` preserves insertion order, and numbers are
/// binary64 throughout.
pub trait ValueSystem {
    type Handle: Clone;

    /// Parse a JSON document into a value. `JSON` error kind on failure.
    fn parse(&self, json: &str) -> LatticeResult<Self::Handle>;

    /// Serialize a value back to a JSON string.
    fn print(&self, value: &Self::Handle) -> LatticeResult<String>;

    fn null(&self) -> Self::Handle;
    fn boolean(&self, b: bool) -> Self::Handle;
    fn number(&self, n: f64) -> Self::Handle;
    fn string(&self, s: &str) -> Self::Handle;
    fn empty_array(&self) -> Self::Handle;
    fn empty_object(&self) -> Self::Handle;

    /// Deep clone. Used whenever the evaluator needs to hand out part of
    /// the scope as a freshly owned value (spec §4.A).
    fn clone_value(&self, value: &Self::Handle) -> Self::Handle;

    fn kind(&self, value: &Self::Handle) -> ValueKind;

    fn as_bool(&self, value: &Self::Handle) -> Option<bool>;
    fn as_number(&self, value: &Self::Handle) -> Option<f64>;
    fn as_str<'a>(&self, value: &'a Self::Handle) -> Option<&'a str>;

    /// String byte length / array size / object size; `None` for
    /// null/boolean/number.
    fn length(&self, value: &Self::Handle) -> Option<usize>;

    /// Array element by non-negative, in-range index.
    fn index_get(&self, array: &Self::Handle, i: usize) -> Option<Self::Handle>;

    /// Object field by key.
    fn key_get(&self, object: &Self::Handle, key: &str) -> Option<Self::Handle>;

    /// Push onto an array, consuming the pushed value (transfers ownership
    /// the way spec §5 describes "placed into a container through add").
    fn array_push(&self, array: &mut Self::Handle, item: Self::Handle);

    /// Set (insert or overwrite) a key on an object, preserving first-seen
    /// insertion order for new keys.
    fn object_set(&self, object: &mut Self::Handle, key: &str, item: Self::Handle);

    /// Keys in insertion order (objects only).
    fn keys(&self, object: &Self::Handle) -> Vec<String>;

    /// Byte slice of a string value, for string indexing/slicing. Default
    /// implementation derives it from `as_str`; backends with a cheaper
    /// representation may override.
    fn string_bytes<'a>(&self, value: &'a Self::Handle) -> Option<&'a [u8]> {
        self.as_str(value).map(|s| s.as_bytes())
    }
}
