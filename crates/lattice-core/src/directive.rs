//! The directive tree (spec §3 "Directive token", §4.F, §9).
//!
//! Spec §9 recommends structured nodes over the source's cyclic
//! parent/prev/next/child pointer list: "each block directive owns its body
//! as a sequence, and if/elif/else are grouped into a single 'conditional
//! chain' node". That is the representation below — a `Vec<Directive>`
//! owned by whichever node introduces a block, with `If`/`Switch` flattening
//! their elif/case siblings into one node instead of linking them.

use crate::ast::Expr;

/// A loop/scope binding name. `Anonymous` is the `_` placeholder: spec
/// §4.H says "when `id == \"_\"`, do not clone/rebind — reuse outer scope".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Named(String),
    Anonymous,
}

impl Binding {
    pub fn from_source(name: &str) -> Self {
        if name == "_" {
            Binding::Anonymous
        } else {
            Binding::Named(name.to_string())
        }
    }
}

/// One arm of an `if`/`elif` chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CondArm {
    pub cond: Expr,
    pub body: Vec<Directive>,
    pub line: usize,
}

/// One arm of a `switch`/`case` chain. `case` is `Some`; the trailing
/// `default`, if present, is `None` and is enforced (by the block builder)
/// to be the last arm.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub case: Option<Expr>,
    pub body: Vec<Directive>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// A run of literal output bytes.
    Span { text: String, line: usize },
    /// `$[expr]` — evaluate, then pass through the escape function.
    SubEsc { expr: Expr, line: usize },
    /// `${expr}` — evaluate, emit raw.
    SubRaw { expr: Expr, line: usize },
    /// `$<path>`. `body` is filled in by the include resolver with the
    /// parsed contents of the included template; empty until resolved.
    Include {
        path: String,
        body: Vec<Directive>,
        line: usize,
    },
    /// `if`/`elif`/`else` chain. `else_body` is `None` when no `else` was
    /// written.
    If {
        arms: Vec<CondArm>,
        else_body: Option<Vec<Directive>>,
        line: usize,
    },
    /// `switch`/`case`/`default`.
    Switch {
        discriminant: Expr,
        arms: Vec<CaseArm>,
        line: usize,
    },
    ForRange {
        var: Binding,
        low: Expr,
        high: Expr,
        inclusive: bool,
        body: Vec<Directive>,
        line: usize,
    },
    ForIter {
        var: Binding,
        iterable: Expr,
        body: Vec<Directive>,
        line: usize,
    },
    With {
        expr: Expr,
        body: Vec<Directive>,
        line: usize,
    },
}

impl Directive {
    pub fn line(&self) -> usize {
        match self {
            Directive::Span { line, .. }
            | Directive::SubEsc { line, .. }
            | Directive::SubRaw { line, .. }
            | Directive::Include { line, .. }
            | Directive::If { line, .. }
            | Directive::Switch { line, .. }
            | Directive::ForRange { line, .. }
            | Directive::ForIter { line, .. }
            | Directive::With { line, .. } => *line,
        }
    }
}

/// A fully parsed template: its directive tree, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub directives: Vec<Directive>,
}
