//! The renderer walk (spec §4.H).
//!
//! Walks a resolved directive tree, evaluating expressions against a scope
//! handle and emitting output bytes through a caller-supplied sink. Scope
//! threading follows spec §4.H: `for`/`with` rebind the scope seen by their
//! body, `if`/`switch` do not, and a loop variable named `_` reuses the
//! outer scope unchanged rather than cloning it.

use lattice_core::{Directive, LatticeResult, Template, ValueKind, ValueSystem};
use lattice_eval::{eval, truthy, values_equal};

use crate::error::RenderError;
use lattice_core::Binding;

/// Render configuration: include search behaviour, the escape function
/// substitutions pass through, and emit-callback tolerance.
pub struct RenderOptions {
    pub search_path: Vec<String>,
    pub resolve: Option<Box<dyn Fn(&str) -> LatticeResult<String>>>,
    pub escape: Box<dyn Fn(&str) -> String>,
    /// When `true`, an emit callback returning `0` is treated as "nothing
    /// more to write" rather than an IO error (spec §9, open question).
    pub ignore_emit_zero: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
            resolve: None,
            escape: Box::new(default_escape),
            ignore_emit_zero: false,
        }
    }
}

impl RenderOptions {
    pub fn with_search_path(mut self, dirs: impl IntoIterator<Item = String>) -> Self {
        self.search_path = dirs.into_iter().collect();
        self
    }

    pub fn with_resolve(mut self, resolve: impl Fn(&str) -> LatticeResult<String> + 'static) -> Self {
        self.resolve = Some(Box::new(resolve));
        self
    }

    pub fn with_escape(mut self, escape: impl Fn(&str) -> String + 'static) -> Self {
        self.escape = Box::new(escape);
        self
    }

    pub fn ignore_emit_zero(mut self, ignore: bool) -> Self {
        self.ignore_emit_zero = ignore;
        self
    }
}

/// The default escape function (spec §4.H): `& ' " < >` become decimal
/// numeric character references, everything else passes through unchanged.
pub fn default_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&#38;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            '<' => out.push_str("&#60;"),
            '>' => out.push_str("&#62;"),
            other => out.push(other),
        }
    }
    out
}

/// Render a template (with its includes already resolved, see
/// [`crate::include::resolve_includes`]) against `root`, writing output
/// bytes through `emit`. Returns the total byte count written.
#[tracing::instrument(skip_all)]
pub fn render<S: ValueSystem>(
    s: &S,
    template: &Template,
    root: &S::Handle,
    opts: &RenderOptions,
    emit: &mut dyn FnMut(&[u8]) -> usize,
) -> LatticeResult<usize> {
    let mut total = 0usize;
    render_body(s, &template.directives, root, root, opts, emit, &mut total)?;
    Ok(total)
}

/// Render into an in-memory buffer.
pub fn render_to_buffer<S: ValueSystem>(
    s: &S,
    template: &Template,
    root: &S::Handle,
    opts: &RenderOptions,
) -> LatticeResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut emit = |data: &[u8]| -> usize {
            buffer.extend_from_slice(data);
            data.len()
        };
        render(s, template, root, opts, &mut emit)?;
    }
    Ok(buffer)
}

/// Render directly into a `Write` sink (a file, a socket, ...).
pub fn render_to_file<S: ValueSystem>(
    s: &S,
    template: &Template,
    root: &S::Handle,
    opts: &RenderOptions,
    sink: &mut impl std::io::Write,
) -> LatticeResult<usize> {
    let mut io_err: Option<std::io::Error> = None;
    let mut emit = |data: &[u8]| -> usize {
        if io_err.is_some() {
            return 0;
        }
        match sink.write_all(data) {
            Ok(()) => data.len(),
            Err(e) => {
                io_err = Some(e);
                0
            }
        }
    };
    let result = render(s, template, root, opts, &mut emit);
    match io_err {
        Some(source) => Err(RenderError::SinkWrite { source }.into()),
        None => result,
    }
}

#[allow(clippy::too_many_arguments)]
fn render_body<S: ValueSystem>(
    s: &S,
    directives: &[Directive],
    scope: &S::Handle,
    root: &S::Handle,
    opts: &RenderOptions,
    emit: &mut dyn FnMut(&[u8]) -> usize,
    total: &mut usize,
) -> LatticeResult<()> {
    for directive in directives {
        render_one(s, directive, scope, root, opts, emit, total)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_one<S: ValueSystem>(
    s: &S,
    directive: &Directive,
    scope: &S::Handle,
    root: &S::Handle,
    opts: &RenderOptions,
    emit: &mut dyn FnMut(&[u8]) -> usize,
    total: &mut usize,
) -> LatticeResult<()> {
    match directive {
        Directive::Span { text, line } => emit_bytes(text.as_bytes(), opts, emit, total, *line),
        Directive::SubRaw { expr, line } => {
            let value = eval(s, expr, scope, root)?;
            let text = value_to_text(s, &value)?;
            emit_bytes(text.as_bytes(), opts, emit, total, *line)
        }
        Directive::SubEsc { expr, line } => {
            let value = eval(s, expr, scope, root)?;
            let text = value_to_text(s, &value)?;
            let escaped = (opts.escape)(&text);
            emit_bytes(escaped.as_bytes(), opts, emit, total, *line)
        }
        Directive::Include { body, .. } => render_body(s, body, scope, root, opts, emit, total),
        Directive::If {
            arms, else_body, ..
        } => {
            for arm in arms {
                let cond = eval(s, &arm.cond, scope, root)?;
                if truthy(s, &cond) {
                    return render_body(s, &arm.body, scope, root, opts, emit, total);
                }
            }
            match else_body {
                Some(body) => render_body(s, body, scope, root, opts, emit, total),
                None => Ok(()),
            }
        }
        Directive::Switch {
            discriminant, arms, ..
        } => {
            let disc = eval(s, discriminant, scope, root)?;
            for arm in arms {
                match &arm.case {
                    Some(case_expr) => {
                        let case_value = eval(s, case_expr, scope, root)?;
                        if values_equal(s, &disc, &case_value) {
                            return render_body(s, &arm.body, scope, root, opts, emit, total);
                        }
                    }
                    None => return render_body(s, &arm.body, scope, root, opts, emit, total),
                }
            }
            Ok(())
        }
        Directive::ForRange {
            var,
            low,
            high,
            inclusive,
            body,
            line,
        } => {
            let low_v = eval(s, low, scope, root)?;
            let high_v = eval(s, high, scope, root)?;
            let low = s
                .as_number(&low_v)
                .ok_or(RenderError::ForRangeBoundNotNumber { line: *line })?;
            let high = s
                .as_number(&high_v)
                .ok_or(RenderError::ForRangeBoundNotNumber { line: *line })?;
            let mut i = low;
            loop {
                let continues = if *inclusive { i <= high } else { i < high };
                if !continues {
                    break;
                }
                let value = s.number(i);
                match loop_scope(s, scope, var, value, *line)? {
                    Some(new_scope) => render_body(s, body, &new_scope, root, opts, emit, total)?,
                    None => render_body(s, body, scope, root, opts, emit, total)?,
                }
                i += 1.0;
            }
            Ok(())
        }
        Directive::ForIter {
            var,
            iterable,
            body,
            line,
        } => {
            let collection = eval(s, iterable, scope, root)?;
            match s.kind(&collection) {
                ValueKind::String => {
                    let text = s.as_str(&collection).unwrap_or("").to_string();
                    for ch in text.chars() {
                        let value = s.string(&ch.to_string());
                        match loop_scope(s, scope, var, value, *line)? {
                            Some(new_scope) => {
                                render_body(s, body, &new_scope, root, opts, emit, total)?
                            }
                            None => render_body(s, body, scope, root, opts, emit, total)?,
                        }
                    }
                }
                ValueKind::Array => {
                    let len = s.length(&collection).unwrap_or(0);
                    for i in 0..len {
                        if let Some(item) = s.index_get(&collection, i) {
                            match loop_scope(s, scope, var, item, *line)? {
                                Some(new_scope) => {
                                    render_body(s, body, &new_scope, root, opts, emit, total)?
                                }
                                None => render_body(s, body, scope, root, opts, emit, total)?,
                            }
                        }
                    }
                }
                ValueKind::Object => {
                    for key in s.keys(&collection) {
                        let value = s.string(&key);
                        match loop_scope(s, scope, var, value, *line)? {
                            Some(new_scope) => {
                                render_body(s, body, &new_scope, root, opts, emit, total)?
                            }
                            None => render_body(s, body, scope, root, opts, emit, total)?,
                        }
                    }
                }
                _ => return Err(RenderError::ForInUnsupportedType { line: *line }.into()),
            }
            Ok(())
        }
        Directive::With { expr, body, .. } => {
            let new_scope = eval(s, expr, scope, root)?;
            render_body(s, body, &new_scope, root, opts, emit, total)
        }
    }
}

/// Build the fresh scope a `for`/`with` body sees: the current scope's
/// fields minus any existing binding under `name`, plus `{name: value}`.
/// `_` is the anonymous placeholder — returning `None` tells the caller to
/// reuse `scope` unchanged rather than clone it (spec §4.H).
fn loop_scope<S: ValueSystem>(
    s: &S,
    outer: &S::Handle,
    binding: &Binding,
    value: S::Handle,
    line: usize,
) -> LatticeResult<Option<S::Handle>> {
    match binding {
        Binding::Anonymous => Ok(None),
        Binding::Named(name) => {
            if s.kind(outer) != ValueKind::Object {
                return Err(RenderError::LoopScopeNotObject { line }.into());
            }
            let mut new_scope = s.empty_object();
            for key in s.keys(outer) {
                if &key == name {
                    continue;
                }
                if let Some(field) = s.key_get(outer, &key) {
                    s.object_set(&mut new_scope, &key, field);
                }
            }
            s.object_set(&mut new_scope, name, value);
            Ok(Some(new_scope))
        }
    }
}

fn value_to_text<S: ValueSystem>(s: &S, value: &S::Handle) -> LatticeResult<String> {
    match s.kind(value) {
        ValueKind::String => Ok(s.as_str(value).unwrap_or("").to_string()),
        _ => s.print(value),
    }
}

fn emit_bytes(
    data: &[u8],
    opts: &RenderOptions,
    emit: &mut dyn FnMut(&[u8]) -> usize,
    total: &mut usize,
    line: usize,
) -> LatticeResult<()> {
    if data.is_empty() {
        return Ok(());
    }
    let written = emit(data);
    if written == 0 && !opts.ignore_emit_zero {
        return Err(RenderError::EmitZeroBytes { line }.into());
    }
    *total += written;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::ValueKind as VK;

    #[derive(Debug, Clone, PartialEq)]
    enum V {
        Null,
        Bool(bool),
        Num(f64),
        Str(String),
        Arr(Vec<V>),
        Obj(Vec<(String, V)>),
    }

    struct Sys;

    impl ValueSystem for Sys {
        type Handle = V;

        fn parse(&self, _json: &str) -> LatticeResult<V> {
            unimplemented!("not exercised by renderer tests")
        }

        fn print(&self, value: &V) -> LatticeResult<String> {
            Ok(match value {
                V::Null => "null".to_string(),
                V::Bool(b) => b.to_string(),
                V::Num(n) => n.to_string(),
                V::Str(s) => format!("\"{s}\""),
                V::Arr(_) => "[...]".to_string(),
                V::Obj(_) => "{...}".to_string(),
            })
        }

        fn null(&self) -> V {
            V::Null
        }
        fn boolean(&self, b: bool) -> V {
            V::Bool(b)
        }
        fn number(&self, n: f64) -> V {
            V::Num(n)
        }
        fn string(&self, s: &str) -> V {
            V::Str(s.to_string())
        }
        fn empty_array(&self) -> V {
            V::Arr(Vec::new())
        }
        fn empty_object(&self) -> V {
            V::Obj(Vec::new())
        }
        fn clone_value(&self, value: &V) -> V {
            value.clone()
        }
        fn kind(&self, value: &V) -> VK {
            match value {
                V::Null => VK::Null,
                V::Bool(_) => VK::Boolean,
                V::Num(_) => VK::Number,
                V::Str(_) => VK::String,
                V::Arr(_) => VK::Array,
                V::Obj(_) => VK::Object,
            }
        }
        fn as_bool(&self, value: &V) -> Option<bool> {
            match value {
                V::Bool(b) => Some(*b),
                _ => None,
            }
        }
        fn as_number(&self, value: &V) -> Option<f64> {
            match value {
                V::Num(n) => Some(*n),
                _ => None,
            }
        }
        fn as_str<'a>(&self, value: &'a V) -> Option<&'a str> {
            match value {
                V::Str(s) => Some(s.as_str()),
                _ => None,
            }
        }
        fn length(&self, value: &V) -> Option<usize> {
            match value {
                V::Str(s) => Some(s.len()),
                V::Arr(a) => Some(a.len()),
                V::Obj(o) => Some(o.len()),
                _ => None,
            }
        }
        fn index_get(&self, array: &V, i: usize) -> Option<V> {
            match array {
                V::Arr(items) => items.get(i).cloned(),
                _ => None,
            }
        }
        fn key_get(&self, object: &V, key: &str) -> Option<V> {
            match object {
                V::Obj(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
                _ => None,
            }
        }
        fn array_push(&self, array: &mut V, item: V) {
            if let V::Arr(items) = array {
                items.push(item);
            }
        }
        fn object_set(&self, object: &mut V, key: &str, item: V) {
            if let V::Obj(fields) = object {
                if let Some(slot) = fields.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = item;
                } else {
                    fields.push((key.to_string(), item));
                }
            }
        }
        fn keys(&self, object: &V) -> Vec<String> {
            match object {
                V::Obj(fields) => fields.iter().map(|(k, _)| k.clone()).collect(),
                _ => Vec::new(),
            }
        }
    }

    fn render_str(src: &str, root: &V) -> String {
        let template = lattice_parser::parse_template(src.as_bytes()).unwrap();
        let bytes = render_to_buffer(&Sys, &template, root, &RenderOptions::default()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn plain_spans_pass_through() {
        assert_eq!(render_str("hello, world", &V::Null), "hello, world");
    }

    #[test]
    fn escaped_substitution_replaces_html_specials() {
        let root = V::Obj(vec![("x".into(), V::Str("<b>&\"</b>".into()))]);
        assert_eq!(render_str("$[x]", &root), "&#60;b&#62;&#38;&#34;&#60;/b&#62;");
    }

    #[test]
    fn raw_substitution_passes_through_unescaped() {
        let root = V::Obj(vec![("x".into(), V::Str("<b>".into()))]);
        assert_eq!(render_str("${x}", &root), "<b>");
    }

    #[test]
    fn if_chain_picks_the_first_truthy_arm() {
        let root = V::Obj(vec![("flag".into(), V::Bool(false))]);
        let out = render_str("$if flag:yes$else:no$end", &root);
        assert_eq!(out, "no");
    }

    #[test]
    fn for_range_exclusive_binds_loop_variable() {
        let out = render_str("$for i from 0..3:${i}$end", &V::Null);
        assert_eq!(out, "012");
    }

    #[test]
    fn for_iter_over_object_yields_keys() {
        let root = V::Obj(vec![("a".into(), V::Num(1.0)), ("b".into(), V::Num(2.0))]);
        let out = render_str("$for k in @:${k},$end", &root);
        assert_eq!(out, "a,b,");
    }

    #[test]
    fn with_rebinds_scope_for_its_body() {
        let inner = V::Obj(vec![("name".into(), V::Str("lattice".into()))]);
        let root = V::Obj(vec![("person".into(), inner)]);
        let out = render_str("$with person:${name}$end", &root);
        assert_eq!(out, "lattice");
    }

    #[test]
    fn anonymous_loop_variable_reuses_outer_scope() {
        let root = V::Obj(vec![("name".into(), V::Str("kept".into()))]);
        let out = render_str("$for _ from 0..2:${name}$end", &root);
        assert_eq!(out, "keptkept");
    }

    #[test]
    fn switch_falls_through_to_default() {
        let root = V::Obj(vec![("n".into(), V::Num(9.0))]);
        let out = render_str("$switch n:$case 1:one$default:other$end", &root);
        assert_eq!(out, "other");
    }
}
