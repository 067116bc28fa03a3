//! Tree-walking expression evaluator (spec §4.D).
//!
//! Generic over `S: ValueSystem` rather than boxing a trait object — the
//! associated `Handle` type makes `dyn ValueSystem` non-object-safe anyway,
//! and monomorphizing lets every call into the capability inline the way
//! the teacher's provider-trait call sites do.

use lattice_core::{BinOp, Expr, LatticeResult, UnOp, ValueKind, ValueSystem};

use crate::error::EvalError;
use crate::methods;

pub fn eval<S: ValueSystem>(
    s: &S,
    node: &Expr,
    scope: &S::Handle,
    root: &S::Handle,
) -> LatticeResult<S::Handle> {
    match node {
        Expr::Null { .. } => Ok(s.null()),
        Expr::Bool { value, .. } => Ok(s.boolean(*value)),
        Expr::Number { value, .. } => Ok(s.number(*value)),
        Expr::Str { value, .. } => Ok(s.string(value)),

        Expr::Array { items, .. } => {
            let mut out = s.empty_array();
            for item in items {
                let v = eval(s, item, scope, root)?;
                s.array_push(&mut out, v);
            }
            Ok(out)
        }

        Expr::Object { entries, line } => {
            let mut out = s.empty_object();
            for (key_expr, value_expr) in entries {
                let key = eval(s, key_expr, scope, root)?;
                match s.kind(&key) {
                    ValueKind::Null => {
                        // Evaluated for side effects and discarded (spec §4.D).
                        eval(s, value_expr, scope, root)?;
                    }
                    ValueKind::String => {
                        let key_text = s.as_str(&key).expect("string kind").to_string();
                        let value = eval(s, value_expr, scope, root)?;
                        s.object_set(&mut out, &key_text, value);
                    }
                    _ => return Err(EvalError::ObjectKeyInvalid { line: *line }.into()),
                }
            }
            Ok(out)
        }

        Expr::Binary { op, lhs, rhs, line } => match op {
            BinOp::Or => {
                let lv = eval(s, lhs, scope, root)?;
                if truthy(s, &lv) {
                    Ok(lv)
                } else {
                    eval(s, rhs, scope, root)
                }
            }
            BinOp::And => {
                let lv = eval(s, lhs, scope, root)?;
                if !truthy(s, &lv) {
                    Ok(lv)
                } else {
                    eval(s, rhs, scope, root)
                }
            }
            _ => {
                let lv = eval(s, lhs, scope, root)?;
                let rv = eval(s, rhs, scope, root)?;
                eval_binary(s, *op, &lv, &rv, *line)
            }
        },

        Expr::Unary { op, operand, line } => {
            let v = eval(s, operand, scope, root)?;
            match op {
                UnOp::Not => Ok(s.boolean(!truthy(s, &v))),
                UnOp::Pos => {
                    let n = s.as_number(&v).ok_or(EvalError::UnaryRequiresNumber {
                        line: *line,
                        op: '+',
                    })?;
                    Ok(s.number(n))
                }
                UnOp::Neg => {
                    let n = s.as_number(&v).ok_or(EvalError::UnaryRequiresNumber {
                        line: *line,
                        op: '-',
                    })?;
                    Ok(s.number(-n))
                }
                UnOp::Comp => {
                    let bits = to_u64_bits(s, &v, *line)?;
                    Ok(s.number((!bits) as f64))
                }
            }
        }

        Expr::Root { .. } => Ok(s.clone_value(root)),

        Expr::Ident { name, line } => {
            if s.kind(scope) != ValueKind::Object {
                return Err(EvalError::ScopeNotObject { line: *line }.into());
            }
            s.key_get(scope, name).ok_or_else(|| {
                EvalError::UndefinedName {
                    line: *line,
                    name: name.clone(),
                }
                .into()
            })
        }

        Expr::Lookup { object, name, line } => {
            let obj = eval(s, object, scope, root)?;
            if s.kind(&obj) != ValueKind::Object {
                return Err(EvalError::LookupRequiresObject { line: *line }.into());
            }
            s.key_get(&obj, name).ok_or_else(|| {
                EvalError::LookupMissingKey {
                    line: *line,
                    name: name.clone(),
                }
                .into()
            })
        }

        Expr::Method {
            object,
            name,
            args,
            line,
        } => {
            let receiver = eval(s, object, scope, root)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval(s, arg, scope, root)?);
            }
            methods::dispatch(s, name, &receiver, &arg_values, *line)
        }

        Expr::Index {
            collection,
            index,
            line,
        } => {
            let coll = eval(s, collection, scope, root)?;
            let idx = eval(s, index, scope, root)?;
            eval_index(s, &coll, &idx, *line)
        }

        Expr::IndexRange {
            collection,
            start,
            end,
            line,
        } => {
            let coll = eval(s, collection, scope, root)?;
            let start_v = eval(s, start, scope, root)?;
            let end_v = eval(s, end, scope, root)?;
            eval_index_range(s, &coll, &start_v, &end_v, *line)
        }

        Expr::Ternary {
            cond,
            if_true,
            if_false,
            ..
        } => {
            let c = eval(s, cond, scope, root)?;
            if truthy(s, &c) {
                eval(s, if_true, scope, root)
            } else {
                eval(s, if_false, scope, root)
            }
        }
    }
}

pub fn truthy<S: ValueSystem>(s: &S, v: &S::Handle) -> bool {
    match s.kind(v) {
        ValueKind::Null => false,
        ValueKind::Boolean => s.as_bool(v).unwrap_or(false),
        ValueKind::Number => s.as_number(v).map(|n| n != 0.0).unwrap_or(false),
        ValueKind::String | ValueKind::Array | ValueKind::Object => {
            s.length(v).map(|len| len > 0).unwrap_or(false)
        }
    }
}

pub fn values_equal<S: ValueSystem>(s: &S, a: &S::Handle, b: &S::Handle) -> bool {
    let ka = s.kind(a);
    let kb = s.kind(b);
    if ka != kb {
        return false;
    }
    match ka {
        ValueKind::Null => true,
        ValueKind::Boolean => {
            let av = s.as_bool(a).unwrap_or(false);
            let bv = s.as_bool(b).unwrap_or(false);
            av == bv
        }
        ValueKind::Number => s.as_number(a) == s.as_number(b),
        ValueKind::String => s.as_str(a) == s.as_str(b),
        // "deep equality unspecified and not relied upon" (spec §9, open question).
        ValueKind::Array | ValueKind::Object => false,
    }
}

fn eval_binary<S: ValueSystem>(
    s: &S,
    op: BinOp,
    a: &S::Handle,
    b: &S::Handle,
    line: usize,
) -> LatticeResult<S::Handle> {
    match op {
        BinOp::Eq => Ok(s.boolean(values_equal(s, a, b))),
        BinOp::Neq => Ok(s.boolean(!values_equal(s, a, b))),
        BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => {
            Ok(s.boolean(compare_ordered(s, op, a, b, line)?))
        }
        BinOp::Add => eval_add(s, a, b, line),
        BinOp::Sub | BinOp::Div | BinOp::Quot | BinOp::Mod | BinOp::Exp => {
            eval_numeric_arith(s, op, a, b, line)
        }
        BinOp::Mul => multiply(s, a, b, line),
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => eval_bitwise(s, op, a, b, line),
        BinOp::Or | BinOp::And => {
            unreachable!("short-circuit operators are handled before operand evaluation")
        }
    }
}

fn compare_ordered<S: ValueSystem>(
    s: &S,
    op: BinOp,
    a: &S::Handle,
    b: &S::Handle,
    line: usize,
) -> LatticeResult<bool> {
    match (s.kind(a), s.kind(b)) {
        (ValueKind::Number, ValueKind::Number) => {
            let x = s.as_number(a).unwrap();
            let y = s.as_number(b).unwrap();
            Ok(apply_ordering(op, x.partial_cmp(&y)))
        }
        (ValueKind::String, ValueKind::String) => {
            let x = s.as_str(a).unwrap_or("");
            let y = s.as_str(b).unwrap_or("");
            Ok(apply_ordering(op, Some(x.cmp(y))))
        }
        _ => Err(EvalError::OrderedComparisonMismatch { line }.into()),
    }
}

fn apply_ordering(op: BinOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (_, None) => false, // NaN comparisons are always false
        (BinOp::Lt, Some(o)) => o == Less,
        (BinOp::Lte, Some(o)) => o != Greater,
        (BinOp::Gt, Some(o)) => o == Greater,
        (BinOp::Gte, Some(o)) => o != Less,
        _ => unreachable!("apply_ordering only called for comparison operators"),
    }
}

fn eval_add<S: ValueSystem>(s: &S, a: &S::Handle, b: &S::Handle, line: usize) -> LatticeResult<S::Handle> {
    match (s.kind(a), s.kind(b)) {
        (ValueKind::Number, ValueKind::Number) => {
            Ok(s.number(s.as_number(a).unwrap() + s.as_number(b).unwrap()))
        }
        (ValueKind::String, ValueKind::String) => {
            let mut out = String::with_capacity(
                s.as_str(a).map(str::len).unwrap_or(0) + s.as_str(b).map(str::len).unwrap_or(0),
            );
            out.push_str(s.as_str(a).unwrap_or(""));
            out.push_str(s.as_str(b).unwrap_or(""));
            Ok(s.string(&out))
        }
        (ValueKind::Array, ValueKind::Array) => {
            let mut out = s.empty_array();
            append_elements(s, &mut out, a);
            append_elements(s, &mut out, b);
            Ok(out)
        }
        _ => Err(EvalError::AddTypeMismatch { line }.into()),
    }
}

fn append_elements<S: ValueSystem>(s: &S, out: &mut S::Handle, array: &S::Handle) {
    let len = s.length(array).unwrap_or(0);
    for i in 0..len {
        if let Some(item) = s.index_get(array, i) {
            s.array_push(out, item);
        }
    }
}

fn eval_numeric_arith<S: ValueSystem>(
    s: &S,
    op: BinOp,
    a: &S::Handle,
    b: &S::Handle,
    line: usize,
) -> LatticeResult<S::Handle> {
    let x = s
        .as_number(a)
        .ok_or(EvalError::ArithmeticRequiresNumbers { line })?;
    let y = s
        .as_number(b)
        .ok_or(EvalError::ArithmeticRequiresNumbers { line })?;
    let result = match op {
        BinOp::Sub => x - y,
        BinOp::Div => x / y,
        BinOp::Quot => (x / y).floor(),
        BinOp::Mod => x % y,
        BinOp::Exp => x.powf(y),
        _ => unreachable!("eval_numeric_arith only called for sub/div/quot/mod/exp"),
    };
    Ok(s.number(result))
}

/// `*`: number×number, string×number (repeat), array×number (repeat
/// elementwise). Shared with the `repeat(n)` method.
pub(crate) fn multiply<S: ValueSystem>(
    s: &S,
    a: &S::Handle,
    b: &S::Handle,
    line: usize,
) -> LatticeResult<S::Handle> {
    match (s.kind(a), s.kind(b)) {
        (ValueKind::Number, ValueKind::Number) => {
            Ok(s.number(s.as_number(a).unwrap() * s.as_number(b).unwrap()))
        }
        (ValueKind::String, ValueKind::Number) => {
            let n = repeat_count(s, b, line)?;
            let text = s.as_str(a).unwrap_or("");
            Ok(s.string(&text.repeat(n)))
        }
        (ValueKind::Array, ValueKind::Number) => {
            let n = repeat_count(s, b, line)?;
            let mut out = s.empty_array();
            for _ in 0..n {
                append_elements(s, &mut out, a);
            }
            Ok(out)
        }
        _ => Err(EvalError::MultiplyTypeMismatch { line }.into()),
    }
}

fn repeat_count<S: ValueSystem>(s: &S, n: &S::Handle, line: usize) -> LatticeResult<usize> {
    let v = s
        .as_number(n)
        .ok_or(EvalError::RepeatCountNotNumber { line })?;
    if v.fract() != 0.0 {
        return Err(EvalError::RepeatCountNotWhole { line }.into());
    }
    Ok(if v < 0.0 { 0 } else { v as usize })
}

fn to_u64_bits<S: ValueSystem>(s: &S, v: &S::Handle, line: usize) -> LatticeResult<u64> {
    let n = s
        .as_number(v)
        .ok_or(EvalError::BitwiseRequiresNumbers { line })?;
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(EvalError::BitwiseOperandsNotWhole { line }.into());
    }
    Ok(n as i64 as u64)
}

fn eval_bitwise<S: ValueSystem>(
    s: &S,
    op: BinOp,
    a: &S::Handle,
    b: &S::Handle,
    line: usize,
) -> LatticeResult<S::Handle> {
    let x = to_u64_bits(s, a, line)?;
    let y = to_u64_bits(s, b, line)?;
    let result = match op {
        BinOp::BitAnd => x & y,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        _ => unreachable!("eval_bitwise only called for and/or/xor"),
    };
    Ok(s.number(result as f64))
}

fn resolve_index<S: ValueSystem>(s: &S, idx: &S::Handle, len: usize, line: usize) -> LatticeResult<usize> {
    let n = s.as_number(idx).ok_or(EvalError::IndexNotNumber { line })?;
    if n.fract() != 0.0 {
        return Err(EvalError::IndexNotWhole { line }.into());
    }
    let i = n as i64;
    let actual = if i < 0 { i + len as i64 } else { i };
    if actual < 0 {
        return Err(EvalError::IndexOutOfRange { line }.into());
    }
    Ok(actual as usize)
}

fn eval_index<S: ValueSystem>(s: &S, coll: &S::Handle, idx: &S::Handle, line: usize) -> LatticeResult<S::Handle> {
    match s.kind(coll) {
        ValueKind::String => {
            let text = s.as_str(coll).unwrap_or("").to_string();
            let bytes = text.as_bytes();
            let i = resolve_index(s, idx, bytes.len(), line)?;
            match bytes.get(i) {
                Some(&byte) => Ok(s.string(&(byte as char).to_string())),
                None => Err(EvalError::StringIndexOutOfRange { line }.into()),
            }
        }
        ValueKind::Array => {
            let len = s.length(coll).unwrap_or(0);
            let i = resolve_index(s, idx, len, line)?;
            s.index_get(coll, i)
                .ok_or_else(|| EvalError::ArrayIndexOutOfRange { line }.into())
        }
        ValueKind::Object => {
            let key = s
                .as_str(idx)
                .ok_or(EvalError::ObjectIndexNotString { line })?;
            s.key_get(coll, key).ok_or_else(|| {
                EvalError::IndexMissingKey {
                    line,
                    key: key.to_string(),
                }
                .into()
            })
        }
        _ => Err(EvalError::IndexingUnsupportedType { line }.into()),
    }
}

fn clamp_to_range(n: f64, len: usize) -> usize {
    let i = n as i64;
    let actual = if i < 0 { i + len as i64 } else { i };
    actual.clamp(0, len as i64) as usize
}

fn eval_index_range<S: ValueSystem>(
    s: &S,
    coll: &S::Handle,
    start: &S::Handle,
    end: &S::Handle,
    line: usize,
) -> LatticeResult<S::Handle> {
    match s.kind(coll) {
        ValueKind::String => {
            let text = s.as_str(coll).unwrap_or("").to_string();
            let len = text.as_bytes().len();
            let i = clamp_to_range(
                s.as_number(start).ok_or(EvalError::RangeBoundNotNumber {
                    line,
                    bound: "start",
                })?,
                len,
            );
            let j = clamp_to_range(
                s.as_number(end).ok_or(EvalError::RangeBoundNotNumber {
                    line,
                    bound: "end",
                })?,
                len,
            );
            let slice = if j > i { &text.as_bytes()[i..j] } else { &[][..] };
            Ok(s.string(std::str::from_utf8(slice).unwrap_or("")))
        }
        ValueKind::Array => {
            let len = s.length(coll).unwrap_or(0);
            let i = clamp_to_range(
                s.as_number(start).ok_or(EvalError::RangeBoundNotNumber {
                    line,
                    bound: "start",
                })?,
                len,
            );
            let j = clamp_to_range(
                s.as_number(end).ok_or(EvalError::RangeBoundNotNumber {
                    line,
                    bound: "end",
                })?,
                len,
            );
            let mut out = s.empty_array();
            if j > i {
                for k in i..j {
                    if let Some(item) = s.index_get(coll, k) {
                        s.array_push(&mut out, item);
                    }
                }
            }
            Ok(out)
        }
        ValueKind::Object => Err(EvalError::RangeOnObjectUnsupported { line }.into()),
        _ => Err(EvalError::RangeRequiresIndexable { line }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::Expr;

    #[derive(Clone, Debug, PartialEq)]
    enum TestValue {
        Null,
        Bool(bool),
        Number(f64),
        String(String),
        Array(Vec<TestValue>),
        Object(Vec<(String, TestValue)>),
    }

    struct TestSystem;

    impl ValueSystem for TestSystem {
        type Handle = TestValue;

        fn parse(&self, _json: &str) -> LatticeResult<Self::Handle> {
            unimplemented!("not exercised by these tests")
        }

        fn print(&self, _value: &Self::Handle) -> LatticeResult<String> {
            unimplemented!("not exercised by these tests")
        }

        fn null(&self) -> Self::Handle {
            TestValue::Null
        }
        fn boolean(&self, b: bool) -> Self::Handle {
            TestValue::Bool(b)
        }
        fn number(&self, n: f64) -> Self::Handle {
            TestValue::Number(n)
        }
        fn string(&self, s: &str) -> Self::Handle {
            TestValue::String(s.to_string())
        }
        fn empty_array(&self) -> Self::Handle {
            TestValue::Array(Vec::new())
        }
        fn empty_object(&self) -> Self::Handle {
            TestValue::Object(Vec::new())
        }
        fn clone_value(&self, value: &Self::Handle) -> Self::Handle {
            value.clone()
        }
        fn kind(&self, value: &Self::Handle) -> ValueKind {
            match value {
                TestValue::Null => ValueKind::Null,
                TestValue::Bool(_) => ValueKind::Boolean,
                TestValue::Number(_) => ValueKind::Number,
                TestValue::String(_) => ValueKind::String,
                TestValue::Array(_) => ValueKind::Array,
                TestValue::Object(_) => ValueKind::Object,
            }
        }
        fn as_bool(&self, value: &Self::Handle) -> Option<bool> {
            match value {
                TestValue::Bool(b) => Some(*b),
                _ => None,
            }
        }
        fn as_number(&self, value: &Self::Handle) -> Option<f64> {
            match value {
                TestValue::Number(n) => Some(*n),
                _ => None,
            }
        }
        fn as_str<'a>(&self, value: &'a Self::Handle) -> Option<&'a str> {
            match value {
                TestValue::String(s) => Some(s),
                _ => None,
            }
        }
        fn length(&self, value: &Self::Handle) -> Option<usize> {
            match value {
                TestValue::String(s) => Some(s.len()),
                TestValue::Array(a) => Some(a.len()),
                TestValue::Object(o) => Some(o.len()),
                _ => None,
            }
        }
        fn index_get(&self, array: &Self::Handle, i: usize) -> Option<Self::Handle> {
            match array {
                TestValue::Array(a) => a.get(i).cloned(),
                _ => None,
            }
        }
        fn key_get(&self, object: &Self::Handle, key: &str) -> Option<Self::Handle> {
            match object {
                TestValue::Object(o) => o.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
                _ => None,
            }
        }
        fn array_push(&self, array: &mut Self::Handle, item: Self::Handle) {
            if let TestValue::Array(a) = array {
                a.push(item);
            }
        }
        fn object_set(&self, object: &mut Self::Handle, key: &str, item: Self::Handle) {
            if let TestValue::Object(o) = object {
                if let Some(entry) = o.iter_mut().find(|(k, _)| k == key) {
                    entry.1 = item;
                } else {
                    o.push((key.to_string(), item));
                }
            }
        }
        fn keys(&self, object: &Self::Handle) -> Vec<String> {
            match object {
                TestValue::Object(o) => o.iter().map(|(k, _)| k.clone()).collect(),
                _ => Vec::new(),
            }
        }
    }

    fn root_scope() -> TestValue {
        TestValue::Object(vec![("n".to_string(), TestValue::Number(3.0))])
    }

    #[test]
    fn ident_lookup_resolves_against_scope() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Ident {
            name: "n".to_string(),
            line: 1,
        };
        let result = eval(&sys, &expr, &scope, &scope).unwrap();
        assert_eq!(result, TestValue::Number(3.0));
    }

    #[test]
    fn undefined_ident_is_name_error() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Ident {
            name: "missing".to_string(),
            line: 1,
        };
        let err = eval(&sys, &expr, &scope, &scope).unwrap_err();
        assert_eq!(err.kind, lattice_core::ErrorKind::Name);
    }

    #[test]
    fn or_short_circuits_without_evaluating_rhs() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Binary {
            op: BinOp::Or,
            lhs: Box::new(Expr::Bool { value: true, line: 1 }),
            rhs: Box::new(Expr::Ident {
                name: "does-not-exist".to_string(),
                line: 1,
            }),
            line: 1,
        };
        let result = eval(&sys, &expr, &scope, &scope).unwrap();
        assert_eq!(result, TestValue::Bool(true));
    }

    #[test]
    fn string_concatenation() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Str {
                value: "a".to_string(),
                line: 1,
            }),
            rhs: Box::new(Expr::Str {
                value: "b".to_string(),
                line: 1,
            }),
            line: 1,
        };
        assert_eq!(
            eval(&sys, &expr, &scope, &scope).unwrap(),
            TestValue::String("ab".to_string())
        );
    }

    #[test]
    fn negative_string_index_counts_from_end() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Index {
            collection: Box::new(Expr::Str {
                value: "hi".to_string(),
                line: 1,
            }),
            index: Box::new(Expr::Number { value: -1.0, line: 1 }),
            line: 1,
        };
        assert_eq!(
            eval(&sys, &expr, &scope, &scope).unwrap(),
            TestValue::String("i".to_string())
        );
    }

    #[test]
    fn range_clamps_and_empty_when_reversed() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::IndexRange {
            collection: Box::new(Expr::Str {
                value: "hello".to_string(),
                line: 1,
            }),
            start: Box::new(Expr::Number { value: 3.0, line: 1 }),
            end: Box::new(Expr::Number { value: 1.0, line: 1 }),
            line: 1,
        };
        assert_eq!(
            eval(&sys, &expr, &scope, &scope).unwrap(),
            TestValue::String(String::new())
        );
    }

    #[test]
    fn comparison_requires_matching_types() {
        let sys = TestSystem;
        let scope = root_scope();
        let expr = Expr::Binary {
            op: BinOp::Lt,
            lhs: Box::new(Expr::Number { value: 1.0, line: 1 }),
            rhs: Box::new(Expr::Str {
                value: "x".to_string(),
                line: 1,
            }),
            line: 1,
        };
        assert!(eval(&sys, &expr, &scope, &scope).is_err());
    }
}
