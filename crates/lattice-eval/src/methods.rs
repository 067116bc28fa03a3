//! The method catalog (spec §4.D "Method catalog").
//!
//! Dispatch is by name: an unknown name fails softly with `null` (spec §9,
//! "a fallback implementation may use a linear search over a small name
//! table; correctness requires that an unknown name returns `null`"); a
//! known name called with the wrong arity is a value error; a known name
//! called on a receiver type it doesn't support returns `null` (tolerant).

use lattice_core::{LatticeResult, ValueKind, ValueSystem};

use crate::error::EvalError;
use crate::eval::{multiply, truthy, values_equal};

pub fn dispatch<S: ValueSystem>(
    s: &S,
    name: &str,
    receiver: &S::Handle,
    args: &[S::Handle],
    line: usize,
) -> LatticeResult<S::Handle> {
    let arity = match expected_arity(name) {
        Some(arity) => arity,
        None => return Ok(s.null()),
    };
    if args.len() != arity {
        return Err(EvalError::ArityMismatch {
            line,
            name: name.to_string(),
            expected: arity,
            found: args.len(),
        }
        .into());
    }
    call(s, name, receiver, args, line)
}

fn expected_arity(name: &str) -> Option<usize> {
    match name {
        "boolean" | "number" | "string" | "type" | "length" | "keys" | "values" | "lower"
        | "upper" | "round" | "nan" | "real" | "datetime" => Some(0),
        "contains" | "find" | "join" | "repeat" => Some(1),
        _ => None,
    }
}

fn call<S: ValueSystem>(
    s: &S,
    name: &str,
    receiver: &S::Handle,
    args: &[S::Handle],
    line: usize,
) -> LatticeResult<S::Handle> {
    match name {
        "boolean" => Ok(s.boolean(truthy(s, receiver))),
        "number" => Ok(s.number(receiver_as_number(s, receiver))),
        "string" => Ok(s.string(&s.print(receiver)?)),
        "type" => Ok(s.string(s.kind(receiver).name())),
        "length" => Ok(match s.length(receiver) {
            Some(len) => s.number(len as f64),
            None => s.null(),
        }),
        "keys" => Ok(keys(s, receiver)),
        "values" => Ok(values(s, receiver)),
        "contains" => Ok(contains(s, receiver, &args[0])),
        "find" => Ok(find(s, receiver, &args[0])),
        "join" => Ok(join(s, receiver, &args[0])),
        "repeat" => multiply(s, receiver, &args[0], line),
        "lower" => Ok(case_fold(s, receiver, str::to_ascii_lowercase)),
        "upper" => Ok(case_fold(s, receiver, str::to_ascii_uppercase)),
        "round" => Ok(numeric_unary(s, receiver, f64::round)),
        "nan" => Ok(match s.as_number(receiver) {
            Some(n) => s.boolean(n.is_nan()),
            None => s.null(),
        }),
        "real" => Ok(match s.as_number(receiver) {
            Some(n) => s.boolean(n.is_finite()),
            None => s.null(),
        }),
        "datetime" => datetime(s, receiver, line),
        _ => unreachable!("dispatch() validates the name against expected_arity() first"),
    }
}

fn receiver_as_number<S: ValueSystem>(s: &S, receiver: &S::Handle) -> f64 {
    match s.kind(receiver) {
        ValueKind::Null => 0.0,
        ValueKind::Boolean => {
            if s.as_bool(receiver).unwrap_or(false) {
                1.0
            } else {
                0.0
            }
        }
        ValueKind::Number => s.as_number(receiver).unwrap_or(0.0),
        ValueKind::String => number_prefix(s.as_str(receiver).unwrap_or("")),
        ValueKind::Array | ValueKind::Object => 0.0,
    }
}

/// Leading-numeric-prefix parse, matching the source's `atof`: a
/// non-numeric string (or one with no leading numeric prefix) yields `0.0`
/// rather than an error (spec §9, open question, resolved this way).
fn number_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut seen_digit = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        seen_digit = true;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            seen_digit = true;
        }
    }
    if seen_digit && i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mark = i;
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        i = if j > exp_digits_start { j } else { mark };
    }
    if !seen_digit {
        return 0.0;
    }
    trimmed[..i].parse::<f64>().unwrap_or(0.0)
}

fn keys<S: ValueSystem>(s: &S, receiver: &S::Handle) -> S::Handle {
    match s.kind(receiver) {
        ValueKind::Object => {
            let mut out = s.empty_array();
            for key in s.keys(receiver) {
                s.array_push(&mut out, s.string(&key));
            }
            out
        }
        ValueKind::Array | ValueKind::String => {
            let len = s.length(receiver).unwrap_or(0);
            let mut out = s.empty_array();
            for i in 0..len {
                s.array_push(&mut out, s.number(i as f64));
            }
            out
        }
        _ => s.null(),
    }
}

fn values<S: ValueSystem>(s: &S, receiver: &S::Handle) -> S::Handle {
    match s.kind(receiver) {
        ValueKind::Array => {
            let len = s.length(receiver).unwrap_or(0);
            let mut out = s.empty_array();
            for i in 0..len {
                if let Some(item) = s.index_get(receiver, i) {
                    s.array_push(&mut out, item);
                }
            }
            out
        }
        ValueKind::Object => {
            let mut out = s.empty_array();
            for key in s.keys(receiver) {
                if let Some(item) = s.key_get(receiver, &key) {
                    s.array_push(&mut out, item);
                }
            }
            out
        }
        _ => s.null(),
    }
}

fn contains<S: ValueSystem>(s: &S, receiver: &S::Handle, needle: &S::Handle) -> S::Handle {
    match s.kind(receiver) {
        ValueKind::String => {
            let haystack = s.as_str(receiver).unwrap_or("");
            let needle = s.as_str(needle).unwrap_or("");
            s.boolean(haystack.contains(needle))
        }
        ValueKind::Array => {
            let len = s.length(receiver).unwrap_or(0);
            let mut found = false;
            for i in 0..len {
                if let Some(item) = s.index_get(receiver, i) {
                    if values_equal(s, &item, needle) {
                        found = true;
                        break;
                    }
                }
            }
            s.boolean(found)
        }
        _ => s.null(),
    }
}

fn find<S: ValueSystem>(s: &S, receiver: &S::Handle, needle: &S::Handle) -> S::Handle {
    match s.kind(receiver) {
        ValueKind::String => {
            let haystack = s.as_str(receiver).unwrap_or("");
            let needle = s.as_str(needle).unwrap_or("");
            match haystack.find(needle) {
                Some(byte_index) => s.number(byte_index as f64),
                None => s.number(-1.0),
            }
        }
        ValueKind::Array => {
            let len = s.length(receiver).unwrap_or(0);
            for i in 0..len {
                if let Some(item) = s.index_get(receiver, i) {
                    if values_equal(s, &item, needle) {
                        return s.number(i as f64);
                    }
                }
            }
            s.number(-1.0)
        }
        _ => s.null(),
    }
}

fn join<S: ValueSystem>(s: &S, receiver: &S::Handle, sep: &S::Handle) -> S::Handle {
    if s.kind(receiver) != ValueKind::Array {
        return s.null();
    }
    let sep = s.as_str(sep).unwrap_or("");
    let len = s.length(receiver).unwrap_or(0);
    let mut parts = Vec::with_capacity(len);
    for i in 0..len {
        if let Some(item) = s.index_get(receiver, i) {
            parts.push(s.as_str(&item).unwrap_or("").to_string());
        }
    }
    s.string(&parts.join(sep))
}

fn case_fold<S: ValueSystem>(s: &S, receiver: &S::Handle, fold: impl Fn(&str) -> String) -> S::Handle {
    match s.as_str(receiver) {
        Some(text) => s.string(&fold(text)),
        None => s.null(),
    }
}

fn numeric_unary<S: ValueSystem>(s: &S, receiver: &S::Handle, f: impl Fn(f64) -> f64) -> S::Handle {
    match s.as_number(receiver) {
        Some(n) => s.number(f(n)),
        None => s.null(),
    }
}

fn datetime<S: ValueSystem>(s: &S, receiver: &S::Handle, line: usize) -> LatticeResult<S::Handle> {
    match s.as_str(receiver) {
        Some(pattern) => {
            if pattern_has_invalid_specifier(pattern) {
                return Err(EvalError::InvalidDatetimePattern {
                    line,
                    pattern: pattern.to_string(),
                }
                .into());
            }
            Ok(s.string(&chrono::Local::now().format(pattern).to_string()))
        }
        None => Ok(s.null()),
    }
}

/// `chrono`'s `DelayedFormat` panics in `Display` (and thus `to_string()`)
/// when the format string contains an item it couldn't parse, so the
/// pattern must be validated before formatting (receiver data is
/// caller-supplied, not trusted).
fn pattern_has_invalid_specifier(pattern: &str) -> bool {
    chrono::format::StrftimeItems::new(pattern)
        .any(|item| matches!(item, chrono::format::Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_prefix_parses_leading_numeric_token() {
        assert_eq!(number_prefix("42abc"), 42.0);
        assert_eq!(number_prefix("  -3.5 apples"), -3.5);
        assert_eq!(number_prefix("1e3x"), 1000.0);
    }

    #[test]
    fn number_prefix_falls_back_to_zero() {
        assert_eq!(number_prefix("not a number"), 0.0);
        assert_eq!(number_prefix(""), 0.0);
    }
}
