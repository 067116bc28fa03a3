//! Include resolution (spec §4.G).
//!
//! The four-case search/resolve behaviour table:
//!
//! | search path | resolve callback | behaviour |
//! |---|---|---|
//! | empty | none | read the identifier as a path relative to the CWD |
//! | non-empty | none | try each directory in order; first one that opens wins |
//! | — | some, search empty | call `resolve`; its return is a **path** to read |
//! | — | some, search non-empty | call `resolve`; its return is the **contents**, no filesystem access |
//!
//! A stack of resolved identifiers is threaded through nested includes so a
//! template that (directly or transitively) includes itself fails with a
//! named "recursive include" error instead of recursing forever.

use std::fs;
use std::path::Path;

use lattice_core::{CaseArm, CondArm, Directive, LatticeResult, Template};

use crate::error::IncludeError;
use crate::render::RenderOptions;

/// Parse and splice every `$<path>` include, recursively, into the
/// directive tree it names, detecting include cycles along the way.
pub fn resolve_includes(template: Template, opts: &RenderOptions) -> LatticeResult<Template> {
    let mut stack = Vec::new();
    let directives = resolve_body(template.directives, opts, &mut stack)?;
    Ok(Template { directives })
}

fn resolve_body(
    directives: Vec<Directive>,
    opts: &RenderOptions,
    stack: &mut Vec<String>,
) -> LatticeResult<Vec<Directive>> {
    directives
        .into_iter()
        .map(|d| resolve_directive(d, opts, stack))
        .collect()
}

fn resolve_directive(
    directive: Directive,
    opts: &RenderOptions,
    stack: &mut Vec<String>,
) -> LatticeResult<Directive> {
    match directive {
        Directive::Include { path, line, .. } => {
            tracing::debug!(path = %path, "resolving include");
            let (key, source) =
                resolve_source(opts, &path).map_err(|e| e.with_included_from(&path))?;
            if stack.contains(&key) {
                return Err(IncludeError::RecursiveInclude {
                    line,
                    identifier: key,
                }
                .into());
            }
            let nested = lattice_parser::parse_template(source.as_bytes())
                .map_err(|e| e.with_included_from(&path))?;
            stack.push(key);
            let body = resolve_body(nested.directives, opts, stack)
                .map_err(|e| e.with_included_from(&path))?;
            stack.pop();
            Ok(Directive::Include { path, body, line })
        }
        Directive::If {
            arms,
            else_body,
            line,
        } => {
            let arms = arms
                .into_iter()
                .map(|arm| -> LatticeResult<CondArm> {
                    Ok(CondArm {
                        cond: arm.cond,
                        body: resolve_body(arm.body, opts, stack)?,
                        line: arm.line,
                    })
                })
                .collect::<LatticeResult<Vec<_>>>()?;
            let else_body = match else_body {
                Some(body) => Some(resolve_body(body, opts, stack)?),
                None => None,
            };
            Ok(Directive::If {
                arms,
                else_body,
                line,
            })
        }
        Directive::Switch {
            discriminant,
            arms,
            line,
        } => {
            let arms = arms
                .into_iter()
                .map(|arm| -> LatticeResult<CaseArm> {
                    Ok(CaseArm {
                        case: arm.case,
                        body: resolve_body(arm.body, opts, stack)?,
                        line: arm.line,
                    })
                })
                .collect::<LatticeResult<Vec<_>>>()?;
            Ok(Directive::Switch {
                discriminant,
                arms,
                line,
            })
        }
        Directive::ForRange {
            var,
            low,
            high,
            inclusive,
            body,
            line,
        } => Ok(Directive::ForRange {
            var,
            low,
            high,
            inclusive,
            body: resolve_body(body, opts, stack)?,
            line,
        }),
        Directive::ForIter {
            var,
            iterable,
            body,
            line,
        } => Ok(Directive::ForIter {
            var,
            iterable,
            body: resolve_body(body, opts, stack)?,
            line,
        }),
        Directive::With { expr, body, line } => Ok(Directive::With {
            expr,
            body: resolve_body(body, opts, stack)?,
            line,
        }),
        leaf @ (Directive::Span { .. } | Directive::SubEsc { .. } | Directive::SubRaw { .. }) => {
            Ok(leaf)
        }
    }
}

/// Resolves an include identifier to a cycle-detection key and its source
/// contents. The key is the resolved filesystem path when one exists
/// (spec §4.G: a stack of resolved paths catches cycles that differing
/// identifiers resolving to the same file would otherwise miss), and falls
/// back to the identifier itself when no path concept applies.
fn resolve_source(opts: &RenderOptions, identifier: &str) -> LatticeResult<(String, String)> {
    if let Some(resolve) = &opts.resolve {
        let result = resolve(identifier)?;
        if opts.search_path.is_empty() {
            let contents = read_file(&result)?;
            Ok((result, contents))
        } else {
            Ok((identifier.to_string(), result))
        }
    } else if opts.search_path.is_empty() {
        let contents = read_file(identifier)?;
        Ok((identifier.to_string(), contents))
    } else {
        for dir in &opts.search_path {
            let candidate = Path::new(dir).join(identifier);
            if let Ok(contents) = fs::read_to_string(&candidate) {
                return Ok((candidate.to_string_lossy().into_owned(), contents));
            }
        }
        Err(IncludeError::NotFoundInSearchPath {
            identifier: identifier.to_string(),
        }
        .into())
    }
}

fn read_file(path: &str) -> LatticeResult<String> {
    fs::read_to_string(path)
        .map_err(|source| {
            IncludeError::Io {
                path: path.to_string(),
                source,
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_template(src: &str) -> Template {
        lattice_parser::parse_template(src.as_bytes()).unwrap()
    }

    #[test]
    fn resolve_callback_without_search_path_is_a_path() {
        let tmp = std::env::temp_dir().join("lattice_include_path_test.tmpl");
        std::fs::write(&tmp, "hello from file").unwrap();
        let path_str = tmp.to_string_lossy().to_string();
        let opts = RenderOptions::default().with_resolve(move |_id: &str| Ok(path_str.clone()));
        let template = only_template("$<greeting>");
        let resolved = resolve_includes(template, &opts).unwrap();
        match &resolved.directives[0] {
            Directive::Include { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(&body[0], Directive::Span { text, .. } if text == "hello from file"));
            }
            other => panic!("expected Include, got {other:?}"),
        }
        std::fs::remove_file(tmp).ok();
    }

    #[test]
    fn resolve_callback_with_search_path_is_contents_directly() {
        let opts = RenderOptions::default()
            .with_search_path(["ignored".to_string()])
            .with_resolve(|_id: &str| Ok("inline contents".to_string()));
        let template = only_template("$<greeting>");
        let resolved = resolve_includes(template, &opts).unwrap();
        match &resolved.directives[0] {
            Directive::Include { body, .. } => {
                assert!(matches!(&body[0], Directive::Span { text, .. } if text == "inline contents"));
            }
            other => panic!("expected Include, got {other:?}"),
        }
    }

    #[test]
    fn direct_self_include_is_a_recursive_include_error() {
        let opts =
            RenderOptions::default().with_resolve(|_id: &str| Ok("$<self>".to_string()));
        let opts = RenderOptions {
            search_path: vec!["x".to_string()],
            ..opts
        };
        let template = only_template("$<self>");
        let err = resolve_includes(template, &opts).unwrap_err();
        assert_eq!(err.kind, lattice_core::ErrorKind::Include);
        assert!(err.message.contains("recursive include"));
    }

    #[test]
    fn missing_file_with_no_search_path_is_an_io_error() {
        let opts = RenderOptions::default();
        let template = only_template("$<definitely-does-not-exist.tmpl>");
        let err = resolve_includes(template, &opts).unwrap_err();
        assert_eq!(err.kind, lattice_core::ErrorKind::Io);
    }
}
