//! Flat directive stream → directive tree (spec §4.F).
//!
//! Per spec §9's recommended design, `if`/`elif`/`else` are grouped into one
//! `Directive::If` node instead of being linked siblings, and `switch`
//! adopts only `case`/`default` children directly rather than through a
//! generic block.

use crate::error::ParseError;
use crate::expr_parser::parse_tokens;
use lattice_core::{Binding, CaseArm, CondArm, Directive, LatticeResult, Template};
use lattice_lexer::RawDirective;

pub fn build(raw: Vec<RawDirective>) -> LatticeResult<Template> {
    let mut cursor = Cursor {
        items: raw,
        pos: 0,
        last_line: 1,
    };
    let directives = cursor.parse_block()?;
    match cursor.peek() {
        None => Ok(Template { directives }),
        Some(other) => Err(ParseError::StrayDirective {
            line: raw_line(other),
            kind: describe_raw(other).to_string(),
        }
        .into()),
    }
}

struct Cursor {
    items: Vec<RawDirective>,
    pos: usize,
    last_line: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&RawDirective> {
        self.items.get(self.pos)
    }

    fn bump(&mut self) -> RawDirective {
        let item = self.items[self.pos].clone();
        self.last_line = raw_line(&item);
        self.pos += 1;
        item
    }

    /// Collects directives until a sentinel (`end`, `elif`, `else`, `case`,
    /// `default`) or end-of-input. Does not consume or judge the sentinel —
    /// that is the caller's job, since what is or isn't a valid sentinel
    /// depends on which opener this block belongs to.
    fn parse_block(&mut self) -> LatticeResult<Vec<Directive>> {
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None
                | Some(RawDirective::End { .. })
                | Some(RawDirective::Elif { .. })
                | Some(RawDirective::Else { .. })
                | Some(RawDirective::Case { .. })
                | Some(RawDirective::Default { .. }) => break,
                _ => out.push(self.parse_one()?),
            }
        }
        Ok(out)
    }

    fn parse_one(&mut self) -> LatticeResult<Directive> {
        match self.bump() {
            RawDirective::Span { text, line } => Ok(Directive::Span { text, line }),
            RawDirective::SubEsc { expr, line } => Ok(Directive::SubEsc {
                expr: parse_tokens(expr)?,
                line,
            }),
            RawDirective::SubRaw { expr, line } => Ok(Directive::SubRaw {
                expr: parse_tokens(expr)?,
                line,
            }),
            RawDirective::Include { path, line } => Ok(Directive::Include {
                path,
                body: Vec::new(),
                line,
            }),
            RawDirective::If { cond, line } => self.parse_if_chain(cond, line),
            RawDirective::Switch { discriminant, line } => self.parse_switch(discriminant, line),
            RawDirective::ForRangeExc { var, low, high, line } => {
                let low = parse_tokens(low)?;
                let high = parse_tokens(high)?;
                let body = self.parse_block()?;
                self.expect_end()?;
                Ok(Directive::ForRange {
                    var: Binding::from_source(&var),
                    low,
                    high,
                    inclusive: false,
                    body,
                    line,
                })
            }
            RawDirective::ForRangeInc { var, low, high, line } => {
                let low = parse_tokens(low)?;
                let high = parse_tokens(high)?;
                let body = self.parse_block()?;
                self.expect_end()?;
                Ok(Directive::ForRange {
                    var: Binding::from_source(&var),
                    low,
                    high,
                    inclusive: true,
                    body,
                    line,
                })
            }
            RawDirective::ForIter { var, iterable, line } => {
                let iterable = parse_tokens(iterable)?;
                let body = self.parse_block()?;
                self.expect_end()?;
                Ok(Directive::ForIter {
                    var: Binding::from_source(&var),
                    iterable,
                    body,
                    line,
                })
            }
            RawDirective::With { expr, line } => {
                let expr = parse_tokens(expr)?;
                let body = self.parse_block()?;
                self.expect_end()?;
                Ok(Directive::With { expr, body, line })
            }
            RawDirective::End { .. }
            | RawDirective::Elif { .. }
            | RawDirective::Else { .. }
            | RawDirective::Case { .. }
            | RawDirective::Default { .. } => {
                unreachable!("parse_block filters out sentinel directives before calling parse_one")
            }
        }
    }

    fn parse_if_chain(&mut self, cond: Vec<lattice_lexer::Lexeme>, line: usize) -> LatticeResult<Directive> {
        let mut arms = Vec::new();
        let first_cond = parse_tokens(cond)?;
        let first_body = self.parse_block()?;
        arms.push(CondArm {
            cond: first_cond,
            body: first_body,
            line,
        });

        loop {
            match self.peek() {
                Some(RawDirective::Elif { .. }) => {
                    if let RawDirective::Elif { cond, line } = self.bump() {
                        let cond = parse_tokens(cond)?;
                        let body = self.parse_block()?;
                        arms.push(CondArm { cond, body, line });
                    }
                }
                _ => break,
            }
        }

        let else_body = if matches!(self.peek(), Some(RawDirective::Else { .. })) {
            self.bump();
            Some(self.parse_block()?)
        } else {
            None
        };

        self.expect_end()?;
        Ok(Directive::If {
            arms,
            else_body,
            line,
        })
    }

    fn parse_switch(&mut self, discriminant: Vec<lattice_lexer::Lexeme>, line: usize) -> LatticeResult<Directive> {
        let discriminant = parse_tokens(discriminant)?;
        let mut arms = Vec::new();
        let mut seen_default = false;

        loop {
            match self.peek() {
                Some(RawDirective::Case { .. }) => {
                    if seen_default {
                        return Err(ParseError::CaseAfterDefault {
                            line: self.peek().map(raw_line).unwrap_or(line),
                        }
                        .into());
                    }
                    if let RawDirective::Case { expr, line } = self.bump() {
                        let expr = parse_tokens(expr)?;
                        let body = self.parse_block()?;
                        arms.push(CaseArm {
                            case: Some(expr),
                            body,
                            line,
                        });
                    }
                }
                Some(RawDirective::Default { .. }) => {
                    if seen_default {
                        return Err(ParseError::MultipleDefaults {
                            line: self.peek().map(raw_line).unwrap_or(line),
                        }
                        .into());
                    }
                    seen_default = true;
                    if let RawDirective::Default { line } = self.bump() {
                        let body = self.parse_block()?;
                        arms.push(CaseArm {
                            case: None,
                            body,
                            line,
                        });
                    }
                }
                _ => break,
            }
        }

        self.expect_end()?;
        Ok(Directive::Switch {
            discriminant,
            arms,
            line,
        })
    }

    fn expect_end(&mut self) -> LatticeResult<()> {
        match self.peek() {
            Some(RawDirective::End { .. }) => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(ParseError::ExpectedEnd {
                line: raw_line(other),
                found: describe_raw(other).to_string(),
            }
            .into()),
            None => Err(ParseError::UnclosedBlock {
                line: self.last_line,
            }
            .into()),
        }
    }
}

fn raw_line(raw: &RawDirective) -> usize {
    match raw {
        RawDirective::Span { line, .. }
        | RawDirective::SubEsc { line, .. }
        | RawDirective::SubRaw { line, .. }
        | RawDirective::Include { line, .. }
        | RawDirective::If { line, .. }
        | RawDirective::Elif { line, .. }
        | RawDirective::Else { line }
        | RawDirective::Switch { line, .. }
        | RawDirective::Case { line, .. }
        | RawDirective::Default { line }
        | RawDirective::ForRangeExc { line, .. }
        | RawDirective::ForRangeInc { line, .. }
        | RawDirective::ForIter { line, .. }
        | RawDirective::With { line, .. }
        | RawDirective::End { line } => *line,
    }
}

fn describe_raw(raw: &RawDirective) -> &'static str {
    match raw {
        RawDirective::Span { .. } => "span",
        RawDirective::SubEsc { .. } => "sub_esc",
        RawDirective::SubRaw { .. } => "sub_raw",
        RawDirective::Include { .. } => "include",
        RawDirective::If { .. } => "if",
        RawDirective::Elif { .. } => "elif",
        RawDirective::Else { .. } => "else",
        RawDirective::Switch { .. } => "switch",
        RawDirective::Case { .. } => "case",
        RawDirective::Default { .. } => "default",
        RawDirective::ForRangeExc { .. } | RawDirective::ForRangeInc { .. } | RawDirective::ForIter { .. } => "for",
        RawDirective::With { .. } => "with",
        RawDirective::End { .. } => "end",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_lexer::tokenize;

    fn build_str(src: &str) -> Template {
        build(tokenize(src.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn if_elif_else_groups_into_one_node() {
        let tmpl = build_str("$if n > 0:pos$elif n < 0:neg$else:zero$end");
        assert_eq!(tmpl.directives.len(), 1);
        match &tmpl.directives[0] {
            Directive::If { arms, else_body, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn switch_collects_case_and_default() {
        let tmpl = build_str("$switch n:$case 1:one$case 2:two$default:other$end");
        match &tmpl.directives[0] {
            Directive::Switch { arms, .. } => {
                assert_eq!(arms.len(), 3);
                assert!(arms[2].case.is_none());
            }
            other => panic!("expected Switch, got {other:?}"),
        }
    }

    #[test]
    fn case_after_default_is_an_error() {
        let raw = tokenize(b"$switch n:$default:x$case 1:y$end").unwrap();
        assert!(build(raw).is_err());
    }

    #[test]
    fn for_range_and_with_nest_children() {
        let tmpl = build_str("$for i from 1..=3:${i}$end");
        match &tmpl.directives[0] {
            Directive::ForRange { inclusive, body, .. } => {
                assert!(inclusive);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected ForRange, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let raw = tokenize(b"$if n > 0:pos").unwrap();
        assert!(build(raw).is_err());
    }

    #[test]
    fn stray_end_at_top_level_is_an_error() {
        let raw = tokenize(b"hello$end").unwrap();
        assert!(build(raw).is_err());
    }

    #[test]
    fn stray_elif_is_an_error() {
        let raw = tokenize(b"$elif n > 0:pos$end").unwrap();
        assert!(build(raw).is_err());
    }

    #[test]
    fn include_body_starts_empty() {
        let tmpl = build_str("$<partial.tmpl>");
        match &tmpl.directives[0] {
            Directive::Include { body, .. } => assert!(body.is_empty()),
            other => panic!("expected Include, got {other:?}"),
        }
    }
}
