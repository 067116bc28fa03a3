//! The template tokenizer (spec §4.E).
//!
//! Splits a template source into a flat stream of directive tokens. Control
//! directives keep their inner expressions as unparsed lexeme streams —
//! turning those into AST nodes, and turning the flat stream into a tree, is
//! `lattice-parser`'s job (components C and F). This keeps the dependency
//! direction one-way: lexer has no knowledge of the parser.

use crate::error::LexError;
use crate::expr_lexer::ExprLexer;
use crate::token::Lexeme;
use lattice_core::LatticeResult;

/// One flat directive, as emitted by the tokenizer, before block-building.
/// Mirrors spec §3's "directive token" record: a tag, a line, and (per tag)
/// up to two unparsed expressions and/or an identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDirective {
    Span {
        text: String,
        line: usize,
    },
    SubEsc {
        expr: Vec<Lexeme>,
        line: usize,
    },
    SubRaw {
        expr: Vec<Lexeme>,
        line: usize,
    },
    Include {
        path: String,
        line: usize,
    },
    If {
        cond: Vec<Lexeme>,
        line: usize,
    },
    Elif {
        cond: Vec<Lexeme>,
        line: usize,
    },
    Else {
        line: usize,
    },
    Switch {
        discriminant: Vec<Lexeme>,
        line: usize,
    },
    Case {
        expr: Vec<Lexeme>,
        line: usize,
    },
    Default {
        line: usize,
    },
    ForRangeExc {
        var: String,
        low: Vec<Lexeme>,
        high: Vec<Lexeme>,
        line: usize,
    },
    ForRangeInc {
        var: String,
        low: Vec<Lexeme>,
        high: Vec<Lexeme>,
        line: usize,
    },
    ForIter {
        var: String,
        iterable: Vec<Lexeme>,
        line: usize,
    },
    With {
        expr: Vec<Lexeme>,
        line: usize,
    },
    End {
        line: usize,
    },
}

pub fn tokenize(src: &[u8]) -> LatticeResult<Vec<RawDirective>> {
    TemplateLexer::new(src).tokenize()
}

struct TemplateLexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> TemplateLexer<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    fn tokenize(mut self) -> LatticeResult<Vec<RawDirective>> {
        let mut out = Vec::new();
        let mut pending = String::new();
        let mut span_line = self.line;

        while let Some(&b) = self.src.get(self.pos) {
            if b != b'$' {
                if pending.is_empty() {
                    span_line = self.line;
                }
                if b == b'\n' {
                    self.line += 1;
                }
                // Template source is ASCII-clean (spec §6); one byte is one
                // character.
                pending.push(b as char);
                self.pos += 1;
                continue;
            }

            self.pos += 1; // consume '$'
            match self.src.get(self.pos).copied() {
                Some(b'$') => {
                    if pending.is_empty() {
                        span_line = self.line;
                    }
                    pending.push('$');
                    self.pos += 1;
                }
                Some(b'(') => {
                    self.pos += 1;
                    flush_span(&mut pending, span_line, &mut out);
                    self.skip_comment()?;
                    span_line = self.line;
                }
                Some(b'[') => {
                    self.pos += 1;
                    flush_span(&mut pending, span_line, &mut out);
                    let line = self.line;
                    let expr = self.lex_expr(b"]")?;
                    self.expect_byte(b']')?;
                    out.push(RawDirective::SubEsc { expr, line });
                    span_line = self.line;
                }
                Some(b'{') => {
                    self.pos += 1;
                    flush_span(&mut pending, span_line, &mut out);
                    let line = self.line;
                    let expr = self.lex_expr(b"}")?;
                    self.expect_byte(b'}')?;
                    out.push(RawDirective::SubRaw { expr, line });
                    span_line = self.line;
                }
                Some(b'<') => {
                    self.pos += 1;
                    flush_span(&mut pending, span_line, &mut out);
                    let line = self.line;
                    let path = self.scan_until_gt()?;
                    out.push(RawDirective::Include { path, line });
                    span_line = self.line;
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    flush_span(&mut pending, span_line, &mut out);
                    let line = self.line;
                    let word = self.scan_keyword_word();
                    out.push(self.build_keyword_directive(&word, line)?);
                    span_line = self.line;
                }
                Some(other) => {
                    return Err(LexError::UnrecognizedIntroducer {
                        line: self.line,
                        introducer: other as char,
                    }
                    .into())
                }
                None => return Err(LexError::UnterminatedDollar { line: self.line }.into()),
            }
        }

        flush_span(&mut pending, span_line, &mut out);
        Ok(out)
    }

    fn skip_comment(&mut self) -> LatticeResult<()> {
        loop {
            match self.src.get(self.pos).copied() {
                None => return Err(LexError::UnterminatedComment { line: self.line }.into()),
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(b')') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_until_gt(&mut self) -> LatticeResult<String> {
        let start = self.pos;
        loop {
            match self.src.get(self.pos).copied() {
                None => return Err(LexError::UnterminatedInclude { line: self.line }.into()),
                Some(b'>') => {
                    let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                    self.pos += 1;
                    return Ok(text);
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_ws(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn scan_keyword_word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.src.get(self.pos), Some(b) if b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn scan_identifier(&mut self) -> LatticeResult<String> {
        self.skip_ws();
        let start = self.pos;
        match self.src.get(self.pos).copied() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.pos += 1,
            _ => return Err(LexError::ExpectedLoopVariable { line: self.line }.into()),
        }
        while matches!(self.src.get(self.pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'_') {
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn lex_expr(&mut self, terminator: &[u8]) -> LatticeResult<Vec<Lexeme>> {
        let mut lexer = ExprLexer::new(self.src, self.pos, self.line);
        let lexemes = lexer.lex(Some(terminator))?;
        self.pos = lexer.pos();
        self.line = lexer.line();
        Ok(lexemes)
    }

    fn expect_byte(&mut self, b: u8) -> LatticeResult<()> {
        if self.src.get(self.pos).copied() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(LexError::ExpectedByte {
                line: self.line,
                expected: b as char,
            }
            .into())
        }
    }

    fn expect_bytes(&mut self, seq: &[u8]) -> LatticeResult<()> {
        if self.src[self.pos..].starts_with(seq) {
            self.pos += seq.len();
            Ok(())
        } else {
            Err(LexError::ExpectedSequence {
                line: self.line,
                expected: String::from_utf8_lossy(seq).into_owned(),
            }
            .into())
        }
    }

    fn build_keyword_directive(&mut self, word: &str, line: usize) -> LatticeResult<RawDirective> {
        match word {
            "if" => {
                let cond = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::If { cond, line })
            }
            "elif" => {
                let cond = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::Elif { cond, line })
            }
            "else" => {
                self.skip_ws();
                self.expect_byte(b':')?;
                Ok(RawDirective::Else { line })
            }
            "switch" => {
                let discriminant = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::Switch { discriminant, line })
            }
            "case" => {
                let expr = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::Case { expr, line })
            }
            "default" => {
                self.skip_ws();
                self.expect_byte(b':')?;
                Ok(RawDirective::Default { line })
            }
            "with" => {
                let expr = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::With { expr, line })
            }
            "end" => Ok(RawDirective::End { line }),
            "for" => self.build_for_directive(line),
            other => Err(LexError::UnknownKeyword {
                line,
                keyword: other.to_string(),
            }
            .into()),
        }
    }

    fn build_for_directive(&mut self, line: usize) -> LatticeResult<RawDirective> {
        let var = self.scan_identifier()?;
        let kw = self.scan_keyword_word();
        match kw.as_str() {
            "from" => {
                let low = self.lex_expr(b"..")?;
                self.expect_bytes(b"..")?;
                let inclusive = if self.src.get(self.pos).copied() == Some(b'=') {
                    self.pos += 1;
                    true
                } else {
                    false
                };
                let high = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                if inclusive {
                    Ok(RawDirective::ForRangeInc { var, low, high, line })
                } else {
                    Ok(RawDirective::ForRangeExc { var, low, high, line })
                }
            }
            "in" => {
                let iterable = self.lex_expr(b":")?;
                self.expect_byte(b':')?;
                Ok(RawDirective::ForIter { var, iterable, line })
            }
            other => Err(LexError::ExpectedForKeyword {
                line,
                found: other.to_string(),
            }
            .into()),
        }
    }
}

fn flush_span(pending: &mut String, line: usize, out: &mut Vec<RawDirective>) {
    if !pending.is_empty() {
        out.push(RawDirective::Span {
            text: std::mem::take(pending),
            line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn toks(d: &RawDirective) -> Option<&Vec<Lexeme>> {
        match d {
            RawDirective::SubEsc { expr, .. }
            | RawDirective::SubRaw { expr, .. }
            | RawDirective::If { cond: expr, .. }
            | RawDirective::Switch {
                discriminant: expr, ..
            }
            | RawDirective::Case { expr, .. }
            | RawDirective::With { expr, .. } => Some(expr),
            _ => None,
        }
    }

    #[test]
    fn literal_dollar_escape() {
        let out = tokenize(b"cost: $$5").unwrap();
        assert_eq!(
            out,
            vec![RawDirective::Span {
                text: "cost: $5".to_string(),
                line: 1
            }]
        );
    }

    #[test]
    fn sub_esc_and_sub_raw() {
        let out = tokenize(b"$[name] and ${name}").unwrap();
        assert_eq!(out.len(), 3);
        assert!(matches!(out[0], RawDirective::SubEsc { .. }));
        assert!(matches!(out[2], RawDirective::SubRaw { .. }));
    }

    #[test]
    fn comment_is_dropped() {
        let out = tokenize(b"a$(this is a comment)b").unwrap();
        assert_eq!(
            out,
            vec![RawDirective::Span {
                text: "ab".to_string(),
                line: 1
            }]
        );
    }

    #[test]
    fn unterminated_comment_errors() {
        assert!(tokenize(b"$(oops").is_err());
    }

    #[test]
    fn include_path_is_literal() {
        let out = tokenize(b"$<partials/header.tmpl>").unwrap();
        match &out[0] {
            RawDirective::Include { path, .. } => assert_eq!(path, "partials/header.tmpl"),
            _ => panic!("expected include"),
        }
    }

    #[test]
    fn if_elif_else_end() {
        let out = tokenize(b"$if n > 0:pos$elif n < 0:neg$else:zero$end").unwrap();
        assert!(matches!(out[0], RawDirective::If { .. }));
        assert!(matches!(out[2], RawDirective::Elif { .. }));
        assert!(matches!(out[4], RawDirective::Else { .. }));
        assert!(matches!(out[6], RawDirective::End { .. }));
        let cond = toks(&out[0]).unwrap();
        assert_eq!(cond[0].token, Token::Ident("n".to_string()));
    }

    #[test]
    fn for_range_exclusive_and_inclusive() {
        let exc = tokenize(b"$for i from 1..3:x$end").unwrap();
        assert!(matches!(exc[0], RawDirective::ForRangeExc { .. }));

        let inc = tokenize(b"$for i from 1..=3:x$end").unwrap();
        assert!(matches!(inc[0], RawDirective::ForRangeInc { .. }));
    }

    #[test]
    fn for_iter_over_root() {
        let out = tokenize(b"$for k in @:${k}$end").unwrap();
        match &out[0] {
            RawDirective::ForIter { var, .. } => assert_eq!(var, "k"),
            _ => panic!("expected for_iter"),
        }
    }

    #[test]
    fn switch_case_default() {
        let out = tokenize(b"$switch n:$case 1:one$default:other$end").unwrap();
        assert!(matches!(out[0], RawDirective::Switch { .. }));
        assert!(matches!(out[1], RawDirective::Case { .. }));
        assert!(matches!(out[3], RawDirective::Default { .. }));
    }

    #[test]
    fn with_rebind() {
        let out = tokenize(b"$with user:${name}$end").unwrap();
        assert!(matches!(out[0], RawDirective::With { .. }));
    }

    #[test]
    fn newline_inside_comment_advances_line() {
        let out = tokenize(b"$(line one\nline two)$[x]").unwrap();
        match &out[0] {
            RawDirective::SubEsc { line, .. } => assert_eq!(*line, 2),
            _ => panic!("expected sub_esc"),
        }
    }
}
