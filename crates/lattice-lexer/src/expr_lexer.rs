//! The expression lexer (spec §4.B).
//!
//! Scans a single expression out of a byte stream, stopping at a
//! caller-supplied terminator sequence once bracket nesting returns to zero,
//! or at end of input if the terminator is `None` ("consume everything that
//! parses" — used when an expression occupies the rest of the source, which
//! this engine does not currently invoke but which the signature supports).

use crate::error::LexError;
use crate::token::{Lexeme, Token};
use lattice_core::LatticeResult;

pub struct ExprLexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> ExprLexer<'a> {
    pub fn new(src: &'a [u8], pos: usize, line: usize) -> Self {
        Self { src, pos, line }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Lex lexemes until the terminator is seen at bracket depth zero (or,
    /// if `terminator` is `None`, until end of input). Leaves `self.pos` at
    /// the first byte of the terminator (or at end of input); the caller
    /// consumes the terminator bytes itself.
    pub fn lex(&mut self, terminator: Option<&[u8]>) -> LatticeResult<Vec<Lexeme>> {
        let mut out = Vec::new();
        let mut depth: i32 = 0;

        loop {
            self.skip_trivia();

            if self.pos >= self.src.len() {
                break;
            }
            if depth == 0 {
                if let Some(term) = terminator {
                    if self.src[self.pos..].starts_with(term) {
                        break;
                    }
                }
            }

            let line = self.line;
            let token = self.next_token(&mut depth)?;
            out.push(Lexeme { token, line });
        }

        Ok(out)
    }

    fn skip_trivia(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn next_token(&mut self, depth: &mut i32) -> LatticeResult<Token> {
        let b = self.peek().expect("caller checked pos < len");

        match b {
            b'(' => {
                *depth += 1;
                self.pos += 1;
                Ok(Token::LParen)
            }
            b'[' => {
                *depth += 1;
                self.pos += 1;
                Ok(Token::LBracket)
            }
            b'{' => {
                *depth += 1;
                self.pos += 1;
                Ok(Token::LBrace)
            }
            b')' => {
                *depth -= 1;
                self.pos += 1;
                Ok(Token::RParen)
            }
            b']' => {
                *depth -= 1;
                self.pos += 1;
                Ok(Token::RBracket)
            }
            b'}' => {
                *depth -= 1;
                self.pos += 1;
                Ok(Token::RBrace)
            }
            b',' => {
                self.pos += 1;
                Ok(Token::Comma)
            }
            b':' => {
                self.pos += 1;
                Ok(Token::Colon)
            }
            b'@' => {
                self.pos += 1;
                Ok(Token::At)
            }
            b'?' => {
                self.pos += 1;
                Ok(Token::Question)
            }
            b'~' => {
                self.pos += 1;
                Ok(Token::Tilde)
            }
            b'^' => {
                self.pos += 1;
                Ok(Token::Caret)
            }
            b'|' => {
                if self.peek_at(1) == Some(b'|') {
                    self.pos += 2;
                    Ok(Token::OrOr)
                } else {
                    self.pos += 1;
                    Ok(Token::Pipe)
                }
            }
            b'&' => {
                if self.peek_at(1) == Some(b'&') {
                    self.pos += 2;
                    Ok(Token::AndAnd)
                } else {
                    self.pos += 1;
                    Ok(Token::Amp)
                }
            }
            b'=' => {
                // `==` and a bare `=` both lex as equality (spec §4.C).
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                } else {
                    self.pos += 1;
                }
                Ok(Token::EqEq)
            }
            b'!' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token::NotEq)
                } else {
                    self.pos += 1;
                    Ok(Token::Bang)
                }
            }
            b'>' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token::Gte)
                } else {
                    self.pos += 1;
                    Ok(Token::Gt)
                }
            }
            b'<' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token::Lte)
                } else {
                    self.pos += 1;
                    Ok(Token::Lt)
                }
            }
            b'+' => {
                self.pos += 1;
                Ok(Token::Plus)
            }
            b'-' => {
                self.pos += 1;
                Ok(Token::Minus)
            }
            b'*' => {
                if self.peek_at(1) == Some(b'*') {
                    self.pos += 2;
                    Ok(Token::StarStar)
                } else {
                    self.pos += 1;
                    Ok(Token::Star)
                }
            }
            b'/' => {
                if self.peek_at(1) == Some(b'/') {
                    self.pos += 2;
                    Ok(Token::SlashSlash)
                } else {
                    self.pos += 1;
                    Ok(Token::Slash)
                }
            }
            b'%' => {
                self.pos += 1;
                Ok(Token::Percent)
            }
            b'.' => {
                self.pos += 1;
                Ok(Token::Dot)
            }
            b'\'' | b'"' => self.lex_string(b),
            b'0'..=b'9' => self.lex_number(),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => Ok(self.lex_ident()),
            other => Err(LexError::UnexpectedByte {
                line: self.line,
                byte: other as char,
            }
            .into()),
        }
    }

    fn is_boundary(&self) -> bool {
        match self.peek() {
            None => true,
            Some(b) => {
                b.is_ascii_whitespace()
                    || matches!(
                        b,
                        b'(' | b')'
                            | b'['
                            | b']'
                            | b'{'
                            | b'}'
                            | b','
                            | b':'
                            | b'.'
                            | b'@'
                            | b'?'
                            | b'~'
                            | b'^'
                            | b'|'
                            | b'&'
                            | b'='
                            | b'!'
                            | b'>'
                            | b'<'
                            | b'+'
                            | b'-'
                            | b'*'
                            | b'/'
                            | b'%'
                    )
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1; // first char already validated by caller
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .expect("identifier bytes are ASCII")
            .to_string();
        match text.as_str() {
            "null" => Token::Null,
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            _ => Token::Ident(text),
        }
    }

    fn lex_number(&mut self) -> LatticeResult<Token> {
        let start = self.pos;
        let line = self.line;

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b' | b'B')) {
            return self.lex_radix(start, line, 2, |b| matches!(b, b'0' | b'1'));
        }
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'o' | b'O')) {
            return self.lex_radix(start, line, 8, |b| (b'0'..=b'7').contains(&b));
        }
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            return self.lex_radix(start, line, 16, |b| b.is_ascii_hexdigit());
        }

        let int_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let int_len = self.pos - int_start;
        if int_len > 1 && self.src[int_start] == b'0' {
            return Err(LexError::LeadingZeroDecimal { line }.into());
        }

        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.pos += 1; // '.'
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            let digits_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(LexError::EmptyExponent { line }.into());
            }
            let _ = mark;
        }

        if !self.is_boundary() {
            return Err(LexError::NumberNotAtBoundary { line }.into());
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("number bytes ASCII");
        let value: f64 = text.parse().map_err(|_| LexError::InvalidNumber {
            line,
            text: text.to_string(),
        })?;
        Ok(Token::Number(value))
    }

    fn lex_radix(
        &mut self,
        start: usize,
        line: usize,
        radix: u32,
        is_digit: impl Fn(u8) -> bool,
    ) -> LatticeResult<Token> {
        self.pos += 2; // prefix
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if is_digit(b)) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(LexError::MissingRadixDigits { line }.into());
        }
        if !self.is_boundary() {
            return Err(LexError::NumberNotAtBoundary { line }.into());
        }
        let digits =
            std::str::from_utf8(&self.src[digits_start..self.pos]).expect("digits are ASCII");
        // Spec: hex max is 0xFFFFFFFFFFFFFFFF interpreted mod 2^64.
        let value = u64::from_str_radix(digits, radix).unwrap_or_else(|_| {
            let mut acc: u128 = 0;
            for c in digits.chars() {
                let d = c.to_digit(radix).expect("validated by is_digit") as u128;
                acc = (acc * radix as u128 + d) % (1u128 << 64);
            }
            acc as u64
        });
        let _ = start;
        Ok(Token::Number(value as f64))
    }

    fn lex_string(&mut self, quote: u8) -> LatticeResult<Token> {
        let line = self.line;
        self.pos += 1; // opening quote
        let mut bytes = Vec::new();

        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { line }.into()),
                Some(b'\n') => return Err(LexError::UnterminatedString { line }.into()),
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let esc = self
                        .peek()
                        .ok_or(LexError::UnterminatedEscape { line })?;
                    match esc {
                        b'a' => {
                            bytes.push(0x07);
                            self.pos += 1;
                        }
                        b'b' => {
                            bytes.push(0x08);
                            self.pos += 1;
                        }
                        b'e' => {
                            bytes.push(0x1b);
                            self.pos += 1;
                        }
                        b'f' => {
                            bytes.push(0x0c);
                            self.pos += 1;
                        }
                        b'n' => {
                            bytes.push(b'\n');
                            self.pos += 1;
                        }
                        b'r' => {
                            bytes.push(b'\r');
                            self.pos += 1;
                        }
                        b't' => {
                            bytes.push(b'\t');
                            self.pos += 1;
                        }
                        b'v' => {
                            bytes.push(0x0b);
                            self.pos += 1;
                        }
                        b'\\' => {
                            bytes.push(b'\\');
                            self.pos += 1;
                        }
                        b'\'' => {
                            bytes.push(b'\'');
                            self.pos += 1;
                        }
                        b'"' => {
                            bytes.push(b'"');
                            self.pos += 1;
                        }
                        b'x' => {
                            self.pos += 1;
                            let hi = self.peek().and_then(|b| (b as char).to_digit(16));
                            let lo = self.peek_at(1).and_then(|b| (b as char).to_digit(16));
                            match (hi, lo) {
                                (Some(hi), Some(lo)) => {
                                    bytes.push((hi * 16 + lo) as u8);
                                    self.pos += 2;
                                }
                                _ => return Err(LexError::InvalidHexEscape { line }.into()),
                            }
                        }
                        other => {
                            return Err(LexError::UnknownEscape {
                                line,
                                escape: other as char,
                            }
                            .into())
                        }
                    }
                }
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }

        let text =
            String::from_utf8(bytes).map_err(|_| LexError::InvalidUtf8String { line })?;
        Ok(Token::Str(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str, terminator: Option<&str>) -> Vec<Token> {
        let bytes = src.as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let term = terminator.map(|t| t.as_bytes());
        lexer
            .lex(term)
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn lexes_literals() {
        assert_eq!(
            lex_all("null true false 1.5 'hi'", None),
            vec![
                Token::Null,
                Token::Bool(true),
                Token::Bool(false),
                Token::Number(1.5),
                Token::Str("hi".to_string())
            ]
        );
    }

    #[test]
    fn stops_at_terminator_outside_brackets() {
        let bytes = "1 + 2]rest".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let toks = lexer.lex(Some(b"]")).unwrap();
        assert_eq!(toks.len(), 3);
        assert_eq!(lexer.pos(), 5);
    }

    #[test]
    fn terminator_inside_brackets_does_not_stop() {
        let bytes = "[1, 2] + x:rest".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let toks = lexer.lex(Some(b":")).unwrap();
        // [ 1 , 2 ] + x  == 7 tokens
        assert_eq!(toks.len(), 7);
    }

    #[test]
    fn bases_parse() {
        assert_eq!(lex_all("0b101", None), vec![Token::Number(5.0)]);
        assert_eq!(lex_all("0o17", None), vec![Token::Number(15.0)]);
        assert_eq!(lex_all("0xFF", None), vec![Token::Number(255.0)]);
    }

    #[test]
    fn leading_zero_decimal_is_error() {
        let bytes = "0123".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        assert!(lexer.lex(None).is_err());
    }

    #[test]
    fn empty_exponent_is_error() {
        let bytes = "1e".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        assert!(lexer.lex(None).is_err());
    }

    #[test]
    fn escapes_and_hex_escape() {
        assert_eq!(
            lex_all(r#""a\tb\x41""#, None),
            vec![Token::Str("a\tbA".to_string())]
        );
    }

    #[test]
    fn single_equals_lexes_as_equality() {
        assert_eq!(lex_all("a = b", None).contains(&Token::EqEq), true);
    }

    #[test]
    fn newline_advances_line_counter() {
        let bytes = "1\n+\n2".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let lexemes = lexer.lex(None).unwrap();
        assert_eq!(lexemes[0].line, 1);
        assert_eq!(lexemes[1].line, 2);
        assert_eq!(lexemes[2].line, 3);
    }
}
