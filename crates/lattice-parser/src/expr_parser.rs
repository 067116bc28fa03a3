//! Recursive-descent, precedence-climbing expression parser (spec §4.C).
//!
//! Grammar, highest to lowest precedence: primary, call (postfix `.ident`,
//! `.ident(args)`, `[i]`, `[i, j]`), unary, six left-associative binary
//! levels, ternary. `&&` and `||` share one precedence level per the spec
//! (not the conventional split where `&&` binds tighter).

use crate::error::ParseError;
use lattice_core::{BinOp, Expr, LatticeResult, UnOp};
use lattice_lexer::{Lexeme, Token};

pub fn parse_tokens(lexemes: Vec<Lexeme>) -> LatticeResult<Expr> {
    Parser::new(lexemes).parse()
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    fn new(lexemes: Vec<Lexeme>) -> Self {
        Self { lexemes, pos: 0 }
    }

    fn parse(mut self) -> LatticeResult<Expr> {
        let expr = self.parse_expr()?;
        if self.pos != self.lexemes.len() {
            return Err(ParseError::ExtraTokens {
                line: self.current_line(),
            }
            .into());
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.lexemes.get(self.pos).map(|l| &l.token)
    }

    fn peek_is(&self, t: &Token) -> bool {
        self.peek() == Some(t)
    }

    fn current_line(&self) -> usize {
        self.lexemes
            .get(self.pos)
            .or_else(|| self.lexemes.last())
            .map(|l| l.line)
            .unwrap_or(1)
    }

    fn expect(&mut self, want: Token, what: &str) -> LatticeResult<()> {
        if self.peek_is(&want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::Expected {
                line: self.current_line(),
                what: what.to_string(),
            }
            .into())
        }
    }

    fn expect_ident(&mut self) -> LatticeResult<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(ParseError::ExpectedIdentAfterDot {
                line: self.current_line(),
            }
            .into()),
        }
    }

    /// Top of the grammar: ternary, which is the "expr" nonterminal used
    /// everywhere a sub-expression is required (array items, object
    /// entries, call args, index operands, parenthesized expressions).
    fn parse_expr(&mut self) -> LatticeResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> LatticeResult<Expr> {
        let cond = self.parse_logical()?;
        if self.peek_is(&Token::Question) {
            let line = self.current_line();
            self.pos += 1;
            let if_true = self.parse_logical()?;
            self.expect(Token::Colon, "':' in ternary expression")?;
            let if_false = self.parse_logical()?;
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
                line,
            })
        } else {
            Ok(cond)
        }
    }

    // level 1 (lowest): `&&` and `||`, same precedence, left-associative.
    fn parse_logical(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::AndAnd) => BinOp::And,
                Some(Token::OrOr) => BinOp::Or,
                _ => break,
            };
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    // level 2: equality and ordering.
    fn parse_comparison(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_bitwise()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Neq,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Lte) => BinOp::Lte,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Gte) => BinOp::Gte,
                _ => break,
            };
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_bitwise()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    // level 3: bitwise.
    fn parse_bitwise(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Amp) => BinOp::BitAnd,
                Some(Token::Pipe) => BinOp::BitOr,
                Some(Token::Caret) => BinOp::BitXor,
                _ => break,
            };
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    // level 4: additive.
    fn parse_additive(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    // level 5: multiplicative.
    fn parse_multiplicative(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_exponent()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::SlashSlash) => BinOp::Quot,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_exponent()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    // level 6 (highest binary level): exponent. Left-associative per spec,
    // so `a ** b ** c` is `(a ** b) ** c`.
    fn parse_exponent(&mut self) -> LatticeResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.peek_is(&Token::StarStar) {
            let line = self.current_line();
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op: BinOp::Exp,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> LatticeResult<Expr> {
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnOp::Pos),
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Bang) => Some(UnOp::Not),
            Some(Token::Tilde) => Some(UnOp::Comp),
            _ => None,
        };
        match op {
            Some(op) => {
                let line = self.current_line();
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    line,
                })
            }
            None => self.parse_call(),
        }
    }

    fn parse_call(&mut self) -> LatticeResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    let line = self.current_line();
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    if self.peek_is(&Token::LParen) {
                        self.pos += 1;
                        let args = self.parse_args()?;
                        expr = Expr::Method {
                            object: Box::new(expr),
                            name,
                            args,
                            line,
                        };
                    } else {
                        expr = Expr::Lookup {
                            object: Box::new(expr),
                            name,
                            line,
                        };
                    }
                }
                Some(Token::LBracket) => {
                    let line = self.current_line();
                    self.pos += 1;
                    let first = self.parse_expr()?;
                    if self.peek_is(&Token::Comma) {
                        self.pos += 1;
                        let second = self.parse_expr()?;
                        self.expect(Token::RBracket, "']' to close index range")?;
                        expr = Expr::IndexRange {
                            collection: Box::new(expr),
                            start: Box::new(first),
                            end: Box::new(second),
                            line,
                        };
                    } else {
                        self.expect(Token::RBracket, "']' to close index")?;
                        expr = Expr::Index {
                            collection: Box::new(expr),
                            index: Box::new(first),
                            line,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> LatticeResult<Expr> {
        let line = self.current_line();
        match self.peek().cloned() {
            Some(Token::Null) => {
                self.pos += 1;
                Ok(Expr::Null { line })
            }
            Some(Token::Bool(value)) => {
                self.pos += 1;
                Ok(Expr::Bool { value, line })
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number { value, line })
            }
            Some(Token::Str(value)) => {
                self.pos += 1;
                Ok(Expr::Str { value, line })
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Ident { name, line })
            }
            Some(Token::At) => {
                self.pos += 1;
                Ok(Expr::Root { line })
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')' to close parenthesized expression")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                self.parse_array(line)
            }
            Some(Token::LBrace) => {
                self.pos += 1;
                self.parse_object(line)
            }
            Some(other) => Err(ParseError::ExpectedExpression {
                line,
                found: other.describe().to_string(),
            }
            .into()),
            None => Err(ParseError::UnexpectedEndOfExpression { line }.into()),
        }
    }

    fn parse_array(&mut self, line: usize) -> LatticeResult<Expr> {
        let mut items = Vec::new();
        if !self.peek_is(&Token::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if self.peek_is(&Token::Comma) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RBracket, "']' to close array literal")?;
        Ok(Expr::Array { items, line })
    }

    fn parse_object(&mut self, line: usize) -> LatticeResult<Expr> {
        let mut entries = Vec::new();
        if !self.peek_is(&Token::RBrace) {
            loop {
                let key = self.parse_expr()?;
                self.expect(Token::Colon, "':' in object literal")?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if self.peek_is(&Token::Comma) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RBrace, "'}' to close object literal")?;
        Ok(Expr::Object { entries, line })
    }

    fn parse_args(&mut self) -> LatticeResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.peek_is(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.peek_is(&Token::Comma) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen, "')' to close argument list")?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_lexer::ExprLexer;

    fn parse(src: &str) -> Expr {
        let bytes = src.as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let lexemes = lexer.lex(None).unwrap();
        parse_tokens(lexemes).unwrap()
    }

    #[test]
    fn parses_literal() {
        assert!(matches!(parse("42"), Expr::Number { value, .. } if value == 42.0));
    }

    #[test]
    fn and_or_share_precedence_left_to_right() {
        // a || b && c  ==  (a || b) && c given shared precedence.
        let expr = parse("a || b && c");
        match expr {
            Expr::Binary { op: BinOp::And, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { op: BinOp::Or, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn exponent_is_left_associative() {
        let expr = parse("a ** b ** c");
        match expr {
            Expr::Binary { op: BinOp::Exp, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { op: BinOp::Exp, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn call_chain_distinguishes_lookup_method_and_index() {
        let expr = parse("a.b.c(1, 2)[0]");
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn index_range_two_args() {
        let expr = parse("a[1, 2]");
        assert!(matches!(expr, Expr::IndexRange { .. }));
    }

    #[test]
    fn ternary_binds_loosest() {
        let expr = parse("a ? b : c");
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn single_equals_is_equality() {
        let expr = parse("a = b");
        assert!(matches!(expr, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn extra_tokens_is_an_error() {
        let bytes = "1 2".as_bytes();
        let mut lexer = ExprLexer::new(bytes, 0, 1);
        let lexemes = lexer.lex(None).unwrap();
        assert!(parse_tokens(lexemes).is_err());
    }

    #[test]
    fn object_literal_with_expr_keys() {
        let expr = parse("{'a': 1, 'b': 2}");
        assert!(matches!(expr, Expr::Object { .. }));
    }
}
