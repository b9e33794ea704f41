//! Lexer and parser for the script language.

use crate::repl::error::{CompileError, CompileResult};

use super::ast::{BinOp, Expr, Stmt, UnaryOp};

/// Parse source text into a statement list.
///
/// Statements are separated by newlines or semicolons; `//` comments run to
/// end of line.
pub fn parse_source(source: &str) -> CompileResult<Vec<Stmt>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_stmts()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Bang,
    Assign,
    LParen,
    RParen,
    Comma,
    Sep,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
        }
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError::Parse(format!("{} at byte {}", message, self.index))
    }

    fn tokenize(mut self) -> CompileResult<Vec<(Tok, usize)>> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.current() {
            let start = self.index;
            match ch {
                b'\n' | b';' => {
                    self.advance();
                    tokens.push((Tok::Sep, start));
                }
                c if c.is_ascii_whitespace() => self.advance(),
                b'/' if self.peek() == Some(b'/') => {
                    while let Some(c) = self.current() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                b'"' => tokens.push((self.lex_string()?, start)),
                c if c.is_ascii_digit() => tokens.push((self.lex_number()?, start)),
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    tokens.push((self.lex_ident(), start));
                }
                b'(' => {
                    self.advance();
                    tokens.push((Tok::LParen, start));
                }
                b')' => {
                    self.advance();
                    tokens.push((Tok::RParen, start));
                }
                b',' => {
                    self.advance();
                    tokens.push((Tok::Comma, start));
                }
                b'+' => {
                    self.advance();
                    tokens.push((Tok::Plus, start));
                }
                b'-' => {
                    self.advance();
                    tokens.push((Tok::Minus, start));
                }
                b'*' => {
                    self.advance();
                    tokens.push((Tok::Star, start));
                }
                b'/' => {
                    self.advance();
                    tokens.push((Tok::Slash, start));
                }
                b'%' => {
                    self.advance();
                    tokens.push((Tok::Percent, start));
                }
                b'<' => {
                    self.advance();
                    tokens.push((self.maybe_eq(Tok::Le, Tok::Lt), start));
                }
                b'>' => {
                    self.advance();
                    tokens.push((self.maybe_eq(Tok::Ge, Tok::Gt), start));
                }
                b'=' => {
                    self.advance();
                    tokens.push((self.maybe_eq(Tok::EqEq, Tok::Assign), start));
                }
                b'!' => {
                    self.advance();
                    tokens.push((self.maybe_eq(Tok::Ne, Tok::Bang), start));
                }
                b'&' => {
                    self.advance();
                    if self.current() == Some(b'&') {
                        self.advance();
                        tokens.push((Tok::AndAnd, start));
                    } else {
                        return Err(self.error("expected `&&`"));
                    }
                }
                b'|' => {
                    self.advance();
                    if self.current() == Some(b'|') {
                        self.advance();
                        tokens.push((Tok::OrOr, start));
                    } else {
                        return Err(self.error("expected `||`"));
                    }
                }
                other => {
                    return Err(self.error(&format!("unexpected character `{}`", other as char)));
                }
            }
        }
        Ok(tokens)
    }

    fn maybe_eq(&mut self, with_eq: Tok, without: Tok) -> Tok {
        if self.current() == Some(b'=') {
            self.advance();
            with_eq
        } else {
            without
        }
    }

    fn lex_string(&mut self) -> CompileResult<Tok> {
        // consume opening quote
        self.advance();
        let mut buf = String::new();
        while let Some(ch) = self.current() {
            self.advance();
            match ch {
                b'"' => return Ok(Tok::Str(buf)),
                b'\\' => {
                    let escaped = self.current().ok_or_else(|| self.error("incomplete escape"))?;
                    self.advance();
                    let value = match escaped {
                        b'"' => '"',
                        b'\\' => '\\',
                        b'n' => '\n',
                        b't' => '\t',
                        other => {
                            return Err(self.error(&format!("unknown escape: \\{}", other as char)));
                        }
                    };
                    buf.push(value);
                }
                _ => buf.push(ch as char),
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn lex_number(&mut self) -> CompileResult<Tok> {
        let start = self.index;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.current() == Some(b'.') {
            if let Some(next) = self.peek() {
                if next.is_ascii_digit() {
                    is_float = true;
                    self.advance();
                    while let Some(ch) = self.current() {
                        if ch.is_ascii_digit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        let text = &self.src[start..self.index];
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error("invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.error("invalid integer literal"))
        }
    }

    fn lex_ident(&mut self) -> Tok {
        let start = self.index;
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        Tok::Ident(self.src[start..self.index].to_string())
    }
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<(Tok, usize)>) -> Self {
        Self { tokens, index: 0 }
    }

    fn current(&self) -> Option<&Tok> {
        self.tokens.get(self.index).map(|(tok, _)| tok)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|(_, pos)| *pos)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.index).map(|(tok, _)| tok.clone());
        if tok.is_some() {
            self.index += 1;
        }
        tok
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError::Parse(format!("{} at byte {}", message, self.offset()))
    }

    fn skip_seps(&mut self) {
        while self.current() == Some(&Tok::Sep) {
            self.index += 1;
        }
    }

    fn expect_end_of_stmt(&mut self) -> CompileResult<()> {
        match self.current() {
            None | Some(Tok::Sep) => Ok(()),
            Some(_) => Err(self.error("unexpected token after statement")),
        }
    }

    fn expect_ident(&mut self, context: &str) -> CompileResult<String> {
        match self.advance() {
            Some(Tok::Ident(name)) => Ok(name),
            _ => Err(self.error(&format!("expected identifier {}", context))),
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> CompileResult<()> {
        if self.current() == Some(&tok) {
            self.index += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn parse_stmts(mut self) -> CompileResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_seps();
            if self.current().is_none() {
                break;
            }
            stmts.push(self.parse_stmt()?);
            self.expect_end_of_stmt()?;
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        match self.current() {
            Some(Tok::Ident(word)) if word == "let" => {
                self.index += 1;
                let name = self.expect_ident("after `let`")?;
                self.expect(Tok::Assign, "`=`")?;
                let value = self.parse_expr()?;
                Ok(Stmt::Let { name, value })
            }
            Some(Tok::Ident(word)) if word == "type" => {
                self.index += 1;
                let name = self.expect_ident("after `type`")?;
                self.expect(Tok::Assign, "`=`")?;
                let target = self.expect_ident("as type target")?;
                Ok(Stmt::TypeAlias { name, target })
            }
            Some(Tok::Ident(word)) if word == "extern" => {
                self.index += 1;
                let name = self.expect_ident("after `extern`")?;
                Ok(Stmt::Extern { name })
            }
            Some(Tok::Ident(_)) if self.tokens.get(self.index + 1).map(|(t, _)| t) == Some(&Tok::Assign) => {
                let name = self.expect_ident("before `=`")?;
                self.index += 1; // consume `=`
                let value = self.parse_expr()?;
                Ok(Stmt::Assign { name, value })
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.current() == Some(&Tok::OrOr) {
            self.index += 1;
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.current() == Some(&Tok::AndAnd) {
            self.index += 1;
            let rhs = self.parse_equality()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current() {
                Some(Tok::EqEq) => BinOp::Eq,
                Some(Tok::Ne) => BinOp::Ne,
                _ => break,
            };
            self.index += 1;
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current() {
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Ge) => BinOp::Ge,
                _ => break,
            };
            self.index += 1;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.current() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.index += 1;
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Rem,
                _ => break,
            };
            self.index += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = match self.current() {
            Some(Tok::Minus) => Some(UnaryOp::Neg),
            Some(Tok::Bang) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.index += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        match self.advance() {
            Some(Tok::Int(num)) => Ok(Expr::Int(num)),
            Some(Tok::Float(num)) => Ok(Expr::Float(num)),
            Some(Tok::Str(text)) => Ok(Expr::Str(text)),
            Some(Tok::Ident(name)) if name == "true" => Ok(Expr::Bool(true)),
            Some(Tok::Ident(name)) if name == "false" => Ok(Expr::Bool(false)),
            Some(Tok::Ident(name)) => {
                if self.current() == Some(&Tok::LParen) {
                    self.index += 1;
                    let args = self.parse_args()?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn parse_args(&mut self) -> CompileResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.current() == Some(&Tok::RParen) {
            self.index += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.current() {
                Some(Tok::Comma) => self.index += 1,
                Some(Tok::RParen) => {
                    self.index += 1;
                    return Ok(args);
                }
                _ => return Err(self.error("expected `,` or `)`")),
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_let_binding() {
        let stmts = parse_source("let a = 5").expect("parse");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Let { name, .. } if name == "a"));
    }

    #[test]
    fn parses_multiple_statements() {
        let stmts = parse_source("let a = 1; let b = 2\na + b").expect("parse");
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[2], Stmt::Expr(_)));
    }

    #[test]
    fn parses_precedence() {
        let stmts = parse_source("1 + 2 * 3").expect("parse");
        let Stmt::Expr(Expr::Binary { op: BinOp::Add, rhs, .. }) = &stmts[0] else {
            panic!("expected add at the root");
        };
        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn parses_calls_and_nested_parens() {
        let stmts = parse_source("__repl_set_value((1 + 2))").expect("parse");
        let Stmt::Expr(Expr::Call { callee, args }) = &stmts[0] else {
            panic!("expected call");
        };
        assert_eq!(callee, "__repl_set_value");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_source("bogus!!").is_err());
        assert!(parse_source("let = 5").is_err());
        assert!(parse_source("1 + ").is_err());
        assert!(parse_source("\"open").is_err());
    }

    #[test]
    fn comments_and_blank_lines_parse_to_nothing() {
        let stmts = parse_source("// nothing here\n\n").expect("parse");
        assert!(stmts.is_empty());
    }

    #[test]
    fn distinguishes_assignment_from_comparison() {
        let stmts = parse_source("a = 1\nb == 1").expect("parse");
        assert!(matches!(&stmts[0], Stmt::Assign { .. }));
        assert!(matches!(&stmts[1], Stmt::Expr(Expr::Binary { op: BinOp::Eq, .. })));
    }
}
