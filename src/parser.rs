use std::fmt;

use crate::{
    ast::{Def, Expr, Form, Lit, ModuleRef, Param, Program, TypeRef},
    lexer::extract,
    token::{Pos, Token, TokenKind},
};

type Result<T> = std::result::Result<T, Error>;

/// Parses a whole compilation unit. The parser does not recover: the
/// first grammar violation aborts the unit.
pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    eof: Token,
}

impl Parser {
    fn parse_program(mut self) -> Result<Program> {
        let mut forms = Vec::new();
        while !self.peek().is_eof() {
            forms.push(self.parse_form()?);
        }
        Ok(Program { forms })
    }

    fn parse_form(&mut self) -> Result<Form> {
        if self.is_word("require") {
            self.parse_require()
        } else if self.is_word("def") {
            self.parse_def()
        } else {
            let expr = self.parse_expr()?;
            // A terminator after a bare top-level expression is allowed
            // but not required.
            self.take(TokenKind::End);
            Ok(Form::Expr(expr))
        }
    }

    /// `require` takes exactly one module name or path string.
    fn parse_require(&mut self) -> Result<Form> {
        self.advance();
        let token = self.advance();
        let module = match token.kind {
            TokenKind::Id => ModuleRef::Name(token.text),
            TokenKind::Str => ModuleRef::Path(token.text),
            _ => return Err(Error::ExpectedModule { found: token }),
        };
        self.consume(TokenKind::End)?;
        Ok(Form::Require { module })
    }

    /// A bare name defines a value; a name followed by a parenthesized
    /// parameter list defines a function.
    fn parse_def(&mut self) -> Result<Form> {
        self.advance();
        let name = self.consume(TokenKind::Id)?.text;
        let ty = self.parse_annotation()?;
        if self.is(TokenKind::LPar) {
            let params = self.parse_params()?;
            let ret = self.parse_annotation()?;
            let body = self.parse_body()?;
            Ok(Form::Def(Def {
                name,
                ty,
                params: Some(params),
                ret,
                body,
            }))
        } else {
            let value = self.parse_expr()?;
            self.consume(TokenKind::End)?;
            Ok(Form::Def(Def {
                name,
                ty,
                params: None,
                ret: None,
                body: vec![value],
            }))
        }
    }

    fn parse_annotation(&mut self) -> Result<Option<TypeRef>> {
        if !self.take(TokenKind::Colon) {
            return Ok(None);
        }
        Ok(Some(self.consume(TokenKind::Id)?.text))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.consume(TokenKind::LPar)?;
        let mut params = Vec::new();
        while !self.is(TokenKind::RPar) {
            let name = self.consume(TokenKind::Id)?.text;
            let ty = self.parse_annotation()?;
            params.push(Param { name, ty });
            if !self.is(TokenKind::RPar) {
                self.consume(TokenKind::Comma)?;
            }
        }
        self.consume(TokenKind::RPar)?;
        Ok(params)
    }

    /// `expr+` up to a terminator; the terminator is consumed.
    fn parse_body(&mut self) -> Result<Vec<Expr>> {
        let mut body = vec![self.parse_expr()?];
        while !self.take(TokenKind::End) {
            body.push(self.parse_expr()?);
        }
        Ok(body)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        // Application binds by juxtaposition: any primary directly
        // followed by an argument list is a call, nesting leftward.
        while self.is(TokenKind::LPar) {
            let args = self.parse_args()?;
            expr = Expr::Apply {
                callee: Box::new(expr),
                args,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        use TokenKind::*;
        match self.peek().kind {
            LPar => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(RPar)?;
                Ok(Expr::Group(Box::new(inner)))
            }
            Id if self.is_word("if") => self.parse_if(),
            Id if self.is_word("fn") => self.parse_fn(),
            Id => Ok(Expr::Ident(self.advance().text)),
            Int | Float | Char | Str | Bool => self.parse_literal(),
            _ => Err(Error::ExpectedExpression {
                found: self.peek().clone(),
            }),
        }
    }

    /// `then` is optional sugar with no semantic effect; both branches
    /// are expression sequences with fall-through value.
    fn parse_if(&mut self) -> Result<Expr> {
        self.advance();
        let cond = self.parse_expr()?;
        self.take_word("then");
        let mut then = vec![self.parse_expr()?];
        while !self.is(TokenKind::End) && !self.is_word("else") {
            then.push(self.parse_expr()?);
        }
        let els = if self.take_word("else") {
            let mut els = vec![self.parse_expr()?];
            while !self.is(TokenKind::End) {
                els.push(self.parse_expr()?);
            }
            Some(els)
        } else {
            None
        };
        self.consume(TokenKind::End)?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then,
            els,
        })
    }

    fn parse_fn(&mut self) -> Result<Expr> {
        self.advance();
        let params = self.parse_params()?;
        let body = self.parse_body()?;
        Ok(Expr::Fn { params, body })
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.consume(TokenKind::LPar)?;
        let mut args = Vec::new();
        while !self.is(TokenKind::RPar) {
            args.push(self.parse_expr()?);
            if !self.is(TokenKind::RPar) {
                self.consume(TokenKind::Comma)?;
            }
        }
        self.consume(TokenKind::RPar)?;
        Ok(args)
    }

    fn parse_literal(&mut self) -> Result<Expr> {
        let token = self.advance();
        let invalid = |token: &Token| Error::InvalidLiteral {
            found: token.clone(),
        };
        let lit = match token.kind {
            TokenKind::Int => Lit::Int(extract::int(&token).ok_or_else(|| invalid(&token))?),
            TokenKind::Float => {
                Lit::Float(extract::float(&token).ok_or_else(|| invalid(&token))?)
            }
            TokenKind::Char => {
                Lit::Char(extract::character(&token).ok_or_else(|| invalid(&token))?)
            }
            TokenKind::Str => Lit::Str(extract::string(&token)),
            TokenKind::Bool => Lit::Bool(extract::boolean(&token)),
            _ => return Err(invalid(&token)),
        };
        Ok(Expr::Literal(lit))
    }
}

/// Cursor plumbing.
impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        let end = tokens.last().map_or(Pos::new(1, 1), |t| t.pos);
        Parser {
            eof: Token::new(TokenKind::Eof, "", end),
            tokens,
            cursor: 0,
        }
    }

    /// Returns the current token without advancing.
    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&self.eof)
    }

    /// Returns the current token and advances past it. At end of input,
    /// keeps returning the end-of-stream token.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn is_word(&self, word: &str) -> bool {
        self.peek().is_word(word)
    }

    /// Advances past the current token if it matches, returning whether
    /// it did.
    fn take(&mut self, kind: TokenKind) -> bool {
        if self.is(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn take_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances past the current token if it matches; errors otherwise.
    fn consume(&mut self, expected: TokenKind) -> Result<Token> {
        if self.is(expected) {
            Ok(self.advance())
        } else {
            Err(Error::Unexpected {
                expected,
                found: self.peek().clone(),
            })
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Wrong token for the position.
    Unexpected { expected: TokenKind, found: Token },
    /// A position where an expression must start.
    ExpectedExpression { found: Token },
    /// `require` takes exactly one module name or path string.
    ExpectedModule { found: Token },
    /// A literal token whose resolved text failed its typed readback.
    InvalidLiteral { found: Token },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            Unexpected { expected, found } => write!(
                f,
                "{}: expected {expected}, but got {}",
                found.pos, found.kind
            ),
            ExpectedExpression { found } => write!(
                f,
                "{}: expected an expression, but got {}",
                found.pos, found.kind
            ),
            ExpectedModule { found } => write!(
                f,
                "{}: expected a module name, but got {}",
                found.pos, found.kind
            ),
            InvalidLiteral { found } => {
                write!(f, "{}: invalid {} literal", found.pos, found.kind)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, util::fmt::print_program_string};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn dump(src: &str) -> String {
        let tokens = lexer::lex(src).expect("lex error");
        let program = parse(tokens).expect("parse error");
        print_program_string(&program)
    }

    fn error(src: &str) -> String {
        let tokens = lexer::lex(src).expect("lex error");
        parse(tokens).expect_err("expected a parse error").to_string()
    }

    #[test]
    fn test_require() {
        assert_eq!(dump("require foo;"), "(require ID:foo)\n");
        assert_eq!(dump("require foo end"), "(require ID:foo)\n");
        assert_eq!(dump("require \"foo\";"), "(require STRING:\"foo\")\n");
    }

    #[test]
    fn test_require_errors() {
        assert_eq!(error("require ;"), "1:9: expected a module name, but got END");
        assert_eq!(error("require 123;"), "1:9: expected a module name, but got INT");
        assert_eq!(error("require foo bar;"), "1:13: expected END, but got ID");
        assert_eq!(error("require foo"), "1:9: expected END, but got EOF");
    }

    #[test]
    fn test_value_definition() {
        assert_eq!(dump("def foo 123;"), "(def ID:foo INT:123)\n");
        assert_eq!(dump("def v l;"), "(def ID:v ID:l)\n");
    }

    #[test]
    fn test_function_definitions() {
        assert_eq!(dump("def foo() 123;"), "(def ID:foo (fn () INT:123))\n");
        assert_eq!(
            dump("def foo() 123 321;"),
            "(def ID:foo (fn () INT:123 INT:321))\n"
        );
        assert_eq!(
            dump("def foo(a) 123;"),
            "(def ID:foo (fn (ID:a) INT:123))\n"
        );
        assert_eq!(
            dump("def foo(a,b) 123;"),
            "(def ID:foo (fn (ID:a ID:b) INT:123))\n"
        );
        assert_eq!(
            dump("def foo(a,b,c) 123;"),
            "(def ID:foo (fn (ID:a ID:b ID:c) INT:123))\n"
        );
    }

    #[test]
    fn test_annotations_are_threaded_through() {
        let tokens = lexer::lex("def f(a : int, b) : int a;").unwrap();
        let program = parse(tokens).unwrap();
        let Form::Def(def) = &program.forms[0] else {
            panic!("expected a def");
        };
        assert_eq!(def.ret.as_deref(), Some("int"));
        let params = def.params.as_ref().unwrap();
        assert_eq!(params[0].ty.as_deref(), Some("int"));
        assert_eq!(params[1].ty, None);

        let tokens = lexer::lex("def x : int 5;").unwrap();
        let program = parse(tokens).unwrap();
        let Form::Def(def) = &program.forms[0] else {
            panic!("expected a def");
        };
        assert_eq!(def.ty.as_deref(), Some("int"));
        assert_eq!(def.params, None);
    }

    #[test]
    fn test_grouping() {
        assert_eq!(dump("(123)"), "(INT:123)\n");
        assert_eq!(dump("((123))"), "((INT:123))\n");
    }

    #[test]
    fn test_if() {
        assert_eq!(dump("if 123 321 end"), "(if INT:123 INT:321)\n");
        assert_eq!(
            dump("if 123 321 else 456 end"),
            "(if INT:123 INT:321 else INT:456)\n"
        );
        // `then` is sugar only.
        assert_eq!(
            dump("if 123 then 321 else 456 end"),
            "(if INT:123 INT:321 else INT:456)\n"
        );
        assert_eq!(dump("if 1 2 3;"), "(if INT:1 INT:2 INT:3)\n");
    }

    #[test]
    fn test_function_literals() {
        assert_eq!(dump("fn() 123;"), "(fn () INT:123)\n");
        assert_eq!(dump("fn(a) 123;"), "(fn (ID:a) INT:123)\n");
        assert_eq!(dump("fn(a,b) 123;"), "(fn (ID:a ID:b) INT:123)\n");
    }

    #[test]
    fn test_application() {
        assert_eq!(dump("foo()"), "(ID:foo)\n");
        assert_eq!(dump("foo(a)"), "(ID:foo ID:a)\n");
        assert_eq!(dump("foo(a,b)"), "(ID:foo ID:a ID:b)\n");
    }

    #[test]
    fn test_application_nests_by_juxtaposition() {
        assert_eq!(dump("(foo())()"), "(((ID:foo)))\n");
        assert_eq!(dump("foo()()"), "((ID:foo))\n");
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            dump("\\c 123 123.0 true foo"),
            indoc! {"
                CHAR:\\c
                INT:123
                FLOAT:123.000000
                BOOL:true
                ID:foo
            "}
        );
        assert_eq!(dump("\"foo\""), "STRING:\"foo\"\n");
    }

    #[test]
    fn test_lone_terminator_is_an_error() {
        assert_eq!(error(";"), "1:1: expected an expression, but got END");
    }

    #[test]
    fn test_invalid_literal_is_an_error() {
        assert_eq!(error("'"), "1:1: expected an expression, but got SQUOTE");
    }

    #[test]
    fn test_unclosed_group_is_an_error() {
        assert_eq!(error("(1"), "1:2: expected RPAR, but got EOF");
    }

    #[test]
    fn test_multiple_forms() {
        assert_eq!(
            dump("def a 1; a() b()"),
            indoc! {"
                (def ID:a INT:1)
                (ID:a)
                (ID:b)
            "}
        );
    }
}
