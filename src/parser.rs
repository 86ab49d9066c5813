use std::rc::Rc;

use crate::{
    ast::{Definition, Expr, Program},
    diagnostics::{Diagnostic, DiagnosticKind, RuntimeError, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
    native::{NativeFunction, NativeSignature, TypeTag},
    value::{Callable, UserFunction, Value, ValueKind},
};

/// Parses a whole script. `extern` declarations are bound to their native
/// symbols while parsing, so a bad library or signature is reported here.
pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// One line of interactive input.
#[derive(Debug)]
pub enum ReplInput {
    Definition(Definition),
    Expression(Rc<Expr>),
}

pub fn parse_repl_line(source: &str) -> Result<ReplInput, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_repl_line()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut program = Program::new();
        while !self.is_at_end() {
            let definition = self.parse_definition()?;
            self.consume(TokenKind::Semicolon, "expected `;` after definition")?;
            program.add_definition(definition.name, definition.body);
        }
        Ok(program)
    }

    fn parse_repl_line(&mut self) -> Result<ReplInput, Diagnostic> {
        let is_definition = self.check(TokenKind::Identifier)
            && matches!(
                self.tokens.get(self.current + 1).map(|t| &t.kind),
                Some(TokenKind::Assign)
            );
        let input = if is_definition {
            ReplInput::Definition(self.parse_definition()?)
        } else {
            ReplInput::Expression(self.parse_expression()?)
        };
        self.matches(TokenKind::Semicolon);
        if !self.is_at_end() {
            let token = self.advance();
            return Err(self.error(&token, "unexpected input after expression"));
        }
        Ok(input)
    }

    fn parse_definition(&mut self) -> Result<Definition, Diagnostic> {
        let name = self.consume_identifier("expected definition name")?;
        self.consume(TokenKind::Assign, "expected `=` after definition name")?;
        let body = name_function(self.parse_expression()?, &name.lexeme);
        Ok(Definition {
            name: name.lexeme,
            body,
        })
    }

    fn parse_expression(&mut self) -> Result<Rc<Expr>, Diagnostic> {
        let mut expr = self.parse_primary()?;
        while self.matches(TokenKind::LParen) {
            let mut arguments = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    arguments.push(self.parse_expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RParen, "expected `)` after arguments")?;
            expr = Expr::call(expr, arguments);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Rc<Expr>, Diagnostic> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_eof("expected expression"));
        };
        match &token.kind {
            TokenKind::Number => {
                self.advance();
                self.number(&token, false)
            }
            TokenKind::Minus => {
                self.advance();
                let number = self.consume(TokenKind::Number, "expected number after `-`")?;
                self.number(&number, true)
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::constant(Value::text(token.lexeme)))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::variable(token.lexeme))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(inner)
            }
            TokenKind::Keyword(Keyword::Fun) => self.parse_function(),
            TokenKind::Keyword(Keyword::Extern) => self.parse_extern(),
            TokenKind::Eof => Err(self.error(&token, "unexpected end of input")),
            _ => Err(self.error(&token, &format!("unexpected token `{}`", token.lexeme))),
        }
    }

    fn number(&self, token: &Token, negative: bool) -> Result<Rc<Expr>, Diagnostic> {
        let mut digits = token.lexeme.replace('_', "");
        if negative {
            digits.insert(0, '-');
        }
        let value = if digits.contains(['.', 'e', 'E']) {
            digits.parse::<f64>().ok().map(Value::float)
        } else {
            digits.parse::<i64>().ok().map(Value::int)
        };
        value
            .map(Expr::constant)
            .ok_or_else(|| self.error(token, &format!("invalid numeric literal `{digits}`")))
    }

    fn parse_function(&mut self) -> Result<Rc<Expr>, Diagnostic> {
        self.consume_keyword(Keyword::Fun)?;
        self.consume(TokenKind::LParen, "expected `(` after `fun`")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                params.push(param.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        self.consume(TokenKind::LBrace, "expected `{` to start function body")?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_expression()?);
            if !self.matches(TokenKind::Semicolon) {
                break;
            }
        }
        self.consume(TokenKind::RBrace, "expected `}` after function body")?;
        Ok(Expr::constant(Value::function(UserFunction::new(params, body))))
    }

    fn parse_extern(&mut self) -> Result<Rc<Expr>, Diagnostic> {
        let start = self.consume_keyword(Keyword::Extern)?.span.start;
        let library = if self.check(TokenKind::String) {
            self.advance().lexeme
        } else {
            String::new()
        };
        let symbol = self.consume_identifier("expected native symbol name")?;
        self.consume(TokenKind::LParen, "expected `(` after native symbol name")?;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                parameters.push(self.parse_type()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameter types")?;
        let return_type = if self.matches(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            TypeTag::Void
        };
        let span = SourceSpan::new(start, self.previous().span.end);

        let signature = NativeSignature::new(library, symbol.lexeme, parameters, return_type);
        let function =
            NativeFunction::load(signature).map_err(|err| declaration_error(&err, span))?;
        Ok(Expr::constant(Value::native(function)))
    }

    fn parse_type(&mut self) -> Result<TypeTag, Diagnostic> {
        let token = self.consume_identifier("expected native type name")?;
        if token.lexeme == "long"
            && self
                .peek()
                .is_some_and(|next| next.kind == TokenKind::Identifier && next.lexeme == "long")
        {
            self.advance();
            return Ok(TypeTag::LongLong);
        }
        TypeTag::from_name(&token.lexeme).ok_or_else(|| {
            self.error(&token, &format!("unknown native type `{}`", token.lexeme))
                .with_note(
                    "expected one of void, short, int, long, long long, float, double, string",
                )
        })
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Keyword(keyword.clone()) {
                Ok(self.advance())
            } else {
                Err(self.error(token, &format!("expected keyword `{keyword:?}`")))
            }
        } else {
            Err(self.error_eof("unexpected end of input"))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string())
    }
}

/// Gives a `fun` literal bound directly by a definition the definition's name,
/// so arity errors can say which function was called.
fn name_function(body: Rc<Expr>, name: &str) -> Rc<Expr> {
    if let Expr::Constant(value) = &*body {
        if let ValueKind::Callable(Callable::User(function)) = &*value.0 {
            if function.name.is_none() {
                return Expr::constant(Value::function(function.clone().named(name)));
            }
        }
    }
    body
}

fn declaration_error(err: &RuntimeError, span: SourceSpan) -> Diagnostic {
    let diagnostic = Diagnostic::new(DiagnosticKind::Declaration, err.to_string()).with_span(span);
    match std::error::Error::source(err) {
        Some(cause) => diagnostic.with_note(cause.to_string()),
        None => diagnostic,
    }
}
