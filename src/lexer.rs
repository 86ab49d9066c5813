use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Fun,
    Extern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Assign,
    Minus,
    Arrow,
    Unknown,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.peeked.take().or_else(|| self.chars.next());
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
        }
        next
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// The character after the peeked one.
    fn peek_second(&mut self) -> Option<char> {
        self.peek();
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        match self.peek() {
            Some((_, ch)) if ch == expected => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some((_, ch)) = self.peek() {
                if ch.is_whitespace() {
                    self.bump();
                } else {
                    break;
                }
            }

            match (self.peek(), self.peek_second()) {
                (Some((_, '/')), Some('/')) => {
                    while let Some((_, ch)) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some((_, '/')), Some('*')) => {
                    self.bump();
                    self.bump();
                    let mut depth = 1;
                    while let Some((_, ch)) = self.bump() {
                        if ch == '/' && self.match_next('*') {
                            depth += 1;
                        } else if ch == '*' && self.match_next('/') {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while let Some((_, ch)) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            span: SourceSpan { start, end },
        }
    }

    fn number_literal(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        let mut seen_exponent = false;
        while let Some((_, ch)) = self.peek() {
            match ch {
                '0'..='9' | '_' => {
                    self.bump();
                }
                '.' if !seen_dot && !seen_exponent => {
                    seen_dot = true;
                    self.bump();
                }
                'e' | 'E' if !seen_exponent => {
                    seen_exponent = true;
                    self.bump();
                    if let Some((_, '+' | '-')) = self.peek() {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let end = self.current;
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span: SourceSpan {
                            start,
                            end: self.current,
                        },
                    });
                }
                '\\' => match self.bump() {
                    Some((_, esc)) => match esc {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '0' => value.push('\0'),
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        other => value.push(other),
                    },
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal").with_span(
                SourceSpan {
                    start,
                    end: self.current,
                },
            ),
        )
    }

    fn simple_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some((start, ch)) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    span: SourceSpan {
                        start: self.current,
                        end: self.current,
                    },
                });
                break;
            };

            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start),
                '"' => self.string_literal(start)?,
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '{' => self.simple_token(start, TokenKind::LBrace),
                '}' => self.simple_token(start, TokenKind::RBrace),
                ',' => self.simple_token(start, TokenKind::Comma),
                ';' => self.simple_token(start, TokenKind::Semicolon),
                '=' => self.simple_token(start, TokenKind::Assign),
                '-' => {
                    if self.match_next('>') {
                        self.simple_token(start, TokenKind::Arrow)
                    } else {
                        self.simple_token(start, TokenKind::Minus)
                    }
                }
                _ => self.simple_token(start, TokenKind::Unknown),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    let keyword = match ident {
        "fun" => Keyword::Fun,
        "extern" => Keyword::Extern,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
