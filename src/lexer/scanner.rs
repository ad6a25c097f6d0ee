//! Lexer/Scanner for Gibbon source code.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some(c) = self.advance() else {
            return Ok(Token::eof(self.line, self.column));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '-' => Ok(self.make_token(TokenKind::Minus)),
            '*' => Ok(self.make_token(TokenKind::Star)),
            '/' => Ok(self.make_token(TokenKind::Slash)),
            '<' => Ok(self.make_token(TokenKind::Less)),
            '>' => Ok(self.make_token(TokenKind::Greater)),
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Assign))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => Ok(self.scan_number(c)),
            c if is_identifier_start(c) => Ok(self.scan_identifier(c)),
            c => Err(LexerError::UnexpectedChar(c, self.start_span())),
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some('"') => return Ok(self.make_token(TokenKind::Str(value))),
                Some(c) => value.push(c),
                None => return Err(LexerError::UnterminatedString(self.start_span())),
            }
        }
    }

    fn scan_number(&mut self, first: char) -> Token {
        let mut value = first as i64 - '0' as i64;
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.advance();
            value = value * 10 + (c as i64 - '0' as i64);
        }
        self.make_token(TokenKind::Int(value))
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut name = String::new();
        name.push(first);
        while let Some(&c) = self.chars.peek() {
            if !is_identifier_continue(c) {
                break;
            }
            self.advance();
            name.push(c);
        }

        match TokenKind::keyword(&name) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::Identifier(name)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') => {
                    // Only consume when it starts a line comment
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        while let Some(&c) = self.chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn start_span(&self) -> Span {
        Span::new(self.start_line, self.start_column)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.start_span())
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
