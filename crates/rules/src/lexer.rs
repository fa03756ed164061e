//! Hand-written lexer for segment rule text.
//!
//! Produces tokens lazily; the parser consumes them with one token of
//! lookahead. The lexer holds no state beyond a cursor into the input.

use crate::token::{Token, TokenKind};
use segment_core::error::{LexError, LexErrorKind, SourcePosition};

/// Lazy tokenizer over rule source text.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    prev_ends_value: bool,
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            prev_ends_value: false,
        }
    }

    fn position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();

        let position = Self::position(self);
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '(' => self.single_char_token(TokenKind::LParen, position),
            ')' => self.single_char_token(TokenKind::RParen, position),
            ',' => self.single_char_token(TokenKind::Comma, position),
            '+' => self.single_char_token(TokenKind::Plus, position),
            '*' => self.single_char_token(TokenKind::Star, position),
            '/' => self.single_char_token(TokenKind::Slash, position),
            '=' => self.single_char_token(TokenKind::Eq, position),
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Token {
                        kind: TokenKind::NotEq,
                        text: "!=".to_string(),
                        position,
                    }
                } else {
                    return Err(LexError {
                        kind: LexErrorKind::UnexpectedChar('!'),
                        position,
                    });
                }
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token {
                            kind: TokenKind::LtEq,
                            text: "<=".to_string(),
                            position,
                        }
                    }
                    // `<>` is the ANSI spelling of not-equals.
                    Some('>') => {
                        self.advance();
                        Token {
                            kind: TokenKind::NotEq,
                            text: "<>".to_string(),
                            position,
                        }
                    }
                    _ => Token {
                        kind: TokenKind::Lt,
                        text: "<".to_string(),
                        position,
                    },
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Token {
                        kind: TokenKind::GtEq,
                        text: ">=".to_string(),
                        position,
                    }
                } else {
                    Token {
                        kind: TokenKind::Gt,
                        text: ">".to_string(),
                        position,
                    }
                }
            }
            '-' => {
                // A `-` directly before a digit is a negative literal only
                // where a value may begin; after a value it is binary minus.
                if !self.prev_ends_value
                    && matches!(self.peek_char_at(1), Some(d) if d.is_ascii_digit())
                {
                    self.lex_number(position)?
                } else {
                    self.single_char_token(TokenKind::Minus, position)
                }
            }
            '\'' => self.lex_string(position)?,
            _ if c.is_ascii_digit() => self.lex_number(position)?,
            _ if c.is_alphabetic() || c == '_' => self.lex_word(position),
            _ => {
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedChar(c),
                    position,
                })
            }
        };

        self.prev_ends_value = token.ends_value();
        Ok(Some(token))
    }

    fn single_char_token(&mut self, kind: TokenKind, position: SourcePosition) -> Token {
        let c = self.advance().unwrap_or_default();
        Token {
            kind,
            text: c.to_string(),
            position,
        }
    }

    /// Single-quoted string literal; an embedded quote is escaped by doubling.
    fn lex_string(&mut self, position: SourcePosition) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        position,
                    })
                }
            }
        }
        let text = format!("'{}'", value.replace('\'', "''"));
        Ok(Token {
            kind: TokenKind::StringLit(value),
            text,
            position,
        })
    }

    /// Numeric literal: optional leading `-`, digits, optional single `.`
    /// with trailing digits. No exponent form, no leading `+`.
    fn lex_number(&mut self, position: SourcePosition) -> Result<Token, LexError> {
        let mut text = String::new();
        if self.peek_char() == Some('-') {
            text.push(self.advance().unwrap_or_default());
        }
        while matches!(self.peek_char(), Some(d) if d.is_ascii_digit()) {
            text.push(self.advance().unwrap_or_default());
        }
        if self.peek_char() == Some('.') {
            text.push(self.advance().unwrap_or_default());
            let mut fraction_digits = 0;
            while matches!(self.peek_char(), Some(d) if d.is_ascii_digit()) {
                text.push(self.advance().unwrap_or_default());
                fraction_digits += 1;
            }
            if fraction_digits == 0 {
                return Err(LexError {
                    kind: LexErrorKind::MalformedNumber(text),
                    position,
                });
            }
        }
        // A second decimal point is a lex error, not a parse error.
        if self.peek_char() == Some('.') {
            text.push('.');
            return Err(LexError {
                kind: LexErrorKind::MalformedNumber(text),
                position,
            });
        }
        let value: f64 = text.parse().map_err(|_| LexError {
            kind: LexErrorKind::MalformedNumber(text.clone()),
            position,
        })?;
        Ok(Token {
            kind: TokenKind::NumberLit(value),
            text,
            position,
        })
    }

    /// Identifier or keyword. Keywords match case-insensitively and take
    /// precedence over identifiers.
    fn lex_word(&mut self, position: SourcePosition) -> Token {
        let mut text = String::new();
        while matches!(self.peek_char(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap_or_default());
        }
        let kind = match text.to_ascii_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "IN" => TokenKind::In,
            "BETWEEN" => TokenKind::Between,
            "LIKE" => TokenKind::Like,
            "IS" => TokenKind::Is,
            "NULL" => TokenKind::NullLit,
            "TRUE" => TokenKind::BoolLit(true),
            "FALSE" => TokenKind::BoolLit(false),
            _ => TokenKind::Identifier(text.clone()),
        };
        Token {
            kind,
            text,
            position,
        }
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Strict tokenization of a whole input.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).collect()
}
