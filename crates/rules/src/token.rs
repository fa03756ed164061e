//! Token types produced by the rule lexer.

use segment_core::error::SourcePosition;

/// The closed set of token kinds the rule grammar is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Identifier(String),
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    NullLit,

    // Keywords
    And,
    Or,
    Not,
    In,
    Between,
    Like,
    Is,

    // Comparison operators
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,

    // Punctuation
    LParen,
    RParen,
    Comma,
}

/// A lexed token: kind, the matched source text, and where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: SourcePosition,
}

impl Token {
    /// Short rendering of the token for diagnostics, e.g. `'AND'` or `'('`.
    pub fn describe(&self) -> String {
        format!("'{}'", self.text)
    }

    /// Whether this token can end a value expression. Used by the lexer to
    /// decide if a following `-` starts a negative literal or is a binary
    /// minus.
    pub fn ends_value(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier(_)
                | TokenKind::StringLit(_)
                | TokenKind::NumberLit(_)
                | TokenKind::BoolLit(_)
                | TokenKind::NullLit
                | TokenKind::RParen
        )
    }
}
