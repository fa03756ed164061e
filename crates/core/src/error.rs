use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type SegmentResult<T> = Result<T, SegmentError>;

/// 1-based line/column position in rule source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Lexing failure. Fatal for the whole parse, reported with position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {position}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: SourcePosition,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("malformed numeric literal '{0}'")]
    MalformedNumber(String),
}

/// Grammar violation. First error wins; no partial AST is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found} at {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: SourcePosition,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("expression nesting exceeds the maximum depth of {max_depth} at {position}")]
    TooDeeplyNested {
        max_depth: usize,
        position: SourcePosition,
    },
}

/// Evaluation failure, scoped to a single (rule, record) evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub detail: String,
}

impl EvalError {
    pub fn type_mismatch(detail: impl Into<String>) -> Self {
        Self {
            kind: EvalErrorKind::TypeMismatch,
            detail: detail.into(),
        }
    }

    pub fn division_by_zero(detail: impl Into<String>) -> Self {
        Self {
            kind: EvalErrorKind::DivisionByZero,
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalErrorKind {
    #[error("type mismatch")]
    TypeMismatch,

    #[error("division by zero")]
    DivisionByZero,
}

/// User-record or schema violation, reported with the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown fields in segment rule: {0}")]
    UnknownFields(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
