//! SQL-like segment rule parsing and safe evaluation.
//!
//! Rule text flows through a hand-written lexer and a recursive-descent
//! parser into an immutable AST, which a closed-dispatch evaluator walks
//! against a user's attribute record under SQL three-valued logic. No rule
//! text is ever executed as code: the operator set is the AST enum, nothing
//! more.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod pattern;
pub mod rule;
pub mod token;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::{
    evaluate, evaluate_with_clock, matches, matches_with_clock, Clock, FixedClock, SystemClock,
};
pub use lexer::{tokenize, Lexer};
pub use parser::{parse, Parser, DEFAULT_MAX_DEPTH};
pub use pattern::LikePattern;
pub use rule::Rule;
pub use token::{Token, TokenKind};
