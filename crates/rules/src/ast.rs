//! Abstract syntax tree for segment rule expressions.
//!
//! The node set is a closed enum: every operation the evaluator can perform
//! is enumerated here, and nothing else is executable. Nodes own their
//! children exclusively; a built tree is immutable and safely shared
//! read-only across concurrent evaluations.

use crate::pattern::LikePattern;
use segment_core::types::AttributeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// An expression node. `Box`ed children keep the tree exclusively owned and
/// cycle-free.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(AttributeValue),
    Column(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    InList {
        target: Box<Expr>,
        candidates: Vec<AttributeValue>,
        negated: bool,
    },
    Between {
        target: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        target: Box<Expr>,
        pattern: LikePattern,
        negated: bool,
    },
    IsNull {
        target: Box<Expr>,
        negated: bool,
    },
    /// The `_now()` builtin: current Unix timestamp in seconds.
    Now,
}

impl Expr {
    /// Short node description used in evaluation diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Expr::Literal(v) => format!("{} literal", v.type_name()),
            Expr::Column(name) => format!("column '{name}'"),
            Expr::Unary { op: UnaryOp::Not, .. } => "NOT expression".to_string(),
            Expr::Unary { op: UnaryOp::Neg, .. } => "negation".to_string(),
            Expr::Binary { op, .. } => format!("'{}' expression", op.symbol()),
            Expr::InList { negated: false, .. } => "IN list".to_string(),
            Expr::InList { negated: true, .. } => "NOT IN list".to_string(),
            Expr::Between { .. } => "BETWEEN expression".to_string(),
            Expr::Like { .. } => "LIKE expression".to_string(),
            Expr::IsNull { .. } => "IS NULL check".to_string(),
            Expr::Now => "_now()".to_string(),
        }
    }

    /// Collect every column name referenced anywhere in the tree.
    pub fn collect_columns(&self, out: &mut std::collections::BTreeSet<String>) {
        match self {
            Expr::Literal(_) | Expr::Now => {}
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::InList { target, .. } => target.collect_columns(out),
            Expr::Between {
                target, low, high, ..
            } => {
                target.collect_columns(out);
                low.collect_columns(out);
                high.collect_columns(out);
            }
            Expr::Like { target, .. } => target.collect_columns(out),
            Expr::IsNull { target, .. } => target.collect_columns(out),
        }
    }
}
