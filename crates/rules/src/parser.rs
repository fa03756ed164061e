//! Recursive-descent parser for the segment rule grammar.
//!
//! One function per precedence level, one token of lookahead, no
//! backtracking. The whole parse fails atomically on the first grammar
//! violation; there is no partial AST.
//!
//! ```text
//! expr           := or_expr
//! or_expr        := and_expr (OR and_expr)*
//! and_expr       := not_expr (AND not_expr)*
//! not_expr       := NOT not_expr | comparison
//! comparison     := additive ( (= | != | < | <= | > | >=) additive
//!                            | [NOT] IN '(' literal_list ')'
//!                            | [NOT] BETWEEN additive AND additive
//!                            | [NOT] LIKE string_literal
//!                            | IS [NOT] NULL )?
//! additive       := multiplicative ( (+|-) multiplicative )*
//! multiplicative := unary ( (*|/) unary )*
//! unary          := '-' unary | primary
//! primary        := literal | column_ref | '_now' '(' ')' | '(' expr ')'
//! ```

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::lexer::Lexer;
use crate::pattern::LikePattern;
use crate::token::{Token, TokenKind};
use segment_core::error::{SegmentError, SegmentResult, SourcePosition, SyntaxError};
use segment_core::types::AttributeValue;

/// Default maximum expression nesting depth. Pathological inputs beyond this
/// are rejected instead of recursing toward the host stack limit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub struct Parser {
    lexer: Lexer,
    peeked: Option<Token>,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(text: &str) -> Self {
        Self::with_max_depth(text, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(text: &str, max_depth: usize) -> Self {
        Self {
            lexer: Lexer::new(text),
            peeked: None,
            depth: 0,
            max_depth,
        }
    }

    /// Parse the input as a single expression; trailing tokens are an error.
    pub fn parse(mut self) -> SegmentResult<Expr> {
        let expr = self.parse_expr()?;
        if let Some(token) = self.peek()? {
            return Err(unexpected("end of input", token));
        }
        Ok(expr)
    }

    // --- Token plumbing -------------------------------------------------

    fn peek(&mut self) -> SegmentResult<Option<&Token>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next().transpose()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn advance(&mut self) -> SegmentResult<Option<Token>> {
        self.peek()?;
        Ok(self.peeked.take())
    }

    /// Consume the next token if it matches `kind`.
    fn eat(&mut self, kind: &TokenKind) -> SegmentResult<bool> {
        if matches!(self.peek()?, Some(t) if &t.kind == kind) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> SegmentResult<Token> {
        match self.advance()? {
            Some(token) if &token.kind == kind => Ok(token),
            Some(token) => Err(unexpected(expected, &token)),
            None => Err(unexpected_end(expected)),
        }
    }

    // --- Recursion guard ------------------------------------------------

    fn descend(&mut self, position: SourcePosition) -> SegmentResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SyntaxError::TooDeeplyNested {
                max_depth: self.max_depth,
                position,
            }
            .into());
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    // --- Productions ----------------------------------------------------

    fn parse_expr(&mut self) -> SegmentResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> SegmentResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or)? {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> SegmentResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And)? {
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> SegmentResult<Expr> {
        let not_position = match self.peek()? {
            Some(t) if t.kind == TokenKind::Not => Some(t.position),
            _ => None,
        };
        if let Some(position) = not_position {
            self.advance()?;
            self.descend(position)?;
            let operand = self.parse_not()?;
            self.ascend();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// A comparison with zero trailing operators collapses to the bare value
    /// expression, so a boolean column alone is a valid predicate.
    fn parse_comparison(&mut self) -> SegmentResult<Expr> {
        let left = self.parse_additive()?;

        let follow = match self.peek()? {
            Some(token) => match token.kind {
                TokenKind::Eq => Follow::Op(BinaryOp::Eq),
                TokenKind::NotEq => Follow::Op(BinaryOp::NotEq),
                TokenKind::Lt => Follow::Op(BinaryOp::Lt),
                TokenKind::LtEq => Follow::Op(BinaryOp::LtEq),
                TokenKind::Gt => Follow::Op(BinaryOp::Gt),
                TokenKind::GtEq => Follow::Op(BinaryOp::GtEq),
                TokenKind::Not => Follow::Not,
                TokenKind::In => Follow::In,
                TokenKind::Between => Follow::Between,
                TokenKind::Like => Follow::Like,
                TokenKind::Is => Follow::Is,
                _ => Follow::None,
            },
            None => Follow::None,
        };

        let op = match follow {
            Follow::None => return Ok(left),
            Follow::Not => {
                self.advance()?;
                return self.parse_negated_comparison(left);
            }
            Follow::In => {
                self.advance()?;
                return self.parse_in_list(left, false);
            }
            Follow::Between => {
                self.advance()?;
                return self.parse_between(left, false);
            }
            Follow::Like => {
                self.advance()?;
                return self.parse_like(left, false);
            }
            Follow::Is => {
                self.advance()?;
                return self.parse_is_null(left);
            }
            Follow::Op(op) => op,
        };
        self.advance()?;
        let right = self.parse_additive()?;

        // SQL comparisons are non-chainable: `a < b < c` is a syntax error.
        if let Some(token) = self.peek()? {
            if is_comparison_token(&token.kind) {
                return Err(unexpected(
                    "AND, OR, or end of expression (comparison operators are non-chainable)",
                    token,
                ));
            }
        }

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `NOT` in comparison position must introduce `IN`, `BETWEEN`, or `LIKE`.
    fn parse_negated_comparison(&mut self, left: Expr) -> SegmentResult<Expr> {
        match self.advance()? {
            Some(token) => match token.kind {
                TokenKind::In => self.parse_in_list(left, true),
                TokenKind::Between => self.parse_between(left, true),
                TokenKind::Like => self.parse_like(left, true),
                _ => Err(unexpected("IN, BETWEEN, or LIKE after NOT", &token)),
            },
            None => Err(unexpected_end("IN, BETWEEN, or LIKE after NOT")),
        }
    }

    fn parse_in_list(&mut self, target: Expr, negated: bool) -> SegmentResult<Expr> {
        self.expect(&TokenKind::LParen, "'(' after IN")?;

        let mut candidates = vec![self.parse_candidate_literal()?];
        while self.eat(&TokenKind::Comma)? {
            // A trailing comma before ')' is a syntax error.
            candidates.push(self.parse_candidate_literal()?);
        }
        self.expect(&TokenKind::RParen, "')' or ',' in IN list")?;

        Ok(Expr::InList {
            target: Box::new(target),
            candidates,
            negated,
        })
    }

    fn parse_candidate_literal(&mut self) -> SegmentResult<AttributeValue> {
        match self.advance()? {
            Some(token) => match token.kind {
                TokenKind::NumberLit(n) => Ok(AttributeValue::Number(n)),
                TokenKind::StringLit(s) => Ok(AttributeValue::String(s)),
                TokenKind::BoolLit(b) => Ok(AttributeValue::Bool(b)),
                TokenKind::NullLit => Ok(AttributeValue::Null),
                _ => Err(unexpected("a literal in IN list", &token)),
            },
            None => Err(unexpected_end("a literal in IN list")),
        }
    }

    fn parse_between(&mut self, target: Expr, negated: bool) -> SegmentResult<Expr> {
        let low = self.parse_additive()?;
        self.expect(&TokenKind::And, "AND between range bounds")?;
        let high = self.parse_additive()?;
        Ok(Expr::Between {
            target: Box::new(target),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    fn parse_like(&mut self, target: Expr, negated: bool) -> SegmentResult<Expr> {
        match self.advance()? {
            Some(token) => match token.kind {
                TokenKind::StringLit(s) => Ok(Expr::Like {
                    target: Box::new(target),
                    pattern: LikePattern::compile(&s),
                    negated,
                }),
                _ => Err(unexpected("a string literal pattern after LIKE", &token)),
            },
            None => Err(unexpected_end("a string literal pattern after LIKE")),
        }
    }

    fn parse_is_null(&mut self, target: Expr) -> SegmentResult<Expr> {
        let negated = self.eat(&TokenKind::Not)?;
        self.expect(&TokenKind::NullLit, "NULL after IS")?;
        Ok(Expr::IsNull {
            target: Box::new(target),
            negated,
        })
    }

    fn parse_additive(&mut self) -> SegmentResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek()? {
                Some(t) if t.kind == TokenKind::Plus => BinaryOp::Add,
                Some(t) if t.kind == TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> SegmentResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek()? {
                Some(t) if t.kind == TokenKind::Star => BinaryOp::Mul,
                Some(t) if t.kind == TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> SegmentResult<Expr> {
        let minus_position = match self.peek()? {
            Some(t) if t.kind == TokenKind::Minus => Some(t.position),
            _ => None,
        };
        if let Some(position) = minus_position {
            self.advance()?;
            self.descend(position)?;
            let operand = self.parse_unary()?;
            self.ascend();
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> SegmentResult<Expr> {
        let token = match self.advance()? {
            Some(token) => token,
            None => return Err(unexpected_end("a literal, column, or '('")),
        };

        match token.kind {
            TokenKind::NumberLit(n) => Ok(Expr::Literal(AttributeValue::Number(n))),
            TokenKind::StringLit(s) => Ok(Expr::Literal(AttributeValue::String(s))),
            TokenKind::BoolLit(b) => Ok(Expr::Literal(AttributeValue::Bool(b))),
            TokenKind::NullLit => Ok(Expr::Literal(AttributeValue::Null)),
            TokenKind::Identifier(name) => {
                if matches!(self.peek()?, Some(t) if t.kind == TokenKind::LParen) {
                    self.advance()?;
                    self.expect(&TokenKind::RParen, "')' after function call")?;
                    if name == "_now" {
                        Ok(Expr::Now)
                    } else {
                        Err(SyntaxError::UnexpectedToken {
                            expected: "a known function (_now)".to_string(),
                            found: format!("'{name}'"),
                            position: token.position,
                        }
                        .into())
                    }
                } else {
                    Ok(Expr::Column(name))
                }
            }
            TokenKind::LParen => {
                self.descend(token.position)?;
                let expr = self.parse_expr()?;
                self.ascend();
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(unexpected("a literal, column, or '('", &token)),
        }
    }
}

/// Parse rule text into an expression with the default nesting limit.
pub fn parse(text: &str) -> SegmentResult<Expr> {
    Parser::new(text).parse()
}

fn unexpected(expected: &str, token: &Token) -> SegmentError {
    SyntaxError::UnexpectedToken {
        expected: expected.to_string(),
        found: token.describe(),
        position: token.position,
    }
    .into()
}

fn unexpected_end(expected: &str) -> SegmentError {
    SyntaxError::UnexpectedEnd {
        expected: expected.to_string(),
    }
    .into()
}

/// What follows the left-hand side of a `comparison` production.
enum Follow {
    Op(BinaryOp),
    Not,
    In,
    Between,
    Like,
    Is,
    None,
}

fn is_comparison_token(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
    )
}
