//! Safe evaluation of a parsed rule against a single user record.
//!
//! The evaluator is an exhaustive match over the closed AST variant set:
//! every operation it can perform is an enumerated arm, and there is no
//! fallback to any general code-execution facility. Soft anomalies (NULL
//! operands, absent attributes) resolve to `Unknown` per SQL three-valued
//! logic; hard anomalies (type mismatches, division by zero) fail the single
//! evaluation with a typed error and never affect other evaluations of the
//! same rule.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::rule::Rule;
use segment_core::error::{EvalError, EvalErrorKind};
use segment_core::types::{AttributeValue, Truth, UserRecord};
use std::cmp::Ordering;

/// Time source for the `_now()` builtin.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in seconds.
    fn now_epoch_secs(&self) -> f64;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> f64 {
        chrono::Utc::now().timestamp() as f64
    }
}

/// Fixed time source for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> f64 {
        self.0 as f64
    }
}

/// Evaluate a rule against a record, returning the three-valued result.
pub fn evaluate(rule: &Rule, record: &UserRecord) -> Result<Truth, EvalError> {
    evaluate_with_clock(rule, record, &SystemClock)
}

pub fn evaluate_with_clock(
    rule: &Rule,
    record: &UserRecord,
    clock: &dyn Clock,
) -> Result<Truth, EvalError> {
    Evaluator { record, clock }.eval_truth(rule.root())
}

/// Boundary collapse: TRUE is a match, FALSE and UNKNOWN are not.
pub fn matches(rule: &Rule, record: &UserRecord) -> Result<bool, EvalError> {
    evaluate(rule, record).map(Truth::to_bool)
}

pub fn matches_with_clock(
    rule: &Rule,
    record: &UserRecord,
    clock: &dyn Clock,
) -> Result<bool, EvalError> {
    evaluate_with_clock(rule, record, clock).map(Truth::to_bool)
}

struct Evaluator<'a> {
    record: &'a UserRecord,
    clock: &'a dyn Clock,
}

impl Evaluator<'_> {
    /// Evaluate an expression in predicate position.
    fn eval_truth(&self, expr: &Expr) -> Result<Truth, EvalError> {
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let l = self.eval_truth(left)?;
                // FALSE is absorbing for AND regardless of the right side.
                if l == Truth::False {
                    return Ok(Truth::False);
                }
                Ok(l.and(self.eval_truth(right)?))
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let l = self.eval_truth(left)?;
                if l == Truth::True {
                    return Ok(Truth::True);
                }
                Ok(l.or(self.eval_truth(right)?))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Ok(self.eval_truth(operand)?.negate()),
            Expr::Binary { op, left, right } if op.is_comparison() => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                compare_values(*op, &l, &r)
            }
            Expr::InList {
                target,
                candidates,
                negated,
            } => self.eval_in_list(target, candidates, *negated),
            Expr::Between {
                target,
                low,
                high,
                negated,
            } => {
                let t = self.eval_value(target)?;
                let lo = self.eval_value(low)?;
                let hi = self.eval_value(high)?;
                let ge = compare_values(BinaryOp::GtEq, &t, &lo)?;
                let le = compare_values(BinaryOp::LtEq, &t, &hi)?;
                let result = ge.and(le);
                Ok(if *negated { result.negate() } else { result })
            }
            Expr::Like {
                target,
                pattern,
                negated,
            } => {
                let t = self.eval_value(target)?;
                match t {
                    AttributeValue::Null => Ok(Truth::Unknown),
                    AttributeValue::String(s) => {
                        let matched = Truth::from(pattern.matches(&s));
                        Ok(if *negated { matched.negate() } else { matched })
                    }
                    other => Err(EvalError::type_mismatch(format!(
                        "LIKE requires a string target, got {} from {}",
                        other.type_name(),
                        target.describe(),
                    ))),
                }
            }
            Expr::IsNull { target, negated } => {
                // The only operator that observes nullness directly; always
                // yields a definite result.
                let is_null = self.eval_value(target)?.is_null();
                Ok(Truth::from(is_null != *negated))
            }
            // Anything else is a value expression used as a predicate,
            // e.g. a bare boolean column.
            other => match self.eval_value(other)? {
                AttributeValue::Bool(b) => Ok(Truth::from(b)),
                AttributeValue::Null => Ok(Truth::Unknown),
                value => Err(EvalError::type_mismatch(format!(
                    "expected a boolean predicate, got {} from {}",
                    value.type_name(),
                    other.describe(),
                ))),
            },
        }
    }

    /// Evaluate an expression in value position.
    fn eval_value(&self, expr: &Expr) -> Result<AttributeValue, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            // An absent attribute reads as NULL, same as a stored NULL.
            Expr::Column(name) => Ok(self
                .record
                .get(name)
                .cloned()
                .unwrap_or(AttributeValue::Null)),
            Expr::Now => Ok(AttributeValue::Number(self.clock.now_epoch_secs())),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let v = self.eval_value(operand)?;
                match v.as_number() {
                    Some(n) => Ok(AttributeValue::Number(-n)),
                    None => Err(EvalError::type_mismatch(format!(
                        "negation requires a numeric operand, got {} from {}",
                        v.type_name(),
                        operand.describe(),
                    ))),
                }
            }
            Expr::Binary { op, left, right } if op.is_arithmetic() => {
                self.eval_arithmetic(*op, left, right)
            }
            // A logical sub-expression in value position evaluates to its
            // truth value: TRUE/FALSE as booleans, UNKNOWN as NULL.
            other => Ok(match self.eval_truth(other)? {
                Truth::True => AttributeValue::Bool(true),
                Truth::False => AttributeValue::Bool(false),
                Truth::Unknown => AttributeValue::Null,
            }),
        }
    }

    fn eval_arithmetic(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<AttributeValue, EvalError> {
        let l = self.eval_value(left)?;
        let r = self.eval_value(right)?;

        let (Some(a), Some(b)) = (l.as_number(), r.as_number()) else {
            let (value, side) = if l.as_number().is_none() {
                (&l, left)
            } else {
                (&r, right)
            };
            return Err(EvalError::type_mismatch(format!(
                "arithmetic '{}' requires numeric operands, got {} from {}",
                op.symbol(),
                value.type_name(),
                side.describe(),
            )));
        };

        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => {
                if b == 0.0 {
                    return Err(EvalError::division_by_zero(format!(
                        "division by zero in {}",
                        right.describe(),
                    )));
                }
                a / b
            }
            // `is_arithmetic` guards the call sites.
            _ => {
                return Err(EvalError::type_mismatch(format!(
                    "'{}' is not an arithmetic operator",
                    op.symbol(),
                )))
            }
        };
        Ok(AttributeValue::Number(result))
    }

    fn eval_in_list(
        &self,
        target: &Expr,
        candidates: &[AttributeValue],
        negated: bool,
    ) -> Result<Truth, EvalError> {
        let t = self.eval_value(target)?;
        if t.is_null() {
            return Ok(Truth::Unknown);
        }

        // A NULL candidate or a type-mismatched candidate makes a miss
        // UNKNOWN rather than FALSE, mirroring SQL IN / NOT IN with NULLs.
        let mut indefinite = false;
        for candidate in candidates {
            match compare_values(BinaryOp::Eq, &t, candidate) {
                Ok(Truth::True) => {
                    return Ok(Truth::from(!negated));
                }
                Ok(Truth::False) => {}
                Ok(Truth::Unknown) => indefinite = true,
                Err(e) if e.kind == EvalErrorKind::TypeMismatch => {
                    indefinite = true;
                }
                Err(e) => return Err(e),
            }
        }

        if indefinite {
            Ok(Truth::Unknown)
        } else {
            Ok(Truth::from(negated))
        }
    }
}

/// Cross-type comparison policy. Number↔Number and String↔String compare
/// natively; Bool↔Bool supports equality only; every other non-NULL pairing
/// refuses silent coercion with a type-mismatch error.
pub fn compare_values(
    op: BinaryOp,
    left: &AttributeValue,
    right: &AttributeValue,
) -> Result<Truth, EvalError> {
    if left.is_null() || right.is_null() {
        return Ok(Truth::Unknown);
    }

    let ordering = match (left, right) {
        (AttributeValue::Number(a), AttributeValue::Number(b)) => match a.partial_cmp(b) {
            Some(ord) => ord,
            None => return Ok(Truth::Unknown),
        },
        // Ordinal byte-wise ordering, not locale-aware collation.
        (AttributeValue::String(a), AttributeValue::String(b)) => a.cmp(b),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => {
            return match op {
                BinaryOp::Eq => Ok(Truth::from(a == b)),
                BinaryOp::NotEq => Ok(Truth::from(a != b)),
                _ => Err(EvalError::type_mismatch(format!(
                    "ordering comparison '{}' is not defined for booleans",
                    op.symbol(),
                ))),
            };
        }
        (l, r) => {
            return Err(EvalError::type_mismatch(format!(
                "cannot compare {} to {}",
                l.type_name(),
                r.type_name(),
            )));
        }
    };

    let result = match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::NotEq => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::GtEq => ordering != Ordering::Less,
        other => {
            return Err(EvalError::type_mismatch(format!(
                "'{}' is not a comparison operator",
                other.symbol(),
            )));
        }
    };
    Ok(Truth::from(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_core::error::EvalErrorKind;

    fn rule(text: &str) -> Rule {
        Rule::parse(text).unwrap()
    }

    fn eval(text: &str, record: &UserRecord) -> Truth {
        evaluate(&rule(text), record).unwrap()
    }

    fn eval_err(text: &str, record: &UserRecord) -> EvalError {
        evaluate(&rule(text), record).unwrap_err()
    }

    #[test]
    fn test_absent_attribute_is_unknown() {
        let empty = UserRecord::new();
        assert_eq!(eval("age > 18", &empty), Truth::Unknown);
        // Unknown collapses to non-match at the boundary.
        assert!(!matches(&rule("age > 18"), &empty).unwrap());
    }

    #[test]
    fn test_is_null_on_absent_attribute() {
        let empty = UserRecord::new();
        assert_eq!(eval("age IS NULL", &empty), Truth::True);
        assert_eq!(eval("age IS NOT NULL", &empty), Truth::False);
    }

    #[test]
    fn test_explicit_null_matches_absent_semantics() {
        let record = UserRecord::new().with("age", AttributeValue::Null);
        assert_eq!(eval("age IS NULL", &record), Truth::True);
        assert_eq!(eval("age > 18", &record), Truth::Unknown);
    }

    #[test]
    fn test_numeric_comparisons() {
        let record = UserRecord::new().with("age", 21.0);
        assert_eq!(eval("age > 18", &record), Truth::True);
        assert_eq!(eval("age <= 18", &record), Truth::False);
        assert_eq!(eval("age = 21", &record), Truth::True);
        assert_eq!(eval("age != 21", &record), Truth::False);
        assert_eq!(eval("age <> 21", &record), Truth::False);
    }

    #[test]
    fn test_string_ordering_is_ordinal() {
        let record = UserRecord::new().with("name", "bob");
        assert_eq!(eval("name > 'alice'", &record), Truth::True);
        // Byte-wise: uppercase sorts before lowercase.
        assert_eq!(eval("name > 'Bob'", &record), Truth::True);
    }

    #[test]
    fn test_type_mismatch_instead_of_coercion() {
        let record = UserRecord::new().with("name", "bob");
        let err = eval_err("name > 5", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);

        // Equality across types refuses coercion too.
        let err = eval_err("name = 5", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_bool_comparisons() {
        let record = UserRecord::new().with("vip", true);
        assert_eq!(eval("vip = TRUE", &record), Truth::True);
        assert_eq!(eval("vip != FALSE", &record), Truth::True);
        let err = eval_err("vip > FALSE", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_bare_boolean_column_predicate() {
        let record = UserRecord::new().with("vip", true);
        assert_eq!(eval("vip", &record), Truth::True);
        assert_eq!(eval("NOT vip", &record), Truth::False);
        assert_eq!(eval("vip", &UserRecord::new()), Truth::Unknown);

        let record = UserRecord::new().with("vip", "yes");
        let err = eval_err("vip", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_three_valued_and_or() {
        let record = UserRecord::new().with("a", true);
        // b is absent: UNKNOWN.
        assert_eq!(eval("a AND b", &record), Truth::Unknown);
        assert_eq!(eval("a OR b", &record), Truth::True);
        assert_eq!(eval("NOT b", &record), Truth::Unknown);

        let record = UserRecord::new().with("a", false);
        assert_eq!(eval("a AND b", &record), Truth::False);
        assert_eq!(eval("a OR b", &record), Truth::Unknown);
    }

    #[test]
    fn test_and_short_circuits_on_false() {
        // The right side would be a type error, but FALSE absorbs first.
        let record = UserRecord::new().with("a", false).with("name", "bob");
        assert_eq!(eval("a AND name > 5", &record), Truth::False);
    }

    #[test]
    fn test_in_list() {
        let record = UserRecord::new().with("country", "US");
        assert_eq!(eval("country IN ('US','CA')", &record), Truth::True);
        assert_eq!(eval("country IN ('DE','FR')", &record), Truth::False);
        assert_eq!(eval("country NOT IN ('DE','FR')", &record), Truth::True);
        assert_eq!(eval("country NOT IN ('US')", &record), Truth::False);
    }

    #[test]
    fn test_in_list_null_target_is_unknown() {
        let empty = UserRecord::new();
        assert_eq!(eval("country IN ('US','CA')", &empty), Truth::Unknown);
        assert_eq!(eval("country NOT IN ('US','CA')", &empty), Truth::Unknown);
    }

    #[test]
    fn test_in_list_conservative_unknown() {
        // Miss plus a type-mismatched candidate: UNKNOWN, not FALSE.
        let record = UserRecord::new().with("country", "US");
        assert_eq!(eval("country IN ('DE', 7)", &record), Truth::Unknown);
        // Miss plus a NULL candidate: UNKNOWN.
        assert_eq!(eval("country IN ('DE', NULL)", &record), Truth::Unknown);
        // A definite hit wins even with odd candidates present.
        assert_eq!(eval("country IN ('US', NULL, 7)", &record), Truth::True);
        // NOT IN propagates the UNKNOWN unchanged.
        assert_eq!(eval("country NOT IN ('DE', NULL)", &record), Truth::Unknown);
    }

    #[test]
    fn test_between() {
        let record = UserRecord::new().with("score", 15.0);
        assert_eq!(eval("score BETWEEN 10 AND 20", &record), Truth::True);
        assert_eq!(eval("score NOT BETWEEN 10 AND 20", &record), Truth::False);

        let record = UserRecord::new().with("score", 25.0);
        assert_eq!(eval("score BETWEEN 10 AND 20", &record), Truth::False);
        assert_eq!(eval("score NOT BETWEEN 10 AND 20", &record), Truth::True);

        // Bounds are inclusive.
        let record = UserRecord::new().with("score", 10.0);
        assert_eq!(eval("score BETWEEN 10 AND 20", &record), Truth::True);

        // NULL target propagates UNKNOWN, negated too.
        let empty = UserRecord::new();
        assert_eq!(eval("score BETWEEN 10 AND 20", &empty), Truth::Unknown);
        assert_eq!(eval("score NOT BETWEEN 10 AND 20", &empty), Truth::Unknown);
    }

    #[test]
    fn test_between_type_mismatch_is_hard_error() {
        let record = UserRecord::new().with("score", "high");
        let err = eval_err("score BETWEEN 10 AND 20", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_like() {
        let record = UserRecord::new().with("email", "a@example.com");
        assert_eq!(eval("email LIKE '%@example.com'", &record), Truth::True);
        assert_eq!(eval("email LIKE '%@other.com'", &record), Truth::False);
        assert_eq!(eval("email NOT LIKE '%@other.com'", &record), Truth::True);
        assert_eq!(eval("email LIKE 'a@_______.com'", &record), Truth::True);

        assert_eq!(eval("email LIKE '%'", &UserRecord::new()), Truth::Unknown);

        let record = UserRecord::new().with("email", 5.0);
        let err = eval_err("email LIKE '%'", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_arithmetic() {
        let record = UserRecord::new().with("price", 10.0).with("discount", 3.0);
        assert_eq!(eval("price - discount > 0", &record), Truth::True);
        assert_eq!(eval("price * 2 = 20", &record), Truth::True);
        assert_eq!(eval("price / 4 = 2.5", &record), Truth::True);
        assert_eq!(eval("-price < 0", &record), Truth::True);
    }

    #[test]
    fn test_arithmetic_type_mismatch() {
        let record = UserRecord::new().with("price", "x").with("discount", 3.0);
        let err = eval_err("price - discount > 0", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);

        // NULL operands are a type error too, by policy.
        let record = UserRecord::new().with("discount", 3.0);
        let err = eval_err("price - discount > 0", &record);
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn test_division_by_zero() {
        let record = UserRecord::new().with("total", 100.0).with("count", 0.0);
        let err = eval_err("total / count > 1", &record);
        assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    }

    #[test]
    fn test_eval_error_does_not_poison_rule() {
        let r = rule("price - discount > 0");
        let bad = UserRecord::new().with("price", "x").with("discount", 3.0);
        let good = UserRecord::new().with("price", 10.0).with("discount", 3.0);

        assert!(evaluate(&r, &bad).is_err());
        // The same rule evaluates cleanly against the next record.
        assert_eq!(evaluate(&r, &good).unwrap(), Truth::True);
    }

    #[test]
    fn test_now_with_fixed_clock() {
        let clock = FixedClock(1_700_000_000);
        let r = rule("last_session >= _now() - 86400");

        let recent = UserRecord::new().with("last_session", 1_699_990_000.0);
        assert!(matches_with_clock(&r, &recent, &clock).unwrap());

        let stale = UserRecord::new().with("last_session", 1_600_000_000.0);
        assert!(!matches_with_clock(&r, &stale, &clock).unwrap());
    }

    #[test]
    fn test_parenthesized_predicate_as_value() {
        // A grouped predicate compares as a boolean value.
        let record = UserRecord::new().with("age", 30.0);
        assert_eq!(eval("(age > 18) = TRUE", &record), Truth::True);
        assert_eq!(eval("(age > 18) = FALSE", &record), Truth::False);
    }

    #[test]
    fn test_precedence_end_to_end() {
        // a = 1 OR (b = 2 AND c = 3)
        let r = rule("a = 1 OR b = 2 AND c = 3");

        let only_a = UserRecord::new().with("a", 1.0).with("b", 0.0).with("c", 0.0);
        assert!(matches(&r, &only_a).unwrap());

        let b_and_c = UserRecord::new().with("a", 0.0).with("b", 2.0).with("c", 3.0);
        assert!(matches(&r, &b_and_c).unwrap());

        let only_b = UserRecord::new().with("a", 0.0).with("b", 2.0).with("c", 0.0);
        assert!(!matches(&r, &only_b).unwrap());
    }
}
