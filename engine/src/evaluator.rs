//! FILENAME: engine/src/evaluator.rs
//! PURPOSE: Evaluates expression trees against one row at a time.
//! CONTEXT: The evaluator is bound to a schema once and then applied to many
//! rows, which is the shape every step needs (resolve names once, stream
//! rows through). Evaluation is total: it always produces a `Value`, with
//! `Invalid` standing in for anything that would otherwise be an error.

use crate::column::Column;
use crate::expression::{BinaryOperator, Expression, UnaryOperator};
use crate::value::{Row, Value};

/// Evaluates expressions against rows of a fixed schema.
pub struct Evaluator<'a> {
    columns: &'a [Column],
}

impl<'a> Evaluator<'a> {
    pub fn new(columns: &'a [Column]) -> Self {
        Evaluator { columns }
    }

    /// Evaluates `expr` against `row`, which must be positionally aligned
    /// with the schema this evaluator was built over. A reference to a
    /// column the schema does not contain evaluates to `Invalid`.
    pub fn evaluate(&self, expr: &Expression, row: &Row) -> Value {
        match expr {
            Expression::Literal(v) => v.clone(),
            Expression::Column(c) => {
                match self.columns.iter().position(|col| col == c) {
                    Some(i) => row.get(i).cloned().unwrap_or(Value::Empty),
                    None => Value::Invalid,
                }
            }
            Expression::Unary { op, operand } => {
                let v = self.evaluate(operand, row);
                apply_unary(*op, v)
            }
            Expression::Binary { op, left, right } => {
                let l = self.evaluate(left, row);
                let r = self.evaluate(right, row);
                apply_binary(*op, l, r)
            }
            Expression::Call { function, args } => {
                let values: Vec<Value> =
                    args.iter().map(|a| self.evaluate(a, row)).collect();
                function.call(&values)
            }
        }
    }

    /// Evaluates a filter predicate. Only a literal `Boolean(true)` result
    /// keeps the row; false, invalid and non-boolean results all drop it.
    pub fn matches(&self, predicate: &Expression, row: &Row) -> bool {
        self.evaluate(predicate, row) == Value::Boolean(true)
    }
}

fn apply_unary(op: UnaryOperator, v: Value) -> Value {
    if v.is_invalid() {
        return Value::Invalid;
    }
    match op {
        UnaryOperator::Negate => match v.as_double() {
            Some(d) => Value::Double(-d),
            None => Value::Invalid,
        },
        UnaryOperator::Not => match v.as_boolean() {
            Some(b) => Value::Boolean(!b),
            None => Value::Invalid,
        },
    }
}

fn apply_binary(op: BinaryOperator, l: Value, r: Value) -> Value {
    // Invalid absorbs through every operator, comparisons included. Sorting
    // is the one place invalids order instead of propagating.
    if l.is_invalid() || r.is_invalid() {
        return Value::Invalid;
    }
    match op {
        BinaryOperator::Add => arithmetic(&l, &r, |a, b| Some(a + b)),
        BinaryOperator::Subtract => arithmetic(&l, &r, |a, b| Some(a - b)),
        BinaryOperator::Multiply => arithmetic(&l, &r, |a, b| Some(a * b)),
        BinaryOperator::Divide => {
            arithmetic(&l, &r, |a, b| if b == 0.0 { None } else { Some(a / b) })
        }
        BinaryOperator::Power => arithmetic(&l, &r, |a, b| Some(a.powf(b))),
        BinaryOperator::Concat => Value::Text(format!("{}{}", l.display(), r.display())),
        BinaryOperator::Equal => Value::Boolean(l.total_cmp(&r).is_eq()),
        BinaryOperator::NotEqual => Value::Boolean(!l.total_cmp(&r).is_eq()),
        BinaryOperator::LessThan => Value::Boolean(l.total_cmp(&r).is_lt()),
        BinaryOperator::LessEqual => Value::Boolean(l.total_cmp(&r).is_le()),
        BinaryOperator::GreaterThan => Value::Boolean(l.total_cmp(&r).is_gt()),
        BinaryOperator::GreaterEqual => Value::Boolean(l.total_cmp(&r).is_ge()),
    }
}

fn arithmetic(l: &Value, r: &Value, op: impl Fn(f64, f64) -> Option<f64>) -> Value {
    match (l.as_double(), r.as_double()) {
        (Some(a), Some(b)) => match op(a, b) {
            Some(d) => Value::Double(d),
            None => Value::Invalid,
        },
        _ => Value::Invalid,
    }
}
