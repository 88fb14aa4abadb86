//! FILENAME: engine/src/value.rs
//! PURPOSE: Defines the typed scalar value that flows through every table cell.
//! CONTEXT: This file contains the `Value` enum, its coercion helpers and the
//! single total ordering rule used by comparisons and sorting. `Invalid` is
//! the value-level error signal: it absorbs through every operation instead
//! of raising, and is distinct from the operational failure channel.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A typed scalar held in one cell of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Empty,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    /// The value-level error signal (bad arity, type mismatch, out-of-range
    /// index). Propagates through expressions like a NaN; never aborts a
    /// stream or job.
    Invalid,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns true if this value is the `Invalid` marker.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    /// Returns true if this value is `Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Attempts to coerce the value to a double.
    /// Integers widen, booleans map to 1/0, text is parsed after trimming.
    /// `Empty` and `Invalid` do not coerce.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Empty | Value::Invalid => None,
        }
    }

    /// Strict boolean access: only `Boolean` values answer.
    /// The logic functions deliberately perform no implicit coercion,
    /// so a non-boolean argument counts as a non-match there.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the display text of the value.
    /// Whole doubles print without a decimal point so that `Double(5.0)`
    /// and `Integer(5)` read the same.
    pub fn display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Double(d) => {
                if d.fract() == 0.0 && d.abs() < 1e15 {
                    format!("{:.0}", d)
                } else {
                    format!("{}", d)
                }
            }
            Value::Text(s) => s.clone(),
            Value::Invalid => "#INVALID".to_string(),
        }
    }

    /// Rank used by the cross-type total order. Documented once, used by
    /// `total_cmp` only.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Empty => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::Text(_) => 3,
            Value::Invalid => 4,
        }
    }

    /// The total ordering over all values, mixing types by a fixed
    /// type-rank-then-value rule:
    ///
    ///   Empty < Boolean (false < true) < numbers < Text < Invalid
    ///
    /// Integers and doubles compare numerically within the number rank
    /// (so `Integer(2)` and `Double(2.0)` are order-equal); NaN sorts
    /// after every other number. Text compares lexicographically by
    /// Unicode scalar value. This is the comparison used by the `<`/`>`
    /// operators and by every sort in the engine.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        let (ra, rb) = (self.type_rank(), other.type_rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Value::Empty, Value::Empty) => Ordering::Equal,
            (Value::Invalid, Value::Invalid) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => {
                // Both are numbers here; compare as doubles.
                let a = self.as_double().unwrap_or(f64::NAN);
                let b = other.as_double().unwrap_or(f64::NAN);
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                }
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// An ordered sequence of values. Length and positional meaning come from
/// the schema (`Vec<Column>`) the row travels with; a row is meaningless
/// without its schema.
pub type Row = Vec<Value>;
