//! FILENAME: engine/src/functions.rs
//! PURPOSE: The built-in function library available inside expressions.
//! CONTEXT: Every function is total over `Value` arguments: wrong arity,
//! non-coercible arguments or out-of-range indices produce `Value::Invalid`
//! instead of an error. String positions count extended grapheme clusters,
//! never bytes, so multi-scalar glyphs are indexed as single characters.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::value::Value;

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Between(usize, usize),
    /// Any number of arguments, including zero.
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == *n,
            Arity::Between(lo, hi) => count >= *lo && count <= *hi,
            Arity::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    // Numeric reducers.
    Sum,
    Average,
    Min,
    Max,
    Count,
    // Numeric scalars.
    Abs,
    Round,
    Floor,
    Ceiling,
    Sqrt,
    Power,
    Mod,
    // Text.
    Length,
    Upper,
    Lower,
    Trim,
    Concatenate,
    Left,
    Right,
    Mid,
    // Logic.
    If,
    And,
    Or,
    Not,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Sum => "sum",
            Function::Average => "average",
            Function::Min => "min",
            Function::Max => "max",
            Function::Count => "count",
            Function::Abs => "abs",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::Sqrt => "sqrt",
            Function::Power => "power",
            Function::Mod => "mod",
            Function::Length => "length",
            Function::Upper => "upper",
            Function::Lower => "lower",
            Function::Trim => "trim",
            Function::Concatenate => "concatenate",
            Function::Left => "left",
            Function::Right => "right",
            Function::Mid => "mid",
            Function::If => "if",
            Function::And => "and",
            Function::Or => "or",
            Function::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<Function> {
        let lowered = name.to_ascii_lowercase();
        let f = match lowered.as_str() {
            "sum" => Function::Sum,
            "average" => Function::Average,
            "min" => Function::Min,
            "max" => Function::Max,
            "count" => Function::Count,
            "abs" => Function::Abs,
            "round" => Function::Round,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "sqrt" => Function::Sqrt,
            "power" => Function::Power,
            "mod" => Function::Mod,
            "length" => Function::Length,
            "upper" => Function::Upper,
            "lower" => Function::Lower,
            "trim" => Function::Trim,
            "concatenate" => Function::Concatenate,
            "left" => Function::Left,
            "right" => Function::Right,
            "mid" => Function::Mid,
            "if" => Function::If,
            "and" => Function::And,
            "or" => Function::Or,
            "not" => Function::Not,
            _ => return None,
        };
        Some(f)
    }

    pub fn arity(&self) -> Arity {
        match self {
            Function::Sum
            | Function::Average
            | Function::Min
            | Function::Max
            | Function::Concatenate => Arity::Between(1, usize::MAX),
            Function::Count | Function::And | Function::Or => Arity::Any,
            Function::Abs
            | Function::Sqrt
            | Function::Floor
            | Function::Ceiling
            | Function::Length
            | Function::Upper
            | Function::Lower
            | Function::Trim
            | Function::Not => Arity::Fixed(1),
            Function::Round => Arity::Between(1, 2),
            Function::Power | Function::Mod | Function::Left | Function::Right => {
                Arity::Fixed(2)
            }
            Function::Mid | Function::If => Arity::Fixed(3),
        }
    }

    /// Applies the function to already-evaluated arguments.
    ///
    /// # Returns
    /// The result value, or `Value::Invalid` when the arity is wrong, an
    /// argument does not coerce to the required type, or a position falls
    /// outside the text. `And`/`Or` are the exception: they never produce
    /// `Invalid` because non-boolean arguments simply count as non-matches.
    pub fn call(&self, args: &[Value]) -> Value {
        if !self.arity().accepts(args.len()) {
            return Value::Invalid;
        }
        // And/Or tolerate Invalid arguments (a non-match); everything else
        // absorbs them.
        if !matches!(self, Function::And | Function::Or)
            && args.iter().any(Value::is_invalid)
        {
            return Value::Invalid;
        }
        match self {
            Function::Sum => fold_doubles(args, |acc, d| acc + d, 0.0),
            Function::Average => match collect_doubles(args) {
                Some(ds) => Value::Double(ds.iter().sum::<f64>() / ds.len() as f64),
                None => Value::Invalid,
            },
            Function::Min => reduce_by_order(args, std::cmp::Ordering::Less),
            Function::Max => reduce_by_order(args, std::cmp::Ordering::Greater),
            Function::Count => {
                let n = args.iter().filter(|v| !v.is_empty()).count();
                Value::Integer(n as i64)
            }
            Function::Abs => map_double(&args[0], f64::abs),
            Function::Sqrt => match args[0].as_double() {
                Some(d) if d >= 0.0 => Value::Double(d.sqrt()),
                _ => Value::Invalid,
            },
            Function::Floor => map_double(&args[0], f64::floor),
            Function::Ceiling => map_double(&args[0], f64::ceil),
            Function::Round => {
                let digits = if args.len() == 2 {
                    match integer_arg(&args[1]) {
                        Some(d) if (-15..=15).contains(&d) => d,
                        _ => return Value::Invalid,
                    }
                } else {
                    0
                };
                match args[0].as_double() {
                    Some(d) => {
                        let factor = 10f64.powi(digits as i32);
                        Value::Double((d * factor).round() / factor)
                    }
                    None => Value::Invalid,
                }
            }
            Function::Power => binary_double(&args[0], &args[1], f64::powf),
            Function::Mod => match (args[0].as_double(), args[1].as_double()) {
                (Some(_), Some(b)) if b == 0.0 => Value::Invalid,
                (Some(a), Some(b)) => Value::Double(a.rem_euclid(b)),
                _ => Value::Invalid,
            },
            Function::Length => match &args[0] {
                Value::Text(s) => Value::Integer(s.graphemes(true).count() as i64),
                Value::Empty => Value::Integer(0),
                _ => Value::Invalid,
            },
            Function::Upper => map_text(&args[0], |s| s.to_uppercase()),
            Function::Lower => map_text(&args[0], |s| s.to_lowercase()),
            Function::Trim => map_text(&args[0], |s| s.trim().to_string()),
            Function::Concatenate => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&arg.display());
                }
                Value::Text(out)
            }
            Function::Left => take_graphemes(&args[0], &args[1], false),
            Function::Right => take_graphemes(&args[0], &args[1], true),
            Function::Mid => mid(&args[0], &args[1], &args[2]),
            Function::If => match args[0].as_boolean() {
                Some(true) => args[1].clone(),
                Some(false) => args[2].clone(),
                None => Value::Invalid,
            },
            Function::And => {
                for arg in args {
                    if arg.as_boolean() != Some(true) {
                        return Value::Boolean(false);
                    }
                }
                Value::Boolean(true)
            }
            Function::Or => {
                for arg in args {
                    if arg.as_boolean() == Some(true) {
                        return Value::Boolean(true);
                    }
                }
                Value::Boolean(false)
            }
            Function::Not => match args[0].as_boolean() {
                Some(b) => Value::Boolean(!b),
                None => Value::Invalid,
            },
        }
    }
}

fn collect_doubles(args: &[Value]) -> Option<Vec<f64>> {
    args.iter().map(Value::as_double).collect()
}

fn fold_doubles(args: &[Value], op: fn(f64, f64) -> f64, init: f64) -> Value {
    let mut acc = init;
    for arg in args {
        match arg.as_double() {
            Some(d) => acc = op(acc, d),
            None => return Value::Invalid,
        }
    }
    Value::Double(acc)
}

fn reduce_by_order(args: &[Value], keep: std::cmp::Ordering) -> Value {
    let mut best: Option<f64> = None;
    for arg in args {
        let d = match arg.as_double() {
            Some(d) => d,
            None => return Value::Invalid,
        };
        best = Some(match best {
            Some(b) if d.partial_cmp(&b) == Some(keep) => d,
            Some(b) => b,
            None => d,
        });
    }
    match best {
        Some(d) => Value::Double(d),
        None => Value::Invalid,
    }
}

fn map_double(arg: &Value, op: fn(f64) -> f64) -> Value {
    match arg.as_double() {
        Some(d) => Value::Double(op(d)),
        None => Value::Invalid,
    }
}

fn binary_double(a: &Value, b: &Value, op: fn(f64, f64) -> f64) -> Value {
    match (a.as_double(), b.as_double()) {
        (Some(a), Some(b)) => Value::Double(op(a, b)),
        _ => Value::Invalid,
    }
}

fn map_text(arg: &Value, op: impl Fn(&str) -> String) -> Value {
    match arg {
        Value::Text(s) => Value::Text(op(s)),
        Value::Empty => Value::Text(String::new()),
        _ => Value::Invalid,
    }
}

fn integer_arg(arg: &Value) -> Option<i64> {
    match arg {
        Value::Integer(i) => Some(*i),
        Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
        _ => None,
    }
}

/// Shared body of `left` and `right`. The count must name an existing
/// prefix or suffix: a negative count, or one longer than the text, is
/// out of range and yields `Invalid` rather than clamping.
fn take_graphemes(text: &Value, count: &Value, from_end: bool) -> Value {
    let s = match text {
        Value::Text(s) => s.as_str(),
        _ => return Value::Invalid,
    };
    let n = match integer_arg(count) {
        Some(n) if n >= 0 => n as usize,
        _ => return Value::Invalid,
    };
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    if n > graphemes.len() {
        return Value::Invalid;
    }
    let slice = if from_end {
        &graphemes[graphemes.len() - n..]
    } else {
        &graphemes[..n]
    };
    Value::Text(slice.concat())
}

/// `mid(text, start, count)` with a 1-based start. The requested range
/// must lie entirely inside the text.
fn mid(text: &Value, start: &Value, count: &Value) -> Value {
    let s = match text {
        Value::Text(s) => s.as_str(),
        _ => return Value::Invalid,
    };
    let start = match integer_arg(start) {
        Some(v) if v >= 1 => (v - 1) as usize,
        _ => return Value::Invalid,
    };
    let count = match integer_arg(count) {
        Some(v) if v >= 0 => v as usize,
        _ => return Value::Invalid,
    };
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    match start.checked_add(count) {
        Some(end) if end <= graphemes.len() => Value::Text(graphemes[start..end].concat()),
        _ => Value::Invalid,
    }
}
