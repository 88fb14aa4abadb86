//! FILENAME: engine/src/expression.rs
//! PURPOSE: The expression tree evaluated against one row at a time.
//! CONTEXT: Expressions are built programmatically (there is no text formula
//! parser at this layer) and appear inside filter, calculate, aggregate and
//! pivot configurations. Evaluation lives in `evaluator.rs`; this file owns
//! the tree shape and its display form, which doubles as the default name
//! for derived columns.

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::functions::Function;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Numeric negation.
    Negate,
    /// Strict boolean inversion.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    /// Text concatenation.
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Concat => "&",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }
}

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A constant value.
    Literal(Value),
    /// A reference to a column of the current row, by name.
    Column(Column),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// A call to a built-in function.
    Call {
        function: Function,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(Column::new(name))
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary { op, operand: Box::new(operand) }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(function: Function, args: Vec<Expression>) -> Self {
        Expression::Call { function, args }
    }

    /// Collects the column names this expression reads, in first-use order
    /// without duplicates. Lets a caller check a configuration against a
    /// schema before any row work starts.
    pub fn referenced_columns(&self) -> Vec<Column> {
        let mut out: Vec<Column> = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<Column>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Column(c) => {
                if !out.contains(c) {
                    out.push(c.clone());
                }
            }
            Expression::Unary { operand, .. } => operand.collect_columns(out),
            Expression::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expression::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// True for nodes that print without needing parentheses as an operand.
    fn is_primary(&self) -> bool {
        matches!(
            self,
            Expression::Literal(_) | Expression::Column(_) | Expression::Call { .. }
        )
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(Value::Text(s)) => write!(f, "\"{}\"", s),
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Column(c) => write!(f, "{}", c),
            Expression::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOperator::Negate => "-",
                    UnaryOperator::Not => "not ",
                };
                if operand.is_primary() {
                    write!(f, "{}{}", symbol, operand)
                } else {
                    write!(f, "{}({})", symbol, operand)
                }
            }
            Expression::Binary { op, left, right } => {
                if left.is_primary() {
                    write!(f, "{}", left)?;
                } else {
                    write!(f, "({})", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                if right.is_primary() {
                    write!(f, "{}", right)
                } else {
                    write!(f, "({})", right)
                }
            }
            Expression::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
