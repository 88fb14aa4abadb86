//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the tabular value engine.
//! CONTEXT: Re-exports the value model, expression evaluation and the
//! whole-table reshaping operations for use by the streaming layers.

pub mod column;
pub mod evaluator;
pub mod expression;
pub mod functions;
pub mod raster;
pub mod reshape;
pub mod value;

// Re-export commonly used types at the crate root
pub use column::{column_index, disambiguate, unique_schema, Column};
pub use evaluator::Evaluator;
pub use expression::{BinaryOperator, Expression, UnaryOperator};
pub use functions::{Arity, Function};
pub use raster::{Raster, SortDirection};
pub use reshape::{
    aggregate, flatten, pivot, Accumulator, AggregateField, Aggregation, FlattenOptions,
    GroupKey, PivotValueField,
};
pub use value::{Row, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Raster {
        Raster::new(
            vec![
                Column::new("item"),
                Column::new("price"),
                Column::new("qty"),
            ],
            vec![
                vec![Value::text("pen"), Value::Double(2.5), Value::Integer(4)],
                vec![Value::text("ink"), Value::Double(9.0), Value::Integer(1)],
                vec![Value::text("pad"), Value::Double(1.0), Value::Integer(10)],
            ],
        )
    }

    #[test]
    fn it_evaluates_rows() {
        let raster = orders();
        let evaluator = Evaluator::new(raster.column_names());
        let total = Expression::binary(
            BinaryOperator::Multiply,
            Expression::column("price"),
            Expression::column("qty"),
        );
        let results: Vec<Value> = raster
            .rows()
            .iter()
            .map(|row| evaluator.evaluate(&total, row))
            .collect();
        assert_eq!(
            results,
            vec![Value::Double(10.0), Value::Double(9.0), Value::Double(10.0)]
        );
    }

    #[test]
    fn integration_test_filter_then_aggregate() {
        let raster = orders();
        let evaluator = Evaluator::new(raster.column_names());
        let cheap = Expression::binary(
            BinaryOperator::LessThan,
            Expression::column("price"),
            Expression::literal(Value::Integer(5)),
        );

        let kept: Vec<Row> = raster
            .rows()
            .iter()
            .filter(|row| evaluator.matches(&cheap, row))
            .cloned()
            .collect();
        let filtered = Raster::new(raster.column_names().to_vec(), kept);
        assert_eq!(filtered.row_count(), 2);

        let totals = aggregate(
            &filtered,
            &[],
            &[AggregateField {
                expr: Expression::column("qty"),
                aggregation: Aggregation::Sum,
            }],
        );
        assert_eq!(totals.rows()[0], vec![Value::Double(14.0)]);
    }

    #[test]
    fn integration_test_sort_limit_transpose() {
        let sorted = orders().sorted_by(&[(1, SortDirection::Descending)]);
        let top = sorted.limit(2);
        assert_eq!(top.rows()[0][0], Value::text("ink"));

        let transposed = top.transpose();
        let names: Vec<&str> =
            transposed.column_names().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["item", "ink", "pen"]);
        assert_eq!(transposed.transpose(), top);
    }

    #[test]
    fn integration_test_invalid_stays_a_value() {
        let raster = Raster::new(
            vec![Column::new("n")],
            vec![vec![Value::text("not a number")]],
        );
        let evaluator = Evaluator::new(raster.column_names());
        let expr = Expression::binary(
            BinaryOperator::Divide,
            Expression::column("n"),
            Expression::literal(Value::Integer(2)),
        );
        // The bad cell produces Invalid; nothing panics or errors.
        assert_eq!(evaluator.evaluate(&expr, &raster.rows()[0]), Value::Invalid);
    }
}
