//! FILENAME: engine/src/reshape.rs
//! PURPOSE: Whole-table reshaping: aggregate, pivot and flatten.
//! CONTEXT: These operations need every row before they can emit anything,
//! so they work on rasters rather than streams. Grouping uses a hashed key
//! wrapper because raw values cannot be map keys (doubles), with equality
//! and hashing agreeing with the engine's total order so that `Integer(2)`
//! and `Double(2.0)` land in the same group. Group and column orders are
//! first-seen, which keeps output deterministic for a given input order.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::column::{disambiguate, Column};
use crate::evaluator::Evaluator;
use crate::expression::Expression;
use crate::raster::Raster;
use crate::value::{Row, Value};

// ============================================================================
// Group keys
// ============================================================================

/// A tuple of values usable as a hash map key. Equality follows
/// `Value::total_cmp`, so numerically equal integers and doubles coincide;
/// hashing canonicalizes numbers (and zero signs, and NaNs) to match.
#[derive(Debug, Clone)]
pub struct GroupKey(SmallVec<[Value; 4]>);

impl GroupKey {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        GroupKey(values.into_iter().collect())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.total_cmp(b).is_eq())
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            match value {
                Value::Empty => state.write_u8(0),
                Value::Boolean(b) => {
                    state.write_u8(1);
                    b.hash(state);
                }
                Value::Integer(_) | Value::Double(_) => {
                    state.write_u8(2);
                    // Must agree with total_cmp equality across the two
                    // numeric variants and across 0.0 / -0.0.
                    let d = value.as_double().unwrap_or(f64::NAN);
                    let bits = if d == 0.0 {
                        0f64.to_bits()
                    } else if d.is_nan() {
                        f64::NAN.to_bits()
                    } else {
                        d.to_bits()
                    };
                    state.write_u64(bits);
                }
                Value::Text(s) => {
                    state.write_u8(3);
                    s.hash(state);
                }
                Value::Invalid => state.write_u8(4),
            }
        }
    }
}

// ============================================================================
// Accumulators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Count,
    Average,
    Min,
    Max,
    Product,
}

impl Aggregation {
    pub fn label(&self) -> &'static str {
        match self {
            Aggregation::Sum => "Sum",
            Aggregation::Count => "Count",
            Aggregation::Average => "Average",
            Aggregation::Min => "Min",
            Aggregation::Max => "Max",
            Aggregation::Product => "Product",
        }
    }
}

/// Streaming accumulator for one aggregation over one group.
///
/// `Count` counts non-empty values of any type; `Min`/`Max` use the total
/// order (so text participates); the numeric aggregations fold coercible
/// values and skip text that does not parse. An `Invalid` input poisons the
/// accumulator, so errors surface in the output instead of vanishing into
/// a group total.
#[derive(Debug, Clone)]
pub struct Accumulator {
    aggregation: Aggregation,
    count: u64,
    sum: f64,
    product: f64,
    least: Option<Value>,
    greatest: Option<Value>,
    poisoned: bool,
}

impl Accumulator {
    pub fn new(aggregation: Aggregation) -> Self {
        Accumulator {
            aggregation,
            count: 0,
            sum: 0.0,
            product: 1.0,
            least: None,
            greatest: None,
            poisoned: false,
        }
    }

    pub fn update(&mut self, value: &Value) {
        if value.is_invalid() {
            self.poisoned = true;
            return;
        }
        if value.is_empty() {
            return;
        }
        match self.aggregation {
            Aggregation::Count => self.count += 1,
            Aggregation::Min => {
                let replace = match &self.least {
                    Some(current) => value.total_cmp(current).is_lt(),
                    None => true,
                };
                if replace {
                    self.least = Some(value.clone());
                }
            }
            Aggregation::Max => {
                let replace = match &self.greatest {
                    Some(current) => value.total_cmp(current).is_gt(),
                    None => true,
                };
                if replace {
                    self.greatest = Some(value.clone());
                }
            }
            Aggregation::Sum | Aggregation::Average | Aggregation::Product => {
                if let Some(d) = value.as_double() {
                    self.count += 1;
                    self.sum += d;
                    self.product *= d;
                }
            }
        }
    }

    pub fn finish(&self) -> Value {
        if self.poisoned {
            return Value::Invalid;
        }
        match self.aggregation {
            Aggregation::Count => Value::Integer(self.count as i64),
            Aggregation::Sum => Value::Double(self.sum),
            Aggregation::Average => {
                if self.count == 0 {
                    Value::Empty
                } else {
                    Value::Double(self.sum / self.count as f64)
                }
            }
            Aggregation::Product => {
                if self.count == 0 {
                    Value::Empty
                } else {
                    Value::Double(self.product)
                }
            }
            Aggregation::Min => self.least.clone().unwrap_or(Value::Empty),
            Aggregation::Max => self.greatest.clone().unwrap_or(Value::Empty),
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// One output column of an aggregation: an expression evaluated per row and
/// the reduction applied to it within each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateField {
    pub expr: Expression,
    pub aggregation: Aggregation,
}

impl AggregateField {
    /// Default output column label, e.g. "Sum of price * qty".
    pub fn label(&self) -> String {
        format!("{} of {}", self.aggregation.label(), self.expr)
    }
}

/// Groups rows by the `groups` expressions and reduces each `fields`
/// expression within every group. Groups appear in first-seen order. With
/// no group expressions the whole input is one grand-total group, which is
/// emitted even for an empty input.
pub fn aggregate(source: &Raster, groups: &[Expression], fields: &[AggregateField]) -> Raster {
    let evaluator = Evaluator::new(source.column_names());

    let mut order: Vec<GroupKey> = Vec::new();
    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut accumulators: Vec<Vec<Accumulator>> = Vec::new();

    let mut ensure_group = |key: GroupKey,
                            order: &mut Vec<GroupKey>,
                            accumulators: &mut Vec<Vec<Accumulator>>|
     -> usize {
        if let Some(&i) = index.get(&key) {
            return i;
        }
        let i = order.len();
        index.insert(key.clone(), i);
        order.push(key);
        accumulators.push(fields.iter().map(|f| Accumulator::new(f.aggregation)).collect());
        i
    };

    if groups.is_empty() {
        ensure_group(GroupKey::new([]), &mut order, &mut accumulators);
    }

    for row in source.rows() {
        let key = GroupKey::new(groups.iter().map(|g| evaluator.evaluate(g, row)));
        let i = ensure_group(key, &mut order, &mut accumulators);
        for (field, accumulator) in fields.iter().zip(accumulators[i].iter_mut()) {
            accumulator.update(&evaluator.evaluate(&field.expr, row));
        }
    }

    let mut columns: Vec<Column> = Vec::new();
    for group in groups {
        let column = disambiguate(&columns, &group.to_string());
        columns.push(column);
    }
    for field in fields {
        let column = disambiguate(&columns, &field.label());
        columns.push(column);
    }

    let rows: Vec<Row> = order
        .iter()
        .zip(accumulators.iter())
        .map(|(key, accs)| {
            let mut row: Row = key.values().to_vec();
            row.extend(accs.iter().map(Accumulator::finish));
            row
        })
        .collect();

    let mut out = Raster::new(columns, rows);
    if source.is_partial() {
        out.mark_partial();
    }
    out
}

// ============================================================================
// Pivot
// ============================================================================

/// One value placement of a pivot: a source column position and the
/// reduction applied to it inside each cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotValueField {
    pub column: usize,
    pub aggregation: Aggregation,
}

/// Cross-tabulates the source. Distinct `row_fields` tuples become output
/// rows and distinct `column_fields` tuples spawn one output column per
/// value field, both in first-seen order. Intersections no source row ever
/// hit stay `Empty`.
pub fn pivot(
    source: &Raster,
    row_fields: &[usize],
    column_fields: &[usize],
    values: &[PivotValueField],
) -> Raster {
    let mut row_order: Vec<GroupKey> = Vec::new();
    let mut row_index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut col_order: Vec<GroupKey> = Vec::new();
    let mut col_index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut cells: FxHashMap<(usize, usize), Vec<Accumulator>> = FxHashMap::default();

    if column_fields.is_empty() {
        col_index.insert(GroupKey::new([]), 0);
        col_order.push(GroupKey::new([]));
    }

    for row in source.rows() {
        let pick = |indices: &[usize]| {
            GroupKey::new(
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Empty)),
            )
        };
        let rk = pick(row_fields);
        let ck = pick(column_fields);

        let ri = *row_index.entry(rk.clone()).or_insert_with(|| {
            row_order.push(rk);
            row_order.len() - 1
        });
        let ci = *col_index.entry(ck.clone()).or_insert_with(|| {
            col_order.push(ck);
            col_order.len() - 1
        });

        let accumulators = cells.entry((ri, ci)).or_insert_with(|| {
            values.iter().map(|v| Accumulator::new(v.aggregation)).collect()
        });
        for (field, accumulator) in values.iter().zip(accumulators.iter_mut()) {
            let value = row.get(field.column).cloned().unwrap_or(Value::Empty);
            accumulator.update(&value);
        }
    }

    let source_columns = source.column_names();
    let mut columns: Vec<Column> = Vec::new();
    for &i in row_fields {
        let name = source_columns.get(i).map(|c| c.name()).unwrap_or("");
        let column = disambiguate(&columns, name);
        columns.push(column);
    }
    for ck in &col_order {
        for field in values {
            let mut parts: Vec<String> = ck
                .values()
                .iter()
                .map(Value::display)
                .filter(|s| !s.is_empty())
                .collect();
            if values.len() > 1 || parts.is_empty() {
                let source_name = source_columns
                    .get(field.column)
                    .map(|c| c.name())
                    .unwrap_or("");
                parts.push(format!("{} of {}", field.aggregation.label(), source_name));
            }
            let column = disambiguate(&columns, &parts.join(" "));
            columns.push(column);
        }
    }

    let rows: Vec<Row> = row_order
        .iter()
        .enumerate()
        .map(|(ri, rk)| {
            let mut row: Row = rk.values().to_vec();
            for ci in 0..col_order.len() {
                match cells.get(&(ri, ci)) {
                    Some(accumulators) => {
                        row.extend(accumulators.iter().map(Accumulator::finish))
                    }
                    None => row.extend(std::iter::repeat(Value::Empty).take(values.len())),
                }
            }
            row
        })
        .collect();

    let mut out = Raster::new(columns, rows);
    if source.is_partial() {
        out.mark_partial();
    }
    out
}

// ============================================================================
// Flatten
// ============================================================================

/// Controls the shape of a flatten. The synthetic columns are optional and
/// renameable; `skip_empty` drops output rows whose carried value is
/// `Empty`, which is what makes flatten invert a pivot with absent
/// intersections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenOptions {
    pub include_row_numbers: bool,
    pub include_source_name: bool,
    pub skip_empty: bool,
    pub row_column: String,
    pub name_column: String,
    pub value_column: String,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        FlattenOptions {
            include_row_numbers: false,
            include_source_name: true,
            skip_empty: false,
            row_column: "Row".to_string(),
            name_column: "Name".to_string(),
            value_column: "Value".to_string(),
        }
    }
}

/// Unpivots the `values` columns into rows: each source row emits one
/// output row per value column, repeating the `keys` columns.
pub fn flatten(
    source: &Raster,
    keys: &[usize],
    values: &[usize],
    options: &FlattenOptions,
) -> Raster {
    let source_columns = source.column_names();

    let mut columns: Vec<Column> = Vec::new();
    for &i in keys {
        let name = source_columns.get(i).map(|c| c.name()).unwrap_or("");
        let column = disambiguate(&columns, name);
        columns.push(column);
    }
    if options.include_row_numbers {
        let column = disambiguate(&columns, &options.row_column);
        columns.push(column);
    }
    if options.include_source_name {
        let column = disambiguate(&columns, &options.name_column);
        columns.push(column);
    }
    let value_column = disambiguate(&columns, &options.value_column);
    columns.push(value_column);

    let mut rows: Vec<Row> = Vec::new();
    for (number, row) in source.rows().iter().enumerate() {
        for &vi in values {
            let value = row.get(vi).cloned().unwrap_or(Value::Empty);
            if options.skip_empty && value.is_empty() {
                continue;
            }
            let mut out: Row = keys
                .iter()
                .map(|&ki| row.get(ki).cloned().unwrap_or(Value::Empty))
                .collect();
            if options.include_row_numbers {
                out.push(Value::Integer(number as i64 + 1));
            }
            if options.include_source_name {
                let name = source_columns.get(vi).map(|c| c.name()).unwrap_or("");
                out.push(Value::text(name));
            }
            out.push(value);
            rows.push(out);
        }
    }

    let mut out = Raster::new(columns, rows);
    if source.is_partial() {
        out.mark_partial();
    }
    out
}
