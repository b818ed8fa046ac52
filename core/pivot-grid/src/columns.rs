//! FILENAME: core/pivot-grid/src/columns.rs
//! Column Dimension Processor and Aggregation Applier.
//!
//! For every row group (children first, then the group itself) the group's
//! leaf records are regrouped by the column dimensions and each value field
//! is aggregated per column group. Results go into an `AggregateTable` side
//! table indexed by row id; the row tree itself is never mutated.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateValue, AggregatorRef};
use crate::definition::{DimensionType, PivotDimension, PivotKeys, PivotValue};
use crate::hierarchy::{build_hierarchy, join_path, GroupPath, HierarchyNode};
use crate::logging::{log_debug, PIVOT};
use crate::rows::{collect_leaves, count_records, PivotGridRecord};
use crate::value::{FieldValue, Record, RecordId};

// ============================================================================
// AGGREGATE KEYS
// ============================================================================

/// Identifies one aggregate within a row group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    /// Value path of the column group; empty for the aggregate over the
    /// whole row group.
    pub column: GroupPath,
    /// Source field that was aggregated.
    pub member: String,
    /// Aggregator registry key.
    pub aggregate: String,
}

impl AggregateKey {
    pub fn new(column: &[FieldValue], member: &str, aggregate: &str) -> Self {
        AggregateKey {
            column: column.iter().cloned().collect(),
            member: member.to_string(),
            aggregate: aggregate.to_ascii_uppercase(),
        }
    }

    pub fn is_row_total(&self) -> bool {
        self.column.is_empty()
    }

    /// Flat property name: `<column labels><sep><member>`, or `<member>`
    /// without a column. `qualify` appends `<sep><aggregate>` to tell apart
    /// several aggregations of the same member. Distinct keys can map to the
    /// same flat name.
    pub fn flat_key(&self, keys: &PivotKeys, qualify: bool) -> String {
        let sep = &keys.column_dimension_separator;
        let mut out = if self.is_row_total() {
            self.member.clone()
        } else {
            format!("{}{}{}", join_path(&self.column, sep), sep, self.member)
        };
        if qualify {
            out.push_str(sep);
            out.push_str(&self.aggregate);
        }
        out
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_row_total() {
            write!(f, "{}:{}", self.member, self.aggregate)
        } else {
            write!(f, "{}/{}:{}", join_path(&self.column, "/"), self.member, self.aggregate)
        }
    }
}

/// Aggregates of one row group.
pub type RowAggregates = FxHashMap<AggregateKey, AggregateValue>;

/// Side table of aggregates indexed by `PivotGridRecord::id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    rows: Vec<RowAggregates>,
}

impl AggregateTable {
    pub fn with_rows(row_count: usize) -> Self {
        AggregateTable {
            rows: vec![RowAggregates::default(); row_count],
        }
    }

    pub fn row(&self, id: usize) -> Option<&RowAggregates> {
        self.rows.get(id)
    }

    pub fn get(&self, id: usize, key: &AggregateKey) -> Option<AggregateValue> {
        self.rows.get(id).and_then(|row| row.get(key)).copied()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_mut(&mut self, id: usize) -> &mut RowAggregates {
        if id >= self.rows.len() {
            self.rows.resize_with(id + 1, RowAggregates::default);
        }
        &mut self.rows[id]
    }
}

// ============================================================================
// VALUE AGGREGATIONS
// ============================================================================

/// A value field bound to its resolved aggregator.
#[derive(Clone)]
pub struct ValueAggregation {
    pub value: PivotValue,
    pub aggregator: AggregatorRef,
}

impl ValueAggregation {
    fn key(&self, column: &[FieldValue]) -> AggregateKey {
        AggregateKey::new(column, &self.value.member, &self.value.aggregate.key)
    }
}

impl fmt::Debug for ValueAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAggregation")
            .field("member", &self.value.member)
            .field("aggregate", &self.value.aggregate.key)
            .finish()
    }
}

// ============================================================================
// COLUMN PROCESSING
// ============================================================================

/// Options for a column pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnOptions {
    /// Also aggregate each row group over all of its leaves when columns exist.
    pub row_totals: bool,
}

/// Computes aggregates for every row group of `rows`, recursively.
pub fn process_columns(
    source: &[Record],
    rows: &[PivotGridRecord],
    columns: &[PivotDimension],
    values: &[ValueAggregation],
    keys: &PivotKeys,
    options: ColumnOptions,
) -> AggregateTable {
    let mut table = AggregateTable::with_rows(count_records(rows));
    for record in rows {
        group_columns(source, record, columns, values, keys, options, &mut table);
    }
    log_debug!(PIVOT, "process_columns rows={} values={}", table.row_count(), values.len());
    table
}

/// Children first: a group's aggregates are written after all descendants.
fn group_columns(
    source: &[Record],
    record: &PivotGridRecord,
    columns: &[PivotDimension],
    values: &[ValueAggregation],
    keys: &PivotKeys,
    options: ColumnOptions,
    table: &mut AggregateTable,
) {
    for child in record.children.records() {
        group_columns(source, child, columns, values, keys, options, table);
    }

    let leaves = collect_leaves(record);
    let hierarchy = build_hierarchy(source, leaves, columns, DimensionType::Column, keys);
    let out = table.row_mut(record.id);
    apply_aggregations(source, leaves, &hierarchy, values, out);
    if options.row_totals && !hierarchy.is_empty() {
        aggregate_into(source, leaves, &[], values, out);
    }
}

/// Aggregates `leaves` per column group, or as a whole when there are none.
pub fn apply_aggregations(
    source: &[Record],
    leaves: &[RecordId],
    hierarchy: &[HierarchyNode],
    values: &[ValueAggregation],
    out: &mut RowAggregates,
) {
    if hierarchy.is_empty() {
        aggregate_into(source, leaves, &[], values, out);
        return;
    }
    for node in hierarchy {
        apply_aggregations_to_node(source, node, values, out);
    }
}

fn apply_aggregations_to_node(
    source: &[Record],
    node: &HierarchyNode,
    values: &[ValueAggregation],
    out: &mut RowAggregates,
) {
    aggregate_into(source, &node.records, &node.path, values, out);
    for child in &node.children {
        apply_aggregations_to_node(source, child, values, out);
    }
}

fn aggregate_into(
    source: &[Record],
    leaves: &[RecordId],
    column: &[FieldValue],
    values: &[ValueAggregation],
    out: &mut RowAggregates,
) {
    for value in values {
        let result = aggregate(source, leaves, value);
        out.insert(value.key(column), result);
    }
}

/// Runs one value aggregation over a leaf set.
pub fn aggregate(source: &[Record], leaves: &[RecordId], value: &ValueAggregation) -> AggregateValue {
    let inputs: Vec<Option<f64>> = leaves
        .iter()
        .filter_map(|&id| source.get(id as usize))
        .map(|record| record.get(&value.value.member).and_then(|v| v.as_number()))
        .collect();
    value.aggregator.aggregate(&inputs)
}
