//! FILENAME: core/pivot-grid/src/export.rs
//! Flat JSON export of a pivot result.
//!
//! Each row group becomes one JSON object, in depth-first order. The reserved
//! property names come from `PivotKeys`; dimension values of the group and
//! its ancestors are stored under the dimension member names.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::columns::AggregateKey;
use crate::engine::PivotResult;
use crate::rows::PivotGridRecord;
use crate::value::{FieldValue, Record};

/// Group path from the root down to the current row.
type AncestorPath<'a> = SmallVec<[&'a PivotGridRecord; 8]>;

/// JSON form of a field value.
pub fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Empty => Value::Null,
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Number(n) => Value::from(n.as_f64()),
        FieldValue::Text(s) => Value::String(s.clone()),
    }
}

fn record_to_json(record: &Record) -> Value {
    let mut fields: Vec<(&String, &FieldValue)> = record.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    Value::Object(
        fields
            .into_iter()
            .map(|(name, value)| (name.clone(), field_to_json(value)))
            .collect(),
    )
}

/// Aggregate columns in output order with their flat property names.
/// Names are unique: a flat name already taken by another column group
/// (equal labels, or labels containing the separator) gets `<sep><n>`
/// appended, numbering from 2 in column order.
fn aggregate_columns(result: &PivotResult) -> Vec<(AggregateKey, String)> {
    let keys = &result.keys;
    let sep = &keys.column_dimension_separator;

    // Several aggregations of one member need the aggregate in the name.
    let mut member_counts: FxHashMap<&str, usize> = FxHashMap::default();
    for key in &result.value_keys {
        *member_counts.entry(key.member.as_str()).or_default() += 1;
    }

    let mut ordered: Vec<AggregateKey> = result.value_keys.clone();
    for header in result.column_headers() {
        for value in &result.value_keys {
            ordered.push(AggregateKey {
                column: header.path.clone(),
                member: value.member.clone(),
                aggregate: value.aggregate.clone(),
            });
        }
    }

    let mut taken: FxHashSet<String> = FxHashSet::default();
    ordered
        .into_iter()
        .map(|key| {
            let qualify = member_counts.get(key.member.as_str()).copied().unwrap_or(0) > 1;
            let base = key.flat_key(keys, qualify);
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{}{}{}", base, sep, n);
                n += 1;
            }
            (key, name)
        })
        .collect()
}

/// Renders every row group of `result` as a flat JSON object.
///
/// `source` must be the slice the result was built from; `records` entries
/// hold the source records themselves. Every aggregate is listed under the
/// `aggregations` key and is also copied to the top level. A top-level name
/// already used by a dimension value gets `<sep><aggregate>` appended; if
/// that is taken as well the aggregate is only under `aggregations`.
pub fn export_flat_rows(result: &PivotResult, source: &[Record]) -> Vec<Map<String, Value>> {
    let columns = aggregate_columns(result);
    let mut out = Vec::new();
    let mut path = AncestorPath::new();
    for record in &result.rows {
        export_row(result, source, record, &columns, &mut path, &mut out);
    }
    out
}

fn export_row<'a>(
    result: &'a PivotResult,
    source: &[Record],
    record: &'a PivotGridRecord,
    columns: &[(AggregateKey, String)],
    path: &mut AncestorPath<'a>,
    out: &mut Vec<Map<String, Value>>,
) {
    path.push(record);
    let keys = &result.keys;
    let mut row = Map::new();

    for group in path.iter().filter(|g| !g.dimension.is_empty()) {
        row.insert(group.dimension.clone(), field_to_json(&group.dimension_value));
    }
    row.insert(keys.level.clone(), Value::from(record.level));
    row.insert(
        keys.records.clone(),
        Value::Array(
            record
                .records
                .iter()
                .filter_map(|&id| source.get(id as usize))
                .map(record_to_json)
                .collect(),
        ),
    );

    if record.has_children() {
        let children: Map<String, Value> = record
            .children
            .iter()
            .map(|(dimension, records)| {
                let child_keys = records.iter().map(|r| Value::String(r.key.clone())).collect();
                (dimension.to_string(), Value::Array(child_keys))
            })
            .collect();
        row.insert(keys.children.clone(), Value::Object(children));
    }

    let mut aggregations = Map::new();
    if let Some(aggs) = result.row_aggregates(record) {
        for (key, name) in columns {
            let Some(value) = aggs.get(key) else {
                continue;
            };
            let value = value.map_or(Value::Null, Value::from);
            let top_level = if row.contains_key(name) {
                format!("{}{}{}", name, keys.column_dimension_separator, key.aggregate)
            } else {
                name.clone()
            };
            if !row.contains_key(&top_level) {
                row.insert(top_level, value.clone());
            }
            aggregations.insert(name.clone(), value);
        }
    }
    row.insert(keys.aggregations.clone(), Value::Object(aggregations));

    out.push(row);

    for child in record.children.records() {
        export_row(result, source, child, columns, path, out);
    }
    path.pop();
}
