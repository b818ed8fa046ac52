//! FILENAME: core/pivot-grid/src/engine.rs
//! Pivot Engine - runs a configuration against a flat record source.
//!
//! Algorithm:
//! 1. Validate pivot keys and resolve every value aggregator (fail fast)
//! 2. Filter the source on dimension filters
//! 3. Build the row tree from the row dimensions
//! 4. For every row group, regroup its leaves by column dimensions and aggregate
//! 5. Build the column tree over all filtered records for header rendering
//!
//! Every build starts from the raw source; nothing carries over between builds.

use rustc_hash::FxHashSet;

use crate::aggregate::{AggregateValue, AggregatorRegistry};
use crate::columns::{process_columns, AggregateKey, AggregateTable, ColumnOptions, RowAggregates, ValueAggregation};
use crate::definition::{assign_levels, DimensionType, PivotConfiguration, PivotKeys};
use crate::error::Result;
use crate::filtering::filter_records;
use crate::hierarchy::{build_hierarchy, GroupPath, HierarchyNode};
use crate::logging::{log_enter, log_exit, log_info, log_warn, PIVOT};
use crate::rows::{flatten_records, process_rows, PivotGridRecord};
use crate::value::{FieldValue, Record, RecordId};

// ============================================================================
// PIVOT ENGINE
// ============================================================================

/// A validated pivot configuration, ready to build against record sources.
#[derive(Debug, Clone)]
pub struct PivotEngine {
    config: PivotConfiguration,
    values: Vec<ValueAggregation>,
}

impl PivotEngine {
    /// Validates `config` and binds its value fields to aggregators.
    /// Unknown aggregator keys and invalid pivot keys are reported here.
    pub fn new(config: PivotConfiguration, registry: &AggregatorRegistry) -> Result<Self> {
        config.pivot_keys.validate()?;

        let values = config
            .enabled_values()
            .map(|value| {
                Ok(ValueAggregation {
                    aggregator: registry.resolve(&value.aggregate.key)?,
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut config = config;
        assign_levels(&mut config.rows);
        assign_levels(&mut config.columns);
        assign_levels(&mut config.filters);

        log_info!(
            PIVOT,
            "engine rows={} columns={} values={}",
            config.rows.len(),
            config.columns.len(),
            values.len()
        );

        Ok(PivotEngine { config, values })
    }

    pub fn config(&self) -> &PivotConfiguration {
        &self.config
    }

    pub fn keys(&self) -> &PivotKeys {
        &self.config.pivot_keys
    }

    /// Builds the full pivot for `source`.
    pub fn build(&self, source: &[Record]) -> Result<PivotResult> {
        log_enter!(PIVOT, "build", "records={}", source.len());
        let keys = &self.config.pivot_keys;

        let mut fields: FxHashSet<&str> = FxHashSet::default();
        for record in source {
            fields.extend(record.keys().map(String::as_str));
        }
        if let Err(err) = keys.check_collisions(fields.iter().copied()) {
            log_warn!(PIVOT, "build rejected: {}", err);
            return Err(err);
        }

        let ids = filter_records(source, &self.config);

        let rows = process_rows(source, &ids, &self.config.rows, keys);

        let options = ColumnOptions {
            row_totals: self.config.row_totals,
        };
        let aggregates = process_columns(source, &rows, &self.config.columns, &self.values, keys, options);

        let columns = build_hierarchy(source, &ids, &self.config.columns, DimensionType::Column, keys);

        log_exit!(
            PIVOT,
            "build",
            "filtered={} row_groups={} column_groups={}",
            ids.len(),
            aggregates.row_count(),
            columns.iter().map(HierarchyNode::node_count).sum::<usize>()
        );

        Ok(PivotResult {
            rows,
            columns,
            aggregates,
            filtered: ids,
            value_keys: self.values.iter().map(|v| AggregateKey::new(&[], &v.value.member, &v.value.aggregate.key)).collect(),
            keys: keys.clone(),
        })
    }
}

/// One-shot build with the built-in aggregators.
pub fn calculate_pivot(config: PivotConfiguration, source: &[Record]) -> Result<PivotResult> {
    PivotEngine::new(config, &AggregatorRegistry::with_builtins())?.build(source)
}

// ============================================================================
// RESULT
// ============================================================================

/// Output of one build: the row tree, its aggregates and the column tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotResult {
    /// Root row groups.
    pub rows: Vec<PivotGridRecord>,

    /// Column groups over every filtered record.
    pub columns: Vec<HierarchyNode>,

    pub aggregates: AggregateTable,

    /// Source records that passed the filters.
    pub filtered: Vec<RecordId>,

    /// Value fields in configuration order, keyed for the whole row.
    pub value_keys: Vec<AggregateKey>,

    pub keys: PivotKeys,
}

impl PivotResult {
    /// Aggregate of `member` under `aggregate` for `row` and a column group
    /// value path. An empty path reads the whole-row aggregate.
    pub fn aggregate(&self, row: &PivotGridRecord, column: &[FieldValue], member: &str, aggregate: &str) -> AggregateValue {
        self.aggregates
            .get(row.id, &AggregateKey::new(column, member, aggregate))
            .flatten()
    }

    pub fn row_aggregates(&self, row: &PivotGridRecord) -> Option<&RowAggregates> {
        self.aggregates.row(row.id)
    }

    /// Finds a row group by its value path.
    pub fn find_row(&self, path: &[FieldValue]) -> Option<&PivotGridRecord> {
        flatten_records(&self.rows)
            .into_iter()
            .find(|r| r.path.as_slice() == path)
    }

    /// Every row group, depth-first.
    pub fn all_rows(&self) -> Vec<&PivotGridRecord> {
        flatten_records(&self.rows)
    }

    /// Renderable row order: each parent is immediately followed by its
    /// children when expanded.
    pub fn flatten_rows(&self, expansion: &RowExpansion) -> Vec<FlatRow<'_>> {
        let mut out = Vec::new();
        for record in &self.rows {
            flatten_row(record, None, expansion, &mut out);
        }
        out
    }

    /// Column header entries, depth-first.
    pub fn column_headers(&self) -> Vec<ColumnHeader> {
        let mut out = Vec::new();
        for node in &self.columns {
            flatten_column(node, &mut out);
        }
        out
    }

    /// Aggregate keys of the data columns: one per leaf column group and
    /// value, or one per value when there are no column groups.
    pub fn data_columns(&self) -> Vec<AggregateKey> {
        let leaves: Vec<ColumnHeader> = self.column_headers().into_iter().filter(|h| h.is_leaf).collect();
        if leaves.is_empty() {
            return self.value_keys.clone();
        }
        leaves
            .iter()
            .flat_map(|h| {
                self.value_keys.iter().map(move |v| AggregateKey {
                    column: h.path.clone(),
                    member: v.member.clone(),
                    aggregate: v.aggregate.clone(),
                })
            })
            .collect()
    }
}

// ============================================================================
// ROW FLATTENING
// ============================================================================

/// Expand/collapse state of row groups, keyed by row value path.
#[derive(Debug, Clone, Default)]
pub struct RowExpansion {
    /// Start with every group collapsed instead of expanded.
    pub collapsed_by_default: bool,
    /// Rows whose state differs from the default.
    pub toggled: FxHashSet<GroupPath>,
}

impl RowExpansion {
    pub fn expanded() -> Self {
        Self::default()
    }

    pub fn collapsed() -> Self {
        RowExpansion {
            collapsed_by_default: true,
            toggled: FxHashSet::default(),
        }
    }

    pub fn toggle(&mut self, path: &[FieldValue]) {
        if !self.toggled.remove(path) {
            self.toggled.insert(path.iter().cloned().collect());
        }
    }

    pub fn is_expanded(&self, path: &[FieldValue]) -> bool {
        self.collapsed_by_default == self.toggled.contains(path)
    }
}

/// A row in renderable order.
#[derive(Debug, Clone)]
pub struct FlatRow<'a> {
    pub record: &'a PivotGridRecord,

    /// Depth/indent level.
    pub level: usize,

    pub has_children: bool,

    pub is_expanded: bool,

    /// Index of the parent in the flat list (`None` for roots).
    pub parent_index: Option<usize>,
}

fn flatten_row<'a>(
    record: &'a PivotGridRecord,
    parent_index: Option<usize>,
    expansion: &RowExpansion,
    out: &mut Vec<FlatRow<'a>>,
) {
    let index = out.len();
    let is_expanded = record.has_children() && expansion.is_expanded(&record.path);
    out.push(FlatRow {
        record,
        level: record.level,
        has_children: record.has_children(),
        is_expanded,
        parent_index,
    });
    if is_expanded {
        for child in record.children.records() {
            flatten_row(child, Some(index), expansion, out);
        }
    }
}

// ============================================================================
// COLUMN HEADERS
// ============================================================================

/// A column header cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    /// Label path; not unique when group labels repeat.
    pub key: String,
    pub path: GroupPath,
    pub label: String,
    pub dimension: String,
    pub level: usize,
    pub is_leaf: bool,
    /// Number of leaf columns below (1 for a leaf).
    pub span: usize,
}

fn leaf_count(node: &HierarchyNode) -> usize {
    if node.is_leaf() {
        1
    } else {
        node.children.iter().map(leaf_count).sum()
    }
}

fn flatten_column(node: &HierarchyNode, out: &mut Vec<ColumnHeader>) {
    out.push(ColumnHeader {
        key: node.key.clone(),
        path: node.path.clone(),
        label: node.value.label(),
        dimension: node.dimension.clone(),
        level: node.level,
        is_leaf: node.is_leaf(),
        span: leaf_count(node),
    });
    for child in &node.children {
        flatten_column(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{PivotDimension, PivotValue};
    use crate::error::PivotError;
    use crate::value::{record_from, FieldValue};

    fn create_test_records() -> Vec<Record> {
        vec![
            record_from([("Region", FieldValue::from("North")), ("Product", "Apples".into()), ("Sales", 100.into())]),
            record_from([("Region", FieldValue::from("North")), ("Product", "Oranges".into()), ("Sales", 150.into())]),
            record_from([("Region", FieldValue::from("South")), ("Product", "Apples".into()), ("Sales", 200.into())]),
            record_from([("Region", FieldValue::from("South")), ("Product", "Oranges".into()), ("Sales", 250.into())]),
        ]
    }

    fn create_test_configuration() -> PivotConfiguration {
        PivotConfiguration {
            rows: vec![PivotDimension::new("Region")],
            columns: vec![PivotDimension::new("Product")],
            values: vec![PivotValue::new("Sales", "SUM")],
            ..PivotConfiguration::default()
        }
    }

    #[test]
    fn test_basic_pivot_calculation() {
        let records = create_test_records();
        let result = calculate_pivot(create_test_configuration(), &records).unwrap();

        assert_eq!(result.rows.len(), 2);
        let north = &result.rows[0];
        assert_eq!(result.aggregate(north, &["Apples".into()], "Sales", "SUM"), Some(100.0));
        assert_eq!(result.aggregate(north, &["Oranges".into()], "Sales", "SUM"), Some(150.0));
        let south = &result.rows[1];
        assert_eq!(result.aggregate(south, &["Oranges".into()], "Sales", "sum"), Some(250.0));
    }

    #[test]
    fn test_no_value_fields() {
        let records = create_test_records();
        let mut config = create_test_configuration();
        config.values.clear();

        let result = calculate_pivot(config, &records).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.row_aggregates(&result.rows[0]).unwrap().is_empty());
        assert!(result.data_columns().is_empty());
    }

    #[test]
    fn test_unknown_aggregator_fails_at_configuration() {
        let mut config = create_test_configuration();
        config.values.push(PivotValue::new("Sales", "MEDIAN"));
        let err = PivotEngine::new(config, &AggregatorRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, PivotError::UnknownAggregator(ref k) if k == "MEDIAN"));
    }

    #[test]
    fn test_disabled_value_is_not_resolved() {
        let mut config = create_test_configuration();
        let mut bogus = PivotValue::new("Sales", "MEDIAN");
        bogus.enabled = false;
        config.values.push(bogus);
        assert!(PivotEngine::new(config, &AggregatorRegistry::with_builtins()).is_ok());
    }

    #[test]
    fn test_key_collision_fails_build() {
        let mut records = create_test_records();
        records[2].insert("level".to_string(), 1.into());
        let engine = PivotEngine::new(create_test_configuration(), &AggregatorRegistry::with_builtins()).unwrap();
        assert!(matches!(engine.build(&records), Err(PivotError::KeyCollision { .. })));
    }

    #[test]
    fn test_row_expansion_controls_flat_order() {
        let records = create_test_records();
        let mut config = create_test_configuration();
        config.rows.push(PivotDimension::new("Product"));
        config.columns.clear();
        let result = calculate_pivot(config, &records).unwrap();

        let expanded = result.flatten_rows(&RowExpansion::expanded());
        let keys: Vec<&str> = expanded.iter().map(|r| r.record.key.as_str()).collect();
        assert_eq!(keys, vec!["North", "North_Apples", "North_Oranges", "South", "South_Apples", "South_Oranges"]);
        assert_eq!(expanded[1].parent_index, Some(0));
        assert_eq!(expanded[4].parent_index, Some(3));

        let mut expansion = RowExpansion::expanded();
        expansion.toggle(&["North".into()]);
        let partial = result.flatten_rows(&expansion);
        let keys: Vec<&str> = partial.iter().map(|r| r.record.key.as_str()).collect();
        assert_eq!(keys, vec!["North", "South", "South_Apples", "South_Oranges"]);
        assert!(!partial[0].is_expanded);
        assert!(partial[0].has_children);

        let collapsed = result.flatten_rows(&RowExpansion::collapsed());
        assert_eq!(collapsed.len(), 2);
    }

    #[test]
    fn test_column_headers_and_data_columns() {
        let records = create_test_records();
        let mut config = create_test_configuration();
        config.columns = vec![PivotDimension::new("Region").child(PivotDimension::new("Product"))];
        config.rows.clear();
        let result = calculate_pivot(config, &records).unwrap();

        let headers = result.column_headers();
        assert_eq!(headers.len(), 6);
        assert_eq!(headers[0].key, "North");
        assert_eq!(headers[0].span, 2);
        assert!(!headers[0].is_leaf);
        assert_eq!(headers[1].key, "North-Apples");
        assert!(headers[1].is_leaf);

        let data = result.data_columns();
        assert_eq!(data.len(), 4);
        assert_eq!(data[0], AggregateKey::new(&["North".into(), "Apples".into()], "Sales", "SUM"));

        let all = &result.rows[0];
        assert_eq!(result.aggregate(all, &["South".into()], "Sales", "SUM"), Some(450.0));
    }

    #[test]
    fn test_column_groups_with_equal_labels_stay_apart() {
        let records = vec![
            record_from([("Year", FieldValue::from(2021)), ("Sales", 10.into())]),
            record_from([("Year", FieldValue::from("2021")), ("Sales", 5.into())]),
        ];
        let config = PivotConfiguration {
            columns: vec![PivotDimension::new("Year")],
            values: vec![PivotValue::new("Sales", "SUM")],
            ..PivotConfiguration::default()
        };
        let result = calculate_pivot(config, &records).unwrap();

        let headers = result.column_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].key, headers[1].key);
        assert_ne!(headers[0].path, headers[1].path);

        let data = result.data_columns();
        assert_eq!(data.len(), 2);
        assert_ne!(data[0], data[1]);

        let all = &result.rows[0];
        assert_eq!(result.aggregate(all, &[2021.into()], "Sales", "SUM"), Some(10.0));
        assert_eq!(result.aggregate(all, &["2021".into()], "Sales", "SUM"), Some(5.0));
    }

    #[test]
    fn test_rows_with_equal_keys_expand_independently() {
        let records = vec![
            record_from([("A", FieldValue::from("x_y")), ("B", "z".into())]),
            record_from([("A", FieldValue::from("x")), ("B", "y_z".into())]),
        ];
        let config = PivotConfiguration {
            rows: vec![PivotDimension::new("A"), PivotDimension::new("B")],
            ..PivotConfiguration::default()
        };
        let result = calculate_pivot(config, &records).unwrap();

        let xy = result.find_row(&["x_y".into()]).unwrap();
        let x = result.find_row(&["x".into()]).unwrap();
        assert_ne!(xy.id, x.id);
        let x_yz = result.find_row(&["x".into(), "y_z".into()]).unwrap();
        let xy_z = result.find_row(&["x_y".into(), "z".into()]).unwrap();
        assert_eq!(x_yz.key, xy_z.key);
        assert_ne!(x_yz.id, xy_z.id);

        let mut expansion = RowExpansion::expanded();
        expansion.toggle(&["x".into()]);
        let flat = result.flatten_rows(&expansion);
        let ids: Vec<usize> = flat.iter().map(|r| r.record.id).collect();
        assert!(ids.contains(&xy_z.id));
        assert!(!ids.contains(&x_yz.id));
        assert!(expansion.is_expanded(&["x_y".into()]));
        assert!(!expansion.is_expanded(&["x".into()]));
    }
}
