//! FILENAME: core/pivot-grid/src/rows.rs
//! Row Dimension Processor - turns row dimensions into grid row groups.
//!
//! The row tree is immutable once built. Every record gets a pre-order `id`
//! that the aggregation side table is indexed by.

use crate::definition::{assign_levels, DimensionType, PivotDimension, PivotKeys};
use crate::hierarchy::{build_hierarchy, GroupPath, HierarchyNode};
use crate::logging::{log_debug, PIVOT};
use crate::value::{FieldValue, Record, RecordId};

// ============================================================================
// GRID RECORD
// ============================================================================

/// A grouped row of the pivot grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotGridRecord {
    /// Pre-order position in the row tree; identity for aggregate lookups.
    pub id: usize,

    /// Member name of the dimension that formed this group.
    pub dimension: String,

    pub dimension_value: FieldValue,

    /// Row path of group labels, joined by the row separator.
    pub key: String,

    /// Group values from the root row down to this one.
    pub path: GroupPath,

    /// Number of row groups above this one.
    pub level: usize,

    /// Every source record reachable from this group.
    pub records: Vec<RecordId>,

    /// Sub-groups keyed by the dimension that formed them.
    pub children: ChildGroups,
}

impl PivotGridRecord {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Depth-first walk over this record and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PivotGridRecord)) {
        visit(self);
        for (_, records) in self.children.iter() {
            for child in records {
                child.walk(visit);
            }
        }
    }
}

/// Child groups of a row, keyed by dimension member name.
/// Keys keep the order in which they were attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildGroups {
    groups: Vec<(String, Vec<PivotGridRecord>)>,
}

impl ChildGroups {
    pub fn get(&self, dimension: &str) -> Option<&[PivotGridRecord]> {
        self.groups
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, records)| records.as_slice())
    }

    fn push(&mut self, dimension: &str, record: PivotGridRecord) {
        match self.groups.iter_mut().find(|(name, _)| name == dimension) {
            Some((_, records)) => records.push(record),
            None => self.groups.push((dimension.to_string(), vec![record])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PivotGridRecord])> {
        self.groups
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// All child records across every dimension key.
    pub fn records(&self) -> impl Iterator<Item = &PivotGridRecord> {
        self.groups.iter().flat_map(|(_, records)| records.iter())
    }

    /// Number of dimension keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// ROW PROCESSING
// ============================================================================

/// Builds the row groups for `ids`.
///
/// With no enabled row dimension the records fall into one pass-through
/// group formed by an unnamed dimension, so the grid still has a row.
pub fn process_rows(
    source: &[Record],
    ids: &[RecordId],
    rows: &[PivotDimension],
    keys: &PivotKeys,
) -> Vec<PivotGridRecord> {
    let mut dimensions = rows.to_vec();
    assign_levels(&mut dimensions);

    if !dimensions.iter().any(|d| d.enabled) {
        dimensions = vec![PivotDimension::new("")];
    }

    let hierarchy = build_hierarchy(source, ids, &dimensions, DimensionType::Row, keys);
    let mut next_id = 0;
    let records = to_grid_records(hierarchy, &mut next_id);

    log_debug!(PIVOT, "process_rows records={} groups={}", ids.len(), next_id);
    records
}

fn to_grid_records(nodes: Vec<HierarchyNode>, next_id: &mut usize) -> Vec<PivotGridRecord> {
    nodes
        .into_iter()
        .map(|node| {
            let id = *next_id;
            *next_id += 1;

            let mut children = ChildGroups::default();
            for child in node.children {
                let dimension = child.dimension.clone();
                let mut converted = to_grid_records(vec![child], next_id);
                if let Some(record) = converted.pop() {
                    children.push(&dimension, record);
                }
            }

            PivotGridRecord {
                id,
                dimension: node.dimension,
                dimension_value: node.value,
                key: node.key,
                path: node.path,
                level: node.level,
                records: node.records,
                children,
            }
        })
        .collect()
}

/// Every source record under `record`, regardless of row nesting depth.
pub fn collect_leaves(record: &PivotGridRecord) -> &[RecordId] {
    &record.records
}

/// Depth-first list of all row groups: each parent precedes its children.
pub fn flatten_records(records: &[PivotGridRecord]) -> Vec<&PivotGridRecord> {
    let mut out = Vec::new();
    for record in records {
        record.walk(&mut |r| out.push(r));
    }
    out
}

/// Total number of row groups in the forest.
pub fn count_records(records: &[PivotGridRecord]) -> usize {
    flatten_records(records).len()
}
