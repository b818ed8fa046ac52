//! FILENAME: core/pivot-grid/src/hierarchy.rs
//! Hierarchy Builder - groups source records by a sequence of dimensions.
//!
//! Algorithm:
//! 1. The first dimension partitions the whole record set into groups.
//! 2. A dimension's `child_levels` partition each of its groups again.
//! 3. Every following dimension partitions the leaf groups of the tree
//!    built so far.
//!
//! Steps 1 and 3 are the same operation (`extend_groups`), seeded from an
//! empty forest. Group order is the order in which values are first seen.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::definition::{DimensionType, PivotDimension, PivotKeys};
use crate::value::{FieldValue, Record, RecordId};

/// Values of a group and its ancestors, root first. This is a group's identity;
/// the joined `key` is only a label and may repeat across groups.
pub type GroupPath = SmallVec<[FieldValue; 4]>;

/// Group path labels joined by `separator`.
pub fn join_path(path: &[FieldValue], separator: &str) -> String {
    path.iter()
        .map(FieldValue::label)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Parent of a group being formed: its label key and value path.
type ParentRef<'a> = Option<(&'a str, &'a [FieldValue])>;

/// A node in a row or column hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    /// Member name of the dimension that formed this group.
    pub dimension: String,

    /// The discriminating value of the group.
    pub value: FieldValue,

    /// Path of group labels from the root, joined by the axis separator.
    pub key: String,

    /// Group values from the root down to this node.
    pub path: GroupPath,

    /// Depth in the tree (0 = root level).
    pub level: usize,

    /// Every source record in this group, in source order.
    pub records: Vec<RecordId>,

    /// Sub-groups, in first-seen order.
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    fn new(dimension: &PivotDimension, value: FieldValue, parent: ParentRef<'_>, level: usize, separator: &str) -> Self {
        let (key, mut path) = match parent {
            Some((key, path)) => (
                format!("{}{}{}", key, separator, value.label()),
                path.iter().cloned().collect::<GroupPath>(),
            ),
            None => (value.label(), GroupPath::new()),
        };
        path.push(value.clone());
        HierarchyNode {
            dimension: dimension.member_name().to_string(),
            value,
            key,
            path,
            level,
            records: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in this subtree, self included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::node_count).sum::<usize>()
    }
}

fn separator(dimension_type: DimensionType, keys: &PivotKeys) -> &str {
    match dimension_type {
        DimensionType::Row => keys.row_dimension_separator.as_str(),
        DimensionType::Column => keys.column_dimension_separator.as_str(),
    }
}

/// Builds the group forest of `ids` for the given dimensions.
/// Disabled dimensions are skipped; no dimensions yields an empty forest.
pub fn build_hierarchy(
    source: &[Record],
    ids: &[RecordId],
    dimensions: &[PivotDimension],
    dimension_type: DimensionType,
    keys: &PivotKeys,
) -> Vec<HierarchyNode> {
    let mut roots = Vec::new();
    for dimension in dimensions.iter().filter(|d| d.enabled) {
        extend_groups(&mut roots, source, ids, dimension, dimension_type, keys);
    }
    roots
}

/// Partitions every leaf group of `nodes` by `dimension`.
/// An empty forest is seeded by partitioning `ids` at level 0.
pub fn extend_groups(
    nodes: &mut Vec<HierarchyNode>,
    source: &[Record],
    ids: &[RecordId],
    dimension: &PivotDimension,
    dimension_type: DimensionType,
    keys: &PivotKeys,
) {
    extend_level(nodes, source, ids, None, 0, dimension, dimension_type, keys);
}

#[allow(clippy::too_many_arguments)]
fn extend_level(
    nodes: &mut Vec<HierarchyNode>,
    source: &[Record],
    ids: &[RecordId],
    parent: ParentRef<'_>,
    level: usize,
    dimension: &PivotDimension,
    dimension_type: DimensionType,
    keys: &PivotKeys,
) {
    if nodes.is_empty() {
        *nodes = partition(source, ids, dimension, parent, level, dimension_type, keys);
        return;
    }
    for node in nodes.iter_mut() {
        extend_level(
            &mut node.children,
            source,
            &node.records,
            Some((node.key.as_str(), node.path.as_slice())),
            node.level + 1,
            dimension,
            dimension_type,
            keys,
        );
    }
}

/// Groups `ids` by the resolved value of `dimension`, then recurses into its
/// enabled child levels within each group.
fn partition(
    source: &[Record],
    ids: &[RecordId],
    dimension: &PivotDimension,
    parent: ParentRef<'_>,
    level: usize,
    dimension_type: DimensionType,
    keys: &PivotKeys,
) -> Vec<HierarchyNode> {
    let sep = separator(dimension_type, keys);
    let mut index: FxHashMap<FieldValue, usize> = FxHashMap::default();
    let mut groups: Vec<HierarchyNode> = Vec::new();

    for &id in ids {
        let Some(record) = source.get(id as usize) else {
            continue;
        };
        let value = dimension.resolve(record);
        let slot = match index.get(&value) {
            Some(&slot) => slot,
            None => {
                let slot = groups.len();
                index.insert(value.clone(), slot);
                groups.push(HierarchyNode::new(dimension, value, parent, level, sep));
                slot
            }
        };
        groups[slot].records.push(id);
    }

    for group in &mut groups {
        for child in dimension.child_levels.iter().filter(|d| d.enabled) {
            let nested = partition(
                source,
                &group.records,
                child,
                Some((group.key.as_str(), group.path.as_slice())),
                level + 1,
                dimension_type,
                keys,
            );
            group.children.extend(nested);
        }
    }

    groups
}
