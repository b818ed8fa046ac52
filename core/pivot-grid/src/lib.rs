//! FILENAME: core/pivot-grid/src/lib.rs
//! Pivot data reshaping engine.
//!
//! Turns a flat list of records into a row tree of groups, regroups every row
//! group by the column dimensions and aggregates the value fields per column
//! group. Rendering is left to the host.
//!
//! Layers:
//! - `definition`: Serializable configuration (dimensions, values, keys)
//! - `hierarchy`: Grouping of records by a sequence of dimensions
//! - `rows` / `columns`: Row tree and per-column aggregation
//! - `engine`: Validated configuration and build entry point
//! - `export`: Flat JSON rows for hosts that want plain objects

pub mod aggregate;
pub mod columns;
pub mod date_dimension;
pub mod definition;
pub mod engine;
pub mod error;
pub mod export;
pub mod filtering;
pub mod hierarchy;
pub(crate) mod logging;
pub mod rows;
pub mod value;

pub use aggregate::{
    AggregateAccumulator, AggregateValue, AggregationType, Aggregator, AggregatorRef,
    AggregatorRegistry,
};
pub use columns::{
    aggregate, apply_aggregations, process_columns, AggregateKey, AggregateTable, ColumnOptions,
    RowAggregates, ValueAggregation,
};
pub use date_dimension::{date_dimension, format_date_level_name, DateDimensionOptions, DateGroupLevel};
pub use definition::*;
pub use engine::{calculate_pivot, ColumnHeader, FlatRow, PivotEngine, PivotResult, RowExpansion};
pub use error::{PivotError, Result};
pub use export::export_flat_rows;
pub use filtering::{filter_records, DimensionValueResolver};
pub use hierarchy::{build_hierarchy, extend_groups, join_path, GroupPath, HierarchyNode};
pub use rows::{collect_leaves, flatten_records, process_rows, ChildGroups, PivotGridRecord};
pub use value::{record_from, FieldValue, OrderedFloat, Record, RecordId};
