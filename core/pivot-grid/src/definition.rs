//! FILENAME: core/pivot-grid/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot build.
//! These structures are designed to be:
//! - Serializable (loaded from JSON by the host)
//! - Read-only inputs of a build
//! - Cheap to clone (computed members are shared behind `Arc`)

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PivotError, Result};
use crate::value::{FieldValue, Record};

/// Which axis a dimension is processed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionType {
    Row,
    Column,
}

// ============================================================================
// DIMENSION MEMBER
// ============================================================================

/// Derivation function for a computed member.
pub type MemberFn = Arc<dyn Fn(&Record) -> FieldValue + Send + Sync>;

/// How a dimension obtains its grouping value from a record.
#[derive(Clone)]
pub enum DimensionMember {
    /// Plain field lookup.
    Field(String),
    /// Value derived from the whole record. `name` identifies the dimension.
    Computed { name: String, resolve: MemberFn },
}

impl DimensionMember {
    pub fn computed<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Record) -> FieldValue + Send + Sync + 'static,
    {
        DimensionMember::Computed {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DimensionMember::Field(name) => name,
            DimensionMember::Computed { name, .. } => name,
        }
    }

    /// Resolves the member against a record. Missing fields yield `Empty`.
    pub fn resolve(&self, record: &Record) -> FieldValue {
        match self {
            DimensionMember::Field(name) => record.get(name).cloned().unwrap_or_default(),
            DimensionMember::Computed { resolve, .. } => resolve(record),
        }
    }
}

impl fmt::Debug for DimensionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionMember::Field(name) => f.debug_tuple("Field").field(name).finish(),
            DimensionMember::Computed { name, .. } => {
                f.debug_struct("Computed").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

// Computed members cannot travel through JSON; only their name is written.
impl Serialize for DimensionMember {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DimensionMember {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(DimensionMember::Field)
    }
}

// ============================================================================
// DIMENSIONS
// ============================================================================

/// A grouping rule for the row, column or filter area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotDimension {
    /// Field (or derivation) to group by.
    #[serde(rename = "memberName")]
    pub member: DimensionMember,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Nested sub-dimensions, grouped within each group of this dimension.
    #[serde(default, rename = "childLevels")]
    pub child_levels: Vec<PivotDimension>,

    /// Depth in the processed dimension tree. Assigned on every build.
    #[serde(skip)]
    pub level: usize,

    /// Optional value filter applied to source records.
    #[serde(default)]
    pub filter: Option<DimensionFilter>,

    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PivotDimension {
    pub fn new(member_name: impl Into<String>) -> Self {
        Self::with_member(DimensionMember::Field(member_name.into()))
    }

    pub fn computed<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Record) -> FieldValue + Send + Sync + 'static,
    {
        Self::with_member(DimensionMember::computed(name, resolve))
    }

    pub fn with_member(member: DimensionMember) -> Self {
        PivotDimension {
            member,
            enabled: true,
            child_levels: Vec::new(),
            level: 0,
            filter: None,
            display_name: None,
        }
    }

    pub fn child(mut self, child: PivotDimension) -> Self {
        self.child_levels.push(child);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_filter(mut self, filter: DimensionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn member_name(&self) -> &str {
        self.member.name()
    }

    /// Single dispatch point for field resolution.
    pub fn resolve(&self, record: &Record) -> FieldValue {
        self.member.resolve(record)
    }

    pub fn header(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.member_name())
    }
}

/// Assigns `level` to every dimension by its depth in the dimension tree.
pub fn assign_levels(dimensions: &mut [PivotDimension]) {
    fn assign(dims: &mut [PivotDimension], level: usize) {
        for dim in dims {
            dim.level = level;
            assign(&mut dim.child_levels, level + 1);
        }
    }
    assign(dimensions, 0);
}

/// Depth-first list of every enabled dimension, children included.
pub fn flatten_dimensions(dimensions: &[PivotDimension]) -> Vec<&PivotDimension> {
    let mut out = Vec::new();
    for dim in dimensions.iter().filter(|d| d.enabled) {
        out.push(dim);
        out.extend(flatten_dimensions(&dim.child_levels));
    }
    out
}

// ============================================================================
// FILTER DEFINITIONS
// ============================================================================

/// A filter applied to the resolved value of a dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DimensionFilter {
    /// Include only these specific values.
    ValueList { values: Vec<FieldValue> },

    /// Exclude these specific values.
    Exclude { values: Vec<FieldValue> },

    /// Comparison filter for numbers.
    Number {
        operator: ComparisonOperator,
        value: f64,
        /// Second bound for Between/NotBetween.
        #[serde(default)]
        value2: Option<f64>,
    },

    /// Text-based filter.
    Text {
        operator: TextOperator,
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
}

/// Comparison operators for number filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    NotBetween,
}

/// Text filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    BeginsWith,
    EndsWith,
}

// ============================================================================
// VALUES
// ============================================================================

/// Reference to an aggregation function by registry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotAggregate {
    /// Registry key, e.g. "SUM".
    pub key: String,
    /// Display label, e.g. "Sum".
    #[serde(default)]
    pub label: Option<String>,
}

impl PivotAggregate {
    pub fn new(key: impl Into<String>) -> Self {
        PivotAggregate {
            key: key.into(),
            label: None,
        }
    }
}

/// A value field with its aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotValue {
    /// Source field to aggregate.
    pub member: String,

    pub aggregate: PivotAggregate,

    /// Display name (e.g. "Sum of Sales").
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PivotValue {
    pub fn new(member: impl Into<String>, aggregate_key: impl Into<String>) -> Self {
        PivotValue {
            member: member.into(),
            aggregate: PivotAggregate::new(aggregate_key),
            display_name: None,
            enabled: true,
        }
    }
}

// ============================================================================
// PIVOT KEYS
// ============================================================================

/// Reserved names used when pivot output is laid out as flat objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotKeys {
    pub aggregations: String,
    pub records: String,
    pub children: String,
    pub level: String,
    pub row_dimension_separator: String,
    pub column_dimension_separator: String,
}

impl Default for PivotKeys {
    fn default() -> Self {
        PivotKeys {
            aggregations: "aggregations".to_string(),
            records: "records".to_string(),
            children: "children".to_string(),
            level: "level".to_string(),
            row_dimension_separator: "_".to_string(),
            column_dimension_separator: "-".to_string(),
        }
    }
}

impl PivotKeys {
    /// The property-name keys (separators excluded).
    pub fn reserved_names(&self) -> [&str; 4] {
        [
            self.aggregations.as_str(),
            self.records.as_str(),
            self.children.as_str(),
            self.level.as_str(),
        ]
    }

    /// Checks that the keys are non-empty and distinct.
    pub fn validate(&self) -> Result<()> {
        let names = self.reserved_names();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(PivotError::InvalidPivotKeys("reserved key names must not be empty".to_string()));
            }
            if names[..i].contains(name) {
                return Err(PivotError::InvalidPivotKeys(format!("duplicate reserved key '{}'", name)));
            }
        }
        if self.row_dimension_separator.is_empty() || self.column_dimension_separator.is_empty() {
            return Err(PivotError::InvalidPivotKeys("separators must not be empty".to_string()));
        }
        Ok(())
    }

    /// Fails if any source field uses a reserved name.
    pub fn check_collisions<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let names = self.reserved_names();
        for field in fields {
            if let Some(key) = names.iter().find(|k| **k == field) {
                return Err(PivotError::KeyCollision {
                    key: key.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// The complete pivot configuration supplied by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotConfiguration {
    /// Row dimensions, outer to inner.
    pub rows: Vec<PivotDimension>,

    /// Column dimensions, outer to inner.
    pub columns: Vec<PivotDimension>,

    pub values: Vec<PivotValue>,

    /// Filter-only dimensions; they never produce groups.
    pub filters: Vec<PivotDimension>,

    pub pivot_keys: PivotKeys,

    /// Also aggregate each row group across all columns when columns exist.
    pub row_totals: bool,
}

impl PivotConfiguration {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn enabled_values(&self) -> impl Iterator<Item = &PivotValue> {
        self.values.iter().filter(|v| v.enabled)
    }

    /// Every enabled dimension across rows, columns and filters.
    pub fn all_dimensions(&self) -> Vec<&PivotDimension> {
        let mut out = flatten_dimensions(&self.rows);
        out.extend(flatten_dimensions(&self.columns));
        out.extend(flatten_dimensions(&self.filters));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from;

    #[test]
    fn test_assign_levels_follows_depth() {
        let mut dims = vec![
            PivotDimension::new("Year").child(PivotDimension::new("Quarter").child(PivotDimension::new("Month"))),
            PivotDimension::new("Region"),
        ];
        assign_levels(&mut dims);
        assert_eq!(dims[0].level, 0);
        assert_eq!(dims[0].child_levels[0].level, 1);
        assert_eq!(dims[0].child_levels[0].child_levels[0].level, 2);
        assert_eq!(dims[1].level, 0);
    }

    #[test]
    fn test_member_resolution() {
        let rec = record_from([("region", "EU")]);
        assert_eq!(PivotDimension::new("region").resolve(&rec), FieldValue::from("EU"));
        assert_eq!(PivotDimension::new("missing").resolve(&rec), FieldValue::Empty);

        let upper = PivotDimension::computed("REGION", |r: &Record| {
            r.get("region")
                .and_then(|v| v.as_text())
                .map(|s| FieldValue::from(s.to_uppercase()))
                .unwrap_or_default()
        });
        assert_eq!(upper.resolve(&record_from([("region", "eu")])), FieldValue::from("EU"));
        assert_eq!(upper.member_name(), "REGION");
    }

    #[test]
    fn test_configuration_from_json() {
        let config = PivotConfiguration::from_json(
            r#"{
                "rows": [{ "memberName": "region", "childLevels": [{ "memberName": "country" }] }],
                "columns": [{ "memberName": "year", "enabled": false }],
                "values": [{ "member": "sales", "aggregate": { "key": "SUM", "label": "Sum" } }],
                "pivotKeys": { "columnDimensionSeparator": "|" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.rows[0].member_name(), "region");
        assert_eq!(config.rows[0].child_levels[0].member_name(), "country");
        assert!(!config.columns[0].enabled);
        assert_eq!(config.values[0].aggregate.key, "SUM");
        assert_eq!(config.pivot_keys.column_dimension_separator, "|");
        assert_eq!(config.pivot_keys.records, "records");
        assert_eq!(config.all_dimensions().len(), 2);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = PivotConfiguration::from_json("{ \"rows\": 3 }").unwrap_err();
        assert!(matches!(err, PivotError::Config(_)));
    }

    #[test]
    fn test_pivot_keys_validation() {
        assert!(PivotKeys::default().validate().is_ok());

        let mut keys = PivotKeys::default();
        keys.children = "records".to_string();
        assert!(matches!(keys.validate(), Err(PivotError::InvalidPivotKeys(_))));

        let mut keys = PivotKeys::default();
        keys.column_dimension_separator.clear();
        assert!(keys.validate().is_err());
    }

    #[test]
    fn test_pivot_keys_collision() {
        let keys = PivotKeys::default();
        assert!(keys.check_collisions(["region", "sales"]).is_ok());
        match keys.check_collisions(["region", "level"]) {
            Err(PivotError::KeyCollision { key, field }) => {
                assert_eq!(key, "level");
                assert_eq!(field, "level");
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }
}
