//! FILENAME: core/pivot-grid/src/filtering.rs
//! Record filtering on resolved dimension values.
//!
//! Filters run on the flat source before any grouping. A filtering layer can
//! also resolve field names through the configured dimensions with
//! `DimensionValueResolver`, the same resolution the grouping uses.

use crate::definition::{
    ComparisonOperator, DimensionFilter, PivotConfiguration, PivotDimension, TextOperator,
};
use crate::value::{FieldValue, Record, RecordId};

/// Resolves field names against the enabled dimensions of a configuration.
#[derive(Debug)]
pub struct DimensionValueResolver<'a> {
    dimensions: Vec<&'a PivotDimension>,
}

impl<'a> DimensionValueResolver<'a> {
    pub fn new(config: &'a PivotConfiguration) -> Self {
        DimensionValueResolver {
            dimensions: config.all_dimensions(),
        }
    }

    /// Value of `field` for `record`: through the dimension of that name if
    /// one is configured, otherwise the raw field.
    pub fn resolve(&self, field: &str, record: &Record) -> FieldValue {
        match self.dimensions.iter().find(|d| d.member_name() == field) {
            Some(dim) => dim.resolve(record),
            None => record.get(field).cloned().unwrap_or_default(),
        }
    }
}

impl DimensionFilter {
    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            DimensionFilter::ValueList { values } => values.contains(value),
            DimensionFilter::Exclude { values } => !values.contains(value),
            DimensionFilter::Number { operator, value: a, value2 } => match value.as_number() {
                Some(n) => compare_number(*operator, n, *a, *value2),
                None => false,
            },
            DimensionFilter::Text { operator, value: needle, case_sensitive } => {
                let text = value.label();
                if *case_sensitive {
                    compare_text(*operator, &text, needle)
                } else {
                    compare_text(*operator, &text.to_lowercase(), &needle.to_lowercase())
                }
            }
        }
    }
}

fn compare_number(operator: ComparisonOperator, n: f64, a: f64, b: Option<f64>) -> bool {
    match operator {
        ComparisonOperator::Equals => n == a,
        ComparisonOperator::NotEquals => n != a,
        ComparisonOperator::GreaterThan => n > a,
        ComparisonOperator::GreaterThanOrEqual => n >= a,
        ComparisonOperator::LessThan => n < a,
        ComparisonOperator::LessThanOrEqual => n <= a,
        ComparisonOperator::Between | ComparisonOperator::NotBetween => {
            let b = b.unwrap_or(a);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let inside = n >= lo && n <= hi;
            inside == (operator == ComparisonOperator::Between)
        }
    }
}

fn compare_text(operator: TextOperator, text: &str, needle: &str) -> bool {
    match operator {
        TextOperator::Equals => text == needle,
        TextOperator::NotEquals => text != needle,
        TextOperator::Contains => text.contains(needle),
        TextOperator::NotContains => !text.contains(needle),
        TextOperator::BeginsWith => text.starts_with(needle),
        TextOperator::EndsWith => text.ends_with(needle),
    }
}

/// Ids of the source records that pass every dimension filter in `config`.
pub fn filter_records(source: &[Record], config: &PivotConfiguration) -> Vec<RecordId> {
    let filtered: Vec<&PivotDimension> = config
        .all_dimensions()
        .into_iter()
        .filter(|d| d.filter.is_some())
        .collect();

    (0..source.len())
        .filter(|&i| {
            filtered.iter().all(|dim| match &dim.filter {
                Some(filter) => filter.matches(&dim.resolve(&source[i])),
                None => true,
            })
        })
        .map(|i| i as RecordId)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from;

    fn data() -> Vec<Record> {
        vec![
            record_from([("region", FieldValue::from("EU")), ("sales", 10.into())]),
            record_from([("region", FieldValue::from("US")), ("sales", 25.into())]),
            record_from([("region", FieldValue::from("APAC")), ("sales", "n/a".into())]),
        ]
    }

    #[test]
    fn test_value_list_and_exclude() {
        let include = DimensionFilter::ValueList { values: vec!["EU".into(), "US".into()] };
        assert!(include.matches(&"EU".into()));
        assert!(!include.matches(&"APAC".into()));

        let exclude = DimensionFilter::Exclude { values: vec![FieldValue::Empty] };
        assert!(!exclude.matches(&FieldValue::Empty));
        assert!(exclude.matches(&"EU".into()));
    }

    #[test]
    fn test_number_filter_rejects_non_numbers() {
        let filter = DimensionFilter::Number {
            operator: ComparisonOperator::Between,
            value: 20.0,
            value2: Some(5.0),
        };
        assert!(filter.matches(&10.into()));
        assert!(!filter.matches(&25.into()));
        assert!(!filter.matches(&"10".into()));

        let outside = DimensionFilter::Number {
            operator: ComparisonOperator::NotBetween,
            value: 5.0,
            value2: Some(20.0),
        };
        assert!(outside.matches(&25.into()));
    }

    #[test]
    fn test_text_filter_case() {
        let filter = DimensionFilter::Text {
            operator: TextOperator::BeginsWith,
            value: "ap".to_string(),
            case_sensitive: false,
        };
        assert!(filter.matches(&"APAC".into()));

        let strict = DimensionFilter::Text {
            operator: TextOperator::BeginsWith,
            value: "ap".to_string(),
            case_sensitive: true,
        };
        assert!(!strict.matches(&"APAC".into()));
    }

    #[test]
    fn test_filter_records_uses_every_filtered_dimension() {
        let data = data();
        let mut config = PivotConfiguration::default();
        config.rows.push(PivotDimension::new("region").with_filter(DimensionFilter::Exclude {
            values: vec!["APAC".into()],
        }));
        config.filters.push(PivotDimension::new("sales").with_filter(DimensionFilter::Number {
            operator: ComparisonOperator::GreaterThan,
            value: 15.0,
            value2: None,
        }));
        assert_eq!(filter_records(&data, &config), vec![1]);
    }

    #[test]
    fn test_disabled_filter_dimension_is_ignored() {
        let data = data();
        let mut config = PivotConfiguration::default();
        config.filters.push(
            PivotDimension::new("region")
                .with_filter(DimensionFilter::ValueList { values: vec!["EU".into()] })
                .disabled(),
        );
        assert_eq!(filter_records(&data, &config), vec![0, 1, 2]);
    }

    #[test]
    fn test_resolver_prefers_dimension_derivation() {
        let mut config = PivotConfiguration::default();
        config.rows.push(PivotDimension::computed("bucket", |r: &Record| {
            match r.get("sales").and_then(|v| v.as_number()) {
                Some(n) if n >= 20.0 => "high".into(),
                Some(_) => "low".into(),
                None => FieldValue::Empty,
            }
        }));
        let resolver = DimensionValueResolver::new(&config);
        let data = data();
        assert_eq!(resolver.resolve("bucket", &data[1]), FieldValue::from("high"));
        assert_eq!(resolver.resolve("bucket", &data[2]), FieldValue::Empty);
        assert_eq!(resolver.resolve("region", &data[0]), FieldValue::from("EU"));
    }
}
