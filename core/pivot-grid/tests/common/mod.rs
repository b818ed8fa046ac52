//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot-grid integration tests.

#![allow(dead_code)]

use pivot_grid::{
    record_from, AggregatorRegistry, FieldValue, PivotConfiguration, PivotEngine, PivotResult,
    Record, RecordId,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Sales data: region, product, quarter, sales, quantity.
pub struct SalesFixture;

impl SalesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Region", "Product", "Quarter", "Sales", "Quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    pub fn records() -> Vec<Record> {
        let headers = Self::headers();
        Self::data()
            .into_iter()
            .map(|(region, product, quarter, sales, quantity)| {
                record_from([
                    (headers[0], FieldValue::from(region)),
                    (headers[1], FieldValue::from(product)),
                    (headers[2], FieldValue::from(quarter)),
                    (headers[3], FieldValue::from(sales)),
                    (headers[4], FieldValue::from(quantity)),
                ])
            })
            .collect()
    }

    /// Sum of `Sales` over the rows matching the given filters.
    pub fn expected_sales(region: Option<&str>, product: Option<&str>, quarter: Option<&str>) -> f64 {
        Self::data()
            .into_iter()
            .filter(|(r, p, q, _, _)| {
                region.map_or(true, |x| x == *r)
                    && product.map_or(true, |x| x == *p)
                    && quarter.map_or(true, |x| x == *q)
            })
            .map(|(_, _, _, sales, _)| sales)
            .sum()
    }
}

/// The small region/sales example: EU 10 + 5, US 20.
pub fn region_records() -> Vec<Record> {
    vec![
        record_from([("region", FieldValue::from("EU")), ("sales", 10.into())]),
        record_from([("region", FieldValue::from("EU")), ("sales", 5.into())]),
        record_from([("region", FieldValue::from("US")), ("sales", 20.into())]),
    ]
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn build(config: PivotConfiguration, records: &[Record]) -> PivotResult {
    PivotEngine::new(config, &AggregatorRegistry::with_builtins())
        .expect("valid configuration")
        .build(records)
        .expect("build succeeds")
}

/// Group value path from text labels.
pub fn path(labels: &[&str]) -> Vec<FieldValue> {
    labels.iter().map(|l| FieldValue::from(*l)).collect()
}

pub fn sorted(mut ids: Vec<RecordId>) -> Vec<RecordId> {
    ids.sort_unstable();
    ids
}

/// Assert that an aggregate is a number close to `expected`.
pub fn assert_aggregate(actual: Option<f64>, expected: f64) {
    match actual {
        Some(n) => assert!(
            (n - expected).abs() < 0.001,
            "expected {} but got {}",
            expected,
            n
        ),
        None => panic!("expected Some({}) but got None", expected),
    }
}
