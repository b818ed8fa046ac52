//! FILENAME: core/pivot-grid/src/aggregate.rs
//! Aggregation functions.
//!
//! An aggregator is a pure reduction over the values of one field across a
//! leaf set. Non-numeric and missing values arrive as `None`: numeric
//! reductions skip them, `COUNT` counts them.
//!
//! Built-ins and custom aggregators are looked up the same way, by key, in an
//! `AggregatorRegistry`. Unknown keys are rejected when the engine is built.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{PivotError, Result};

/// Result of one aggregation. `None` when the reduction has no defined value.
pub type AggregateValue = Option<f64>;

/// A pure reduction over a leaf value sequence.
pub trait Aggregator: Send + Sync {
    fn aggregate(&self, values: &[Option<f64>]) -> AggregateValue;
}

impl<F> Aggregator for F
where
    F: Fn(&[Option<f64>]) -> AggregateValue + Send + Sync,
{
    fn aggregate(&self, values: &[Option<f64>]) -> AggregateValue {
        self(values)
    }
}

pub type AggregatorRef = Arc<dyn Aggregator>;

// ============================================================================
// BUILT-IN AGGREGATIONS
// ============================================================================

/// Supported built-in aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationType {
    Sum,
    Count,
    Average,
    Min,
    Max,
    CountNumbers,
    StdDev,
    StdDevP,
    Var,
    VarP,
    Product,
}

impl AggregationType {
    pub const ALL: [AggregationType; 11] = [
        AggregationType::Sum,
        AggregationType::Count,
        AggregationType::Average,
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::CountNumbers,
        AggregationType::StdDev,
        AggregationType::StdDevP,
        AggregationType::Var,
        AggregationType::VarP,
        AggregationType::Product,
    ];

    /// Registry key.
    pub fn key(self) -> &'static str {
        match self {
            AggregationType::Sum => "SUM",
            AggregationType::Count => "COUNT",
            AggregationType::Average => "AVG",
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
            AggregationType::CountNumbers => "COUNT_NUMBERS",
            AggregationType::StdDev => "STDDEV",
            AggregationType::StdDevP => "STDDEVP",
            AggregationType::Var => "VAR",
            AggregationType::VarP => "VARP",
            AggregationType::Product => "PRODUCT",
        }
    }
}

impl Aggregator for AggregationType {
    fn aggregate(&self, values: &[Option<f64>]) -> AggregateValue {
        let mut acc = AggregateAccumulator::new();
        for value in values {
            match value {
                Some(n) => acc.add_number(*n),
                None => acc.add_non_number(),
            }
        }
        acc.compute(*self)
    }
}

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Accumulator for computing aggregates incrementally.
/// Stores intermediate state needed for all aggregation types.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    pub sum: f64,
    pub count: u64,
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub product: Option<f64>,
    /// Welford's running mean and sum of squared differences.
    pub mean: f64,
    pub m2: f64,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a numeric value to the accumulator.
    pub fn add_number(&mut self, value: f64) {
        self.count += 1;
        self.count_numbers += 1;
        self.sum += value;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.product = Some(self.product.map_or(value, |p| p * value));

        let delta = value - self.mean;
        self.mean += delta / (self.count_numbers as f64);
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Adds a missing or non-numeric value (only increments count).
    pub fn add_non_number(&mut self) {
        self.count += 1;
    }

    /// Computes the final aggregate value.
    /// Empty input: 0 for sums and counts, `None` for everything else.
    pub fn compute(&self, aggregation: AggregationType) -> AggregateValue {
        let n = self.count_numbers as f64;
        match aggregation {
            AggregationType::Sum => Some(self.sum),
            AggregationType::Count => Some(self.count as f64),
            AggregationType::CountNumbers => Some(n),
            AggregationType::Average => (self.count_numbers > 0).then(|| self.sum / n),
            AggregationType::Min => self.min,
            AggregationType::Max => self.max,
            AggregationType::Product => self.product,
            AggregationType::Var => (self.count_numbers > 1).then(|| self.m2 / (n - 1.0)),
            AggregationType::VarP => (self.count_numbers > 0).then(|| self.m2 / n),
            AggregationType::StdDev => (self.count_numbers > 1).then(|| (self.m2 / (n - 1.0)).sqrt()),
            AggregationType::StdDevP => (self.count_numbers > 0).then(|| (self.m2 / n).sqrt()),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Key -> aggregator lookup shared by built-in and custom aggregations.
#[derive(Clone)]
pub struct AggregatorRegistry {
    aggregators: FxHashMap<String, AggregatorRef>,
}

impl AggregatorRegistry {
    /// An empty registry. Most callers want `with_builtins`.
    pub fn empty() -> Self {
        AggregatorRegistry {
            aggregators: FxHashMap::default(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for agg in AggregationType::ALL {
            registry.register(agg.key(), agg);
        }
        registry
    }

    /// Registers (or replaces) an aggregator under `key`. Keys are case-insensitive.
    pub fn register(&mut self, key: &str, aggregator: impl Aggregator + 'static) -> &mut Self {
        self.aggregators
            .insert(key.to_ascii_uppercase(), Arc::new(aggregator));
        self
    }

    pub fn resolve(&self, key: &str) -> Result<AggregatorRef> {
        self.aggregators
            .get(&key.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| PivotError::UnknownAggregator(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.aggregators.contains_key(&key.to_ascii_uppercase())
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AggregatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.aggregators.keys().collect();
        keys.sort();
        f.debug_struct("AggregatorRegistry").field("keys", &keys).finish()
    }
}
