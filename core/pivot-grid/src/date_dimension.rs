//! FILENAME: core/pivot-grid/src/date_dimension.rs
//! Date hierarchy dimension: All Periods -> Years -> Quarters -> Months -> Full Date.
//!
//! Each level is a computed member over the same source field. Text values
//! are parsed as ISO-8601 dates or date-times; numbers are Unix milliseconds.
//! Values that are not dates fall into the empty group at every level.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::definition::{DimensionMember, PivotDimension};
use crate::value::{FieldValue, Record};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Levels for the date hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGroupLevel {
    Year,
    Quarter,
    Month,
    FullDate,
}

/// Which levels a date dimension includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateDimensionOptions {
    pub total: bool,
    pub years: bool,
    pub quarters: bool,
    pub months: bool,
    pub full_date: bool,
}

impl Default for DateDimensionOptions {
    fn default() -> Self {
        DateDimensionOptions {
            total: true,
            years: true,
            quarters: true,
            months: true,
            full_date: true,
        }
    }
}

/// Formats the member name for a date grouping level.
pub fn format_date_level_name(field_name: &str, level: DateGroupLevel) -> String {
    match level {
        DateGroupLevel::Year => format!("{} (Year)", field_name),
        DateGroupLevel::Quarter => format!("{} (Quarter)", field_name),
        DateGroupLevel::Month => format!("{} (Month)", field_name),
        DateGroupLevel::FullDate => field_name.to_string(),
    }
}

/// Parses a field value as a calendar date.
pub fn parse_date(value: &FieldValue) -> Option<NaiveDate> {
    match value {
        FieldValue::Text(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        }
        FieldValue::Number(n) => {
            let ms = n.as_f64();
            if !ms.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis(ms as i64).map(|dt| dt.date_naive())
        }
        _ => None,
    }
}

/// Converts a date to the grouping value of one level.
pub fn date_level_value(date: NaiveDate, level: DateGroupLevel) -> FieldValue {
    match level {
        DateGroupLevel::Year => FieldValue::from(date.year().to_string()),
        DateGroupLevel::Quarter => FieldValue::from(format!("Q{}", date.month0() / 3 + 1)),
        DateGroupLevel::Month => FieldValue::from(MONTH_NAMES[date.month0() as usize]),
        DateGroupLevel::FullDate => FieldValue::from(date.format("%Y-%m-%d").to_string()),
    }
}

fn level_dimension(member: &str, level: DateGroupLevel) -> PivotDimension {
    let field = member.to_string();
    PivotDimension::with_member(DimensionMember::computed(
        format_date_level_name(member, level),
        move |record: &Record| {
            record
                .get(&field)
                .and_then(parse_date)
                .map_or(FieldValue::Empty, |date| date_level_value(date, level))
        },
    ))
}

/// Builds the date hierarchy dimension over `member`.
/// With every level switched off the result is the plain field dimension.
pub fn date_dimension(member: &str, options: DateDimensionOptions) -> PivotDimension {
    let mut levels: Vec<PivotDimension> = Vec::new();
    if options.total {
        levels.push(PivotDimension::computed("AllPeriods", |_: &Record| {
            FieldValue::from("All Periods")
        }));
    }
    let flags = [
        (options.years, DateGroupLevel::Year),
        (options.quarters, DateGroupLevel::Quarter),
        (options.months, DateGroupLevel::Month),
        (options.full_date, DateGroupLevel::FullDate),
    ];
    for (enabled, level) in flags {
        if enabled {
            levels.push(level_dimension(member, level));
        }
    }

    // Fold innermost-first so each level owns the next as its child.
    let mut nested: Option<PivotDimension> = None;
    for mut dim in levels.into_iter().rev() {
        if let Some(child) = nested.take() {
            dim.child_levels.push(child);
        }
        nested = Some(dim);
    }
    nested.unwrap_or_else(|| PivotDimension::new(member))
}
