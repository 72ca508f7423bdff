//! Value coercions used by the rule sets.
//!
//! Every function is total: input that cannot be interpreted becomes
//! [`Value::Null`].

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use dwh_shared::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%b-%Y"];

/// Coerce to a date-time. Dates become midnight; offsets are normalized to UTC.
pub fn to_datetime(value: &Value) -> Value {
    match value {
        Value::DateTime(dt) => Value::DateTime(*dt),
        Value::Date(d) => d.and_hms_opt(0, 0, 0).map_or(Value::Null, Value::DateTime),
        Value::Text(s) => parse_datetime(s).map_or(Value::Null, Value::DateTime),
        _ => Value::Null,
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Coerce to a fixed-precision decimal.
pub fn to_decimal(value: &Value) -> Value {
    decimal_of(value).map_or(Value::Null, Value::Decimal)
}

pub(crate) fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Float(f) => Decimal::try_from(*f).ok(),
        Value::Text(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}

/// Coerce to an integer, truncating any fractional part.
pub fn to_integer(value: &Value) -> Value {
    let truncated = match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.is_finite() => f.trunc().to_i64(),
        other => decimal_of(other).and_then(|d| d.trunc().to_i64()),
    };
    truncated.map_or(Value::Null, Value::Integer)
}

/// Calendar year of a date or date-time value.
pub fn year_of(value: &Value) -> Option<i32> {
    match value {
        Value::DateTime(dt) => Some(dt.year()),
        Value::Date(d) => Some(d.year()),
        _ => None,
    }
}
