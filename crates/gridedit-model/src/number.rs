//! Whole numbers in the interchange format.
//!
//! Sizes are `f64` in memory, but stored values write `100`, not `100.0`.
//! Fields opt in with `#[serde(serialize_with = ...)]` so an unchanged value
//! serializes back to the same text.

use serde::Serializer;
use serde_json::Value;

/// Largest magnitude below which every whole `f64` is an exact integer.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

fn as_whole(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT).then_some(value as i64)
}

pub(crate) fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match as_whole(*value) {
        Some(whole) => serializer.serialize_i64(whole),
        None => serializer.serialize_f64(*value),
    }
}

pub(crate) fn serialize_option<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serialize(value, serializer),
        None => serializer.serialize_none(),
    }
}

/// A JSON number for `value`, integral when it has no fraction.
pub fn number_value(value: f64) -> Value {
    match as_whole(value) {
        Some(whole) => Value::from(whole),
        None => Value::from(value),
    }
}
