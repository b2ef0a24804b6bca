//! Role identifier normalisation.
//!
//! The backend reports `role_id` as a scalar, an array, or a comma-separated
//! string (`"3,6"`). Everything downstream works on [`RoleIds`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deduplicated role identifiers in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleIds(Vec<i64>);

impl RoleIds {
    /// Build from raw ids, dropping duplicates but keeping first-seen order.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut out: Vec<i64> = Vec::new();
        for id in ids {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    /// Normalise a raw `role_id` JSON value.
    #[must_use]
    pub fn from_value(raw: &Value) -> Self {
        Self::new(normalize_role_ids(raw))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// True when any of `ids` is held.
    #[must_use]
    pub fn contains_any(&self, ids: &[i64]) -> bool {
        ids.iter().any(|id| self.contains(*id))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Comma-joined form used in the `ids` query parameter.
    #[must_use]
    pub fn join(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for RoleIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

/// Normalise a raw `role_id` value into deduplicated integers.
///
/// Accepts a number, an array of numbers or numeric strings, or a
/// comma-separated string. Non-numeric entries are discarded. A falsy scalar
/// (`null`, `false`, `0`, `""`) means "no role" and yields an empty list.
#[must_use]
pub fn normalize_role_ids(raw: &Value) -> Vec<i64> {
    let ids: Vec<i64> = match raw {
        Value::Null | Value::Bool(_) | Value::Object(_) => Vec::new(),
        Value::Number(_) => scalar_id(raw).filter(|id| *id != 0).into_iter().collect(),
        Value::String(s) => s.split(',').filter_map(parse_id).collect(),
        Value::Array(items) => items.iter().filter_map(scalar_id).collect(),
    };
    RoleIds::new(ids).0
}

/// Largest float that still maps onto an exact integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_991.0;

fn scalar_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_float)),
        Value::String(s) => parse_id(s),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse()
        .ok()
        .or_else(|| trimmed.parse().ok().and_then(integral_float))
}

#[allow(clippy::cast_possible_truncation)] // integral and range-checked
fn integral_float(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT).then_some(f as i64)
}
