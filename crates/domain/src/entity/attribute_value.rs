//! Typed attribute values reported alongside an entity's state.

use serde::{Deserialize, Serialize};

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Numeric view of the value.
    ///
    /// Strings are parsed leniently (hosts often report numbers as text).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::String(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Json(_) => None,
        }
    }

    /// Compare against a textual expectation, case-insensitively.
    #[must_use]
    pub fn matches_text(&self, expected: &str) -> bool {
        match self {
            Self::Bool(v) => v.to_string().eq_ignore_ascii_case(expected),
            Self::Int(v) => v.to_string() == expected,
            Self::Float(v) => expected.parse::<f64>().is_ok_and(|e| (e - v).abs() < f64::EPSILON),
            Self::String(s) => s.eq_ignore_ascii_case(expected),
            Self::Json(v) => v.to_string() == expected,
        }
    }
}
