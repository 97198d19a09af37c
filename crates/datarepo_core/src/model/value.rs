//! Field types and runtime field values.
//!
//! # Responsibility
//! - Describe the declared storage type of every descriptor field.
//! - Convert caller-facing values into SQLite bind values and back.
//!
//! # Invariants
//! - Decimal fields are stored as INTEGER minor units (`value * 10^scale`).
//! - Conversions never round silently on writes or equality predicates.

use rusqlite::types::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Declared type of a descriptor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Text,
    /// Fixed-point decimal persisted as minor units with `scale` fraction digits.
    Decimal { scale: u32 },
}

impl FieldType {
    /// Returns whether numeric aggregates (`avg`, `sum`, `min`, `max`) apply.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Text => write!(f, "text"),
            Self::Decimal { scale } => write!(f, "decimal({scale})"),
        }
    }
}

/// Caller-facing value used in predicates, writes and group keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Decimal(Decimal),
}

impl FieldValue {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

/// How a decimal that does not fit the field scale is mapped to minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rounding {
    /// Reject values with more fraction digits than the scale.
    Exact,
    Floor,
    Ceil,
}

/// Encodes `value` as the storage representation of `field_type`.
///
/// Returns a human-readable message on mismatch; callers attach the path.
pub(crate) fn encode(
    field_type: FieldType,
    value: &FieldValue,
    rounding: Rounding,
) -> Result<Value, String> {
    match (field_type, value) {
        (FieldType::Integer, FieldValue::Integer(value)) => Ok(Value::Integer(*value)),
        (FieldType::Text, FieldValue::Text(value)) => Ok(Value::Text(value.clone())),
        (FieldType::Decimal { scale }, FieldValue::Decimal(value)) => {
            decimal_to_minor(*value, scale, rounding).map(Value::Integer)
        }
        (FieldType::Decimal { scale }, FieldValue::Integer(value)) => {
            decimal_to_minor(Decimal::from(*value), scale, rounding).map(Value::Integer)
        }
        (expected, other) => Err(format!(
            "expected {expected} value, got {}",
            other.kind_name()
        )),
    }
}

/// Converts a decimal into minor units for the given scale.
pub(crate) fn decimal_to_minor(value: Decimal, scale: u32, rounding: Rounding) -> Result<i64, String> {
    let factor = 10_i64
        .checked_pow(scale)
        .map(Decimal::from)
        .ok_or_else(|| format!("decimal scale {scale} is out of range"))?;
    let scaled = value
        .checked_mul(factor)
        .ok_or_else(|| format!("value {value} overflows decimal scale {scale}"))?;

    let rounded = match rounding {
        Rounding::Exact => {
            if !scaled.fract().is_zero() {
                return Err(format!(
                    "value {value} has more than {scale} fraction digits"
                ));
            }
            scaled
        }
        Rounding::Floor => scaled.floor(),
        Rounding::Ceil => scaled.ceil(),
    };

    rounded
        .to_i64()
        .ok_or_else(|| format!("value {value} does not fit the storage range"))
}

/// Rebuilds a decimal from stored minor units.
pub(crate) fn decimal_from_minor(minor: i64, scale: u32) -> Result<Decimal, String> {
    Decimal::try_new(minor, scale)
        .map_err(|err| format!("cannot rebuild decimal from {minor} at scale {scale}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{decimal_from_minor, decimal_to_minor, encode, FieldType, FieldValue, Rounding};
    use rusqlite::types::Value;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn exact_conversion_rejects_excess_precision() {
        assert_eq!(decimal_to_minor(dec("12.34"), 2, Rounding::Exact), Ok(1234));
        let error = decimal_to_minor(dec("12.345"), 2, Rounding::Exact).unwrap_err();
        assert!(error.contains("fraction digits"));
    }

    #[test]
    fn comparison_rounding_moves_to_the_correct_side() {
        assert_eq!(decimal_to_minor(dec("12.345"), 2, Rounding::Ceil), Ok(1235));
        assert_eq!(decimal_to_minor(dec("12.345"), 2, Rounding::Floor), Ok(1234));
        assert_eq!(decimal_to_minor(dec("-12.345"), 2, Rounding::Floor), Ok(-1235));
    }

    #[test]
    fn integers_widen_into_decimal_fields() {
        let value = encode(
            FieldType::Decimal { scale: 2 },
            &FieldValue::Integer(2000),
            Rounding::Exact,
        )
        .unwrap();
        assert_eq!(value, Value::Integer(200_000));
    }

    #[test]
    fn mismatched_types_are_reported() {
        let error = encode(FieldType::Text, &FieldValue::Integer(1), Rounding::Exact).unwrap_err();
        assert_eq!(error, "expected text value, got integer");
    }

    #[test]
    fn minor_units_roundtrip_keeps_scale() {
        let value = decimal_from_minor(300_000, 2).unwrap();
        assert_eq!(value, dec("3000.00"));
        assert_eq!(value.scale(), 2);
    }
}
