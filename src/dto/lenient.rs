//! Forgiving number parsing for catalog forms: numbers and numeric strings are
//! accepted, anything else degrades to zero or "absent" instead of failing.

use std::str::FromStr;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn decimal_from(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

fn count_from(value: &Value) -> Option<i32> {
    decimal_from(value)
        .filter(|d| d.fract().is_zero())
        .and_then(|d| d.to_i32())
}

pub fn decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from(&value).unwrap_or(Decimal::ZERO))
}

pub fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from(&value))
}

pub fn optional_count<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from(&value))
}

/// For partial updates: a present field that fails to parse becomes zero.
pub fn patch_decimal_or_zero<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    decimal_or_zero(deserializer).map(Some)
}

/// For partial updates: `Some(None)` clears the field.
pub fn patch_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_decimal(deserializer).map(Some)
}

pub fn patch_optional_count<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_count(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Form {
        #[serde(default, deserialize_with = "decimal_or_zero")]
        price: Decimal,
        #[serde(default, deserialize_with = "optional_decimal")]
        wholesale_price: Option<Decimal>,
        #[serde(default, deserialize_with = "optional_count")]
        min_order: Option<i32>,
        #[serde(default, deserialize_with = "patch_optional_count")]
        wholesale_min_qty: Option<Option<i32>>,
    }

    fn parse(json: &str) -> Form {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let form = parse(r#"{"price": "12.50", "wholesale_price": 11, "min_order": "5"}"#);
        assert_eq!(form.price, Decimal::new(1250, 2));
        assert_eq!(form.wholesale_price, Some(Decimal::from(11)));
        assert_eq!(form.min_order, Some(5));
    }

    #[test]
    fn malformed_numbers_degrade() {
        let form = parse(r#"{"price": "abc", "wholesale_price": "", "min_order": 2.5}"#);
        assert_eq!(form.price, Decimal::ZERO);
        assert_eq!(form.wholesale_price, None);
        assert_eq!(form.min_order, None);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let form = parse("{}");
        assert_eq!(form.price, Decimal::ZERO);
        assert_eq!(form.wholesale_min_qty, None);
    }

    #[test]
    fn explicit_null_clears_patch_field() {
        let form = parse(r#"{"wholesale_min_qty": null}"#);
        assert_eq!(form.wholesale_min_qty, Some(None));
    }
}
