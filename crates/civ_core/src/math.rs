//! Fixed-point math utilities for deterministic simulation.
//!
//! All resource amounts, capacities and rates use fixed-point arithmetic
//! so that the same starting state and command sequence always produce
//! bit-identical results, regardless of platform.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// A quantity of some resource. Never negative once stored in a ledger.
pub type Amount = Fixed;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_bits()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

/// Serde support for maps of fixed-point values in saved state.
///
/// Same representation as [`fixed_serde`], applied to each value.
pub mod fixed_map_serde {
    use std::collections::BTreeMap;

    use super::Fixed;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize each value as its raw bits.
    pub fn serialize<K, S>(map: &BTreeMap<K, Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize + Ord,
        S: Serializer,
    {
        let view: BTreeMap<&K, i64> = map.iter().map(|(k, v)| (k, v.to_bits())).collect();
        view.serialize(serializer)
    }

    /// Deserialize each value from its raw bits.
    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, Fixed>, D::Error>
    where
        K: DeserializeOwned + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, i64>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(k, v)| (k, Fixed::from_bits(v)))
            .collect())
    }
}

/// Serde support for human-authored content files.
///
/// Content (building costs, gather rates) is written by hand as decimal
/// numbers such as `3.5`. Parsing goes through the decimal string so the
/// resulting value does not depend on float rounding in the parser.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal string.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize a fixed-point number from a decimal string or integer.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Fixed::from_num(n)),
            Raw::Text(s) => s
                .trim()
                .parse::<Fixed>()
                .map_err(|e| D::Error::custom(format!("invalid decimal '{s}': {e}"))),
        }
    }
}

/// Optional variant of [`decimal_serde`].
pub mod option_decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Decimal(#[serde(with = "super::decimal_serde")] Fixed);

    /// Serialize an optional fixed-point number as a decimal string.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Decimal).serialize(serializer)
    }

    /// Deserialize an optional fixed-point number from a decimal string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Decimal>::deserialize(deserializer)?.map(|d| d.0))
    }
}

/// Serde support for maps of fixed-point values in content files.
///
/// Same representation as [`decimal_serde`], applied to each value.
pub mod decimal_map_serde {
    use std::collections::BTreeMap;

    use super::Fixed;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Decimal(#[serde(with = "super::decimal_serde")] Fixed);

    /// Serialize each value as a decimal string.
    pub fn serialize<K, S>(map: &BTreeMap<K, Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize + Ord,
        S: Serializer,
    {
        let view: BTreeMap<&K, Decimal> = map.iter().map(|(k, v)| (k, Decimal(*v))).collect();
        view.serialize(serializer)
    }

    /// Deserialize each value from a decimal string or integer.
    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, Fixed>, D::Error>
    where
        K: DeserializeOwned + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, Decimal>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.0)).collect())
    }
}

/// Parse a decimal literal into a fixed-point value.
///
/// Returns `None` for malformed input.
#[must_use]
pub fn parse_decimal(text: &str) -> Option<Fixed> {
    text.trim().parse::<Fixed>().ok()
}

/// Scale `value` by `percent` where `100` leaves it unchanged.
///
/// Negative totals are floored at zero percent.
#[must_use]
pub fn apply_percent(value: Fixed, percent: i32) -> Fixed {
    let percent = Fixed::from_num(percent.max(0));
    let hundred = Fixed::from_num(100);
    value
        .checked_mul(percent)
        .map_or_else(|| value.saturating_mul(percent / hundred), |scaled| scaled / hundred)
}

/// Clamp `value` into `[0, capacity]`; `None` capacity means unbounded.
#[must_use]
pub fn clamp_amount(value: Fixed, capacity: Option<Fixed>) -> Fixed {
    let floored = value.max(Fixed::ZERO);
    match capacity {
        Some(cap) => floored.min(cap.max(Fixed::ZERO)),
        None => floored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_apply_percent() {
        let base = Fixed::from_num(10);
        assert_eq!(apply_percent(base, 100), base);
        assert_eq!(apply_percent(base, 120), Fixed::from_num(12));
        assert_eq!(apply_percent(base, -50), Fixed::ZERO);
        assert_eq!(apply_percent(Fixed::MAX, 300), Fixed::MAX);
        assert_eq!(apply_percent(Fixed::MAX, 100), Fixed::MAX);
        let half = apply_percent(Fixed::MAX, 50);
        assert!(half > Fixed::from_num(1_000_000_000) && half < Fixed::MAX);
    }

    #[test]
    fn test_clamp_amount() {
        let cap = Some(Fixed::from_num(50));
        assert_eq!(clamp_amount(Fixed::from_num(-3), cap), Fixed::ZERO);
        assert_eq!(clamp_amount(Fixed::from_num(60), cap), Fixed::from_num(50));
        assert_eq!(clamp_amount(Fixed::from_num(60), None), Fixed::from_num(60));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("3.5"), Some(Fixed::from_num(3.5)));
        assert_eq!(parse_decimal(" 20 "), Some(Fixed::from_num(20)));
        assert_eq!(parse_decimal("lots"), None);
    }

    #[test]
    fn test_decimal_serde_from_ron() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "decimal_serde")]
            value: Fixed,
        }

        let w: Wrapper = ron::from_str("(value: \"0.5\")").unwrap();
        assert_eq!(w.value, Fixed::from_num(0.5));
        let w: Wrapper = ron::from_str("(value: 4)").unwrap();
        assert_eq!(w.value, Fixed::from_num(4));
    }
}
