//! Exact fixed-point arithmetic over the integer-string amounts that flow through
//! the datastore. No `f64` ever touches money (§9 of the spec).

use num_bigint::BigUint;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("invalid raw amount: {0}")]
    InvalidRaw(String),
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl ComparisonOp {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "==" | "=" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Neq),
            _ => None,
        }
    }
}

/// `amount_raw / 10^decimals`, produced by integer division and fractional padding
/// and trimmed of trailing zeros — never by parsing into a float.
pub fn raw_to_human(raw: &str, decimals: u32) -> Result<String, DecimalError> {
    let value = BigUint::from_str(raw).map_err(|_| DecimalError::InvalidRaw(raw.to_string()))?;
    let digits = value.to_str_radix(10);

    if decimals == 0 {
        return Ok(digits);
    }

    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{:0>width$}", digits, width = decimals + 1)
    } else {
        digits
    };

    let split_at = padded.len() - decimals;
    let (int_part, frac_part) = padded.split_at(split_at);
    let trimmed_frac = frac_part.trim_end_matches('0');

    if trimmed_frac.is_empty() {
        Ok(int_part.to_string())
    } else {
        Ok(format!("{int_part}.{trimmed_frac}"))
    }
}

/// The inverse of `raw_to_human`: scales a human decimal string up to a raw
/// integer string. Used when a rule's `topup_amount_human` must become the
/// `amount_raw` an execution worker hands to the signer (§4.7).
pub fn human_to_raw(human: &str, decimals: u32) -> Result<String, DecimalError> {
    let value = Decimal::from_str(human).map_err(|_| DecimalError::InvalidDecimal(human.to_string()))?;
    let scale = Decimal::from(10u128.pow(decimals.min(28)) as u64);
    let scaled = value * scale;
    if scaled.fract() != Decimal::ZERO {
        return Err(DecimalError::InvalidDecimal(format!(
            "{human} carries more precision than {decimals} decimals"
        )));
    }
    Ok(scaled.trunc().to_string())
}

/// Exact decimal comparison over human-readable amount strings. `balance = 0` is a
/// valid comparand, never treated as "missing".
pub fn compare(lhs: &str, rhs: &str, op: ComparisonOp) -> Result<bool, DecimalError> {
    let a = Decimal::from_str(lhs).map_err(|_| DecimalError::InvalidDecimal(lhs.to_string()))?;
    let b = Decimal::from_str(rhs).map_err(|_| DecimalError::InvalidDecimal(rhs.to_string()))?;
    let ord = a.cmp(&b);
    Ok(match op {
        ComparisonOp::Gt => ord == Ordering::Greater,
        ComparisonOp::Gte => ord != Ordering::Less,
        ComparisonOp::Lt => ord == Ordering::Less,
        ComparisonOp::Lte => ord != Ordering::Greater,
        ComparisonOp::Eq => ord == Ordering::Equal,
        ComparisonOp::Neq => ord != Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_division_with_padding() {
        assert_eq!(raw_to_human("10000000", 6).unwrap(), "10");
        assert_eq!(raw_to_human("10500000", 6).unwrap(), "10.5");
        assert_eq!(raw_to_human("1", 6).unwrap(), "0.000001");
        assert_eq!(raw_to_human("0", 6).unwrap(), "0");
        assert_eq!(raw_to_human("123", 0).unwrap(), "123");
    }

    #[test]
    fn zero_is_not_missing() {
        assert!(compare("0", "0", ComparisonOp::Eq).unwrap());
        assert!(compare("0", "2", ComparisonOp::Lt).unwrap());
        assert!(!compare("0", "2", ComparisonOp::Gt).unwrap());
    }

    #[test]
    fn unknown_operator_is_rejected_by_caller() {
        assert!(ComparisonOp::parse("~=").is_none());
    }

    proptest::proptest! {
        #[test]
        fn raw_to_human_roundtrips_integer_part(n in 0u64..1_000_000_000u64, decimals in 0u32..18u32) {
            let raw = (n as u128 * 10u128.pow(decimals)).to_string();
            let human = raw_to_human(&raw, decimals).unwrap();
            let expected_int = n.to_string();
            let int_part = human.split('.').next().unwrap();
            prop_assert_eq!(int_part, expected_int);
        }
    }
}
