//! Exact integer satoshi amounts.
//!
//! Monetary values never pass through binary floating point. Every boundary
//! that accepts loosely typed input (JSON, CLI text) goes through
//! [`RawAmount`] so that a float where a satoshi count is required fails
//! loudly instead of being truncated.

use std::fmt::{self, Display};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AmountError;

/// 1 BTC = 100,000,000 satoshis.
pub const SATOSHI_PER_BITCOIN: u64 = 100_000_000;
/// Maximum supply in satoshis.
pub const MAX_SUPPLY_SAT: u64 = 21_000_000_u64 * SATOSHI_PER_BITCOIN;

const BITCOIN_DECIMALS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Satoshi(u64);

impl Satoshi {
    pub const ZERO: Satoshi = Satoshi(0);

    pub fn new(value: u64) -> Result<Self, AmountError> {
        if value > MAX_SUPPLY_SAT {
            return Err(AmountError::AboveMaximum {
                value: value.to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Accepts a decimal only if it is a non-negative whole number.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative);
        }
        if !value.fract().is_zero() {
            return Err(AmountError::NotAnInteger {
                found: value.normalize().to_string(),
            });
        }
        let whole = value.to_u64().ok_or_else(|| AmountError::AboveMaximum {
            value: value.normalize().to_string(),
        })?;
        Self::new(whole)
    }

    /// Parse a decimal BTC string ("0.0015", ".5", "21000000") without
    /// any floating-point math.
    pub fn from_btc_str(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative);
        }
        if !s.chars().all(|c| c.is_ascii_digit() || c == '.') || s == "." {
            return Err(AmountError::InvalidFormat {
                input: s.to_string(),
            });
        }

        let mut parts = s.splitn(2, '.');
        let whole_str = parts.next().unwrap_or_default();
        let frac_str = parts.next();
        if frac_str.is_some_and(|frac| frac.contains('.')) {
            return Err(AmountError::InvalidFormat {
                input: s.to_string(),
            });
        }

        let whole = parse_u64_digits(whole_str)?;
        let whole_sat = whole
            .checked_mul(SATOSHI_PER_BITCOIN)
            .ok_or(AmountError::Overflow)?;

        let frac_sat = match frac_str {
            None => 0,
            Some(fraction) => {
                if fraction.len() > BITCOIN_DECIMALS {
                    return Err(AmountError::TooManyDecimals {
                        decimals: fraction.len(),
                        max: BITCOIN_DECIMALS as u32,
                    });
                }
                let mut padded = fraction.to_string();
                while padded.len() < BITCOIN_DECIMALS {
                    padded.push('0');
                }
                parse_u64_digits(&padded)?
            }
        };

        let total = whole_sat
            .checked_add(frac_sat)
            .ok_or(AmountError::Overflow)?;
        Self::new(total)
    }

    /// Whole-coin string with trailing zeros trimmed.
    pub fn to_btc_string(&self) -> String {
        let whole = self.0 / SATOSHI_PER_BITCOIN;
        let frac = self.0 % SATOSHI_PER_BITCOIN;
        if frac == 0 {
            return whole.to_string();
        }

        let mut frac_str = format!("{frac:08}");
        while frac_str.ends_with('0') {
            frac_str.pop();
        }
        format!("{whole}.{frac_str}")
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    pub fn checked_add(self, other: Satoshi) -> Result<Satoshi, AmountError> {
        let sum = self.0.checked_add(other.0).ok_or(AmountError::Overflow)?;
        Satoshi::new(sum)
    }
}

impl TryFrom<u64> for Satoshi {
    type Error = AmountError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Satoshi> for u64 {
    fn from(value: Satoshi) -> Self {
        value.0
    }
}

impl Display for Satoshi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Satoshi {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Satoshi::try_from(RawAmount::Text(s.to_string()))
    }
}

/// A loosely typed amount arriving from outside the type system.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Integer(i128),
    Float(f64),
    Text(String),
}

impl TryFrom<RawAmount> for Satoshi {
    type Error = AmountError;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        match raw {
            RawAmount::Integer(value) if value < 0 => Err(AmountError::Negative),
            RawAmount::Integer(value) => {
                let value = u64::try_from(value).map_err(|_| AmountError::AboveMaximum {
                    value: value.to_string(),
                })?;
                Satoshi::new(value)
            }
            RawAmount::Float(value) => Err(AmountError::NotAnInteger {
                found: value.to_string(),
            }),
            RawAmount::Text(text) => {
                let s = text.trim();
                if s.is_empty() {
                    return Err(AmountError::Empty);
                }
                if s.starts_with('-') {
                    return Err(AmountError::Negative);
                }
                if s.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Satoshi::new(parse_u64_digits(s)?);
                }
                if Decimal::from_str(s).is_ok() {
                    return Err(AmountError::NotAnInteger {
                        found: s.to_string(),
                    });
                }
                Err(AmountError::InvalidFormat {
                    input: s.to_string(),
                })
            }
        }
    }
}

impl TryFrom<&serde_json::Value> for Satoshi {
    type Error = AmountError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(number) => {
                if let Some(unsigned) = number.as_u64() {
                    Satoshi::try_from(RawAmount::Integer(i128::from(unsigned)))
                } else if let Some(signed) = number.as_i64() {
                    Satoshi::try_from(RawAmount::Integer(i128::from(signed)))
                } else {
                    Satoshi::try_from(RawAmount::Float(number.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(text) => Satoshi::try_from(RawAmount::Text(text.clone())),
            other => Err(AmountError::InvalidFormat {
                input: other.to_string(),
            }),
        }
    }
}

fn parse_u64_digits(s: &str) -> Result<u64, AmountError> {
    if s.is_empty() {
        return Ok(0);
    }
    if !s.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(AmountError::InvalidFormat {
            input: s.to_string(),
        });
    }
    s.parse::<u64>().map_err(|_| AmountError::Overflow)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn satoshi_accepts_zero_and_max_supply() {
        assert_eq!(Satoshi::new(0).unwrap(), Satoshi::ZERO);
        assert_eq!(Satoshi::new(MAX_SUPPLY_SAT).unwrap().as_u64(), MAX_SUPPLY_SAT);
        assert!(matches!(
            Satoshi::new(MAX_SUPPLY_SAT + 1),
            Err(AmountError::AboveMaximum { .. })
        ));
    }

    #[test]
    fn parses_btc_strings() {
        assert_eq!(Satoshi::from_btc_str("1").unwrap().as_u64(), 100_000_000);
        assert_eq!(Satoshi::from_btc_str("1.5").unwrap().as_u64(), 150_000_000);
        assert_eq!(Satoshi::from_btc_str(".5").unwrap().as_u64(), 50_000_000);
        assert_eq!(Satoshi::from_btc_str("1.").unwrap().as_u64(), 100_000_000);
        assert_eq!(Satoshi::from_btc_str("0.00000001").unwrap().as_u64(), 1);
        assert_eq!(
            Satoshi::from_btc_str("21000000").unwrap().as_u64(),
            MAX_SUPPLY_SAT
        );
    }

    #[test]
    fn rejects_bad_btc_strings() {
        assert!(matches!(Satoshi::from_btc_str(""), Err(AmountError::Empty)));
        assert!(matches!(Satoshi::from_btc_str("-1"), Err(AmountError::Negative)));
        assert!(matches!(
            Satoshi::from_btc_str("0.000000001"),
            Err(AmountError::TooManyDecimals { decimals: 9, max: 8 })
        ));
        assert!(matches!(
            Satoshi::from_btc_str("1.2.3"),
            Err(AmountError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Satoshi::from_btc_str("1,5"),
            Err(AmountError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Satoshi::from_btc_str("21000000.00000001"),
            Err(AmountError::AboveMaximum { .. })
        ));
    }

    #[test]
    fn formats_btc_without_trailing_zeros() {
        assert_eq!(Satoshi::new(100_000_000).unwrap().to_btc_string(), "1");
        assert_eq!(Satoshi::new(150_000_000).unwrap().to_btc_string(), "1.5");
        assert_eq!(Satoshi::new(1).unwrap().to_btc_string(), "0.00000001");
    }

    #[test]
    fn float_input_is_a_typed_error() {
        let err = Satoshi::try_from(RawAmount::Float(1.0)).unwrap_err();
        assert!(matches!(err, AmountError::NotAnInteger { .. }));

        let err = Satoshi::try_from(&json!(1500.25)).unwrap_err();
        assert!(matches!(err, AmountError::NotAnInteger { .. }));

        let err = "12.5".parse::<Satoshi>().unwrap_err();
        assert_eq!(
            err,
            AmountError::NotAnInteger {
                found: "12.5".to_string()
            }
        );
    }

    #[test]
    fn integer_inputs_are_accepted() {
        assert_eq!(Satoshi::try_from(&json!(1500)).unwrap().as_u64(), 1500);
        assert_eq!(Satoshi::try_from(&json!("1500")).unwrap().as_u64(), 1500);
        assert_eq!("42".parse::<Satoshi>().unwrap().as_u64(), 42);
        assert!(matches!(
            Satoshi::try_from(&json!(-3)),
            Err(AmountError::Negative)
        ));
        assert!(matches!(
            Satoshi::try_from(&json!(true)),
            Err(AmountError::InvalidFormat { .. })
        ));
        assert!(matches!(
            "abc".parse::<Satoshi>(),
            Err(AmountError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn from_decimal_requires_whole_numbers() {
        assert_eq!(
            Satoshi::from_decimal(Decimal::new(1200, 2)).unwrap().as_u64(),
            12
        );
        assert!(matches!(
            Satoshi::from_decimal(Decimal::new(125, 1)),
            Err(AmountError::NotAnInteger { .. })
        ));
        assert!(matches!(
            Satoshi::from_decimal(Decimal::new(-5, 0)),
            Err(AmountError::Negative)
        ));
    }

    #[test]
    fn serde_rejects_floats_and_out_of_range() {
        assert!(serde_json::from_str::<Satoshi>("1.5").is_err());
        assert!(serde_json::from_str::<Satoshi>("2100000000000001").is_err());
        assert_eq!(serde_json::from_str::<Satoshi>("21").unwrap().as_u64(), 21);
    }

    proptest! {
        #[test]
        fn btc_string_roundtrip(value in 0u64..=MAX_SUPPLY_SAT) {
            let sat = Satoshi::new(value).unwrap();
            let reparsed = Satoshi::from_btc_str(&sat.to_btc_string()).unwrap();
            prop_assert_eq!(reparsed, sat);
        }
    }
}
