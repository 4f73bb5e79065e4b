//! Bitcoin display units and conversions between them and fiat.
//!
//! All arithmetic runs on [`Decimal`]. The only binary float accepted anywhere
//! is the fiat exchange rate, which is approximate by nature and converted to
//! a decimal before it touches an amount.

use std::fmt::{self, Display};
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::amount::Satoshi;
use crate::error::AmountError;

const FIAT_DECIMALS: u32 = 2;

/// A bitcoin-denominated display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BitcoinUnit {
    Bitcoin,
    MilliBitcoin,
    Bit,
    Sat,
    Satoshi,
}

impl BitcoinUnit {
    /// Every unit, largest first.
    pub const ALL: [BitcoinUnit; 5] = [
        BitcoinUnit::Bitcoin,
        BitcoinUnit::MilliBitcoin,
        BitcoinUnit::Bit,
        BitcoinUnit::Sat,
        BitcoinUnit::Satoshi,
    ];

    /// Canonical key used in settings and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            BitcoinUnit::Bitcoin => "bitcoin",
            BitcoinUnit::MilliBitcoin => "milliBitcoin",
            BitcoinUnit::Bit => "bit",
            BitcoinUnit::Sat => "sat",
            BitcoinUnit::Satoshi => "satoshi",
        }
    }

    /// Short label printed after an amount.
    pub fn nice(&self) -> &'static str {
        match self {
            BitcoinUnit::Bitcoin => "₿",
            BitcoinUnit::MilliBitcoin => "mBTC",
            BitcoinUnit::Bit => "bit",
            BitcoinUnit::Sat => "sat",
            BitcoinUnit::Satoshi => "satoshi",
        }
    }

    /// Label shown in the settings menu.
    pub fn settings_label(&self) -> &'static str {
        match self {
            BitcoinUnit::Bitcoin => "Bitcoin",
            BitcoinUnit::MilliBitcoin => "Milli Bitcoin",
            BitcoinUnit::Bit => "Bits",
            BitcoinUnit::Sat => "Sats",
            BitcoinUnit::Satoshi => "Satoshi",
        }
    }

    pub fn pluralize(&self) -> bool {
        matches!(self, BitcoinUnit::Bit | BitcoinUnit::Sat)
    }

    /// Size of one of this unit in whole bitcoin.
    pub fn unit(&self) -> Decimal {
        Decimal::new(1, self.decimals())
    }

    /// Fixed number of display decimals. Also the base-10 exponent between
    /// this unit and one satoshi.
    pub fn decimals(&self) -> u32 {
        match self {
            BitcoinUnit::Bitcoin => 8,
            BitcoinUnit::MilliBitcoin => 5,
            BitcoinUnit::Bit => 2,
            BitcoinUnit::Sat | BitcoinUnit::Satoshi => 0,
        }
    }

    fn label_for(&self, value: Decimal) -> String {
        if self.pluralize() && value != Decimal::ONE {
            format!("{}s", self.nice())
        } else {
            self.nice().to_string()
        }
    }
}

impl Display for BitcoinUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BitcoinUnit {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(BitcoinUnit::Bitcoin),
            "millibitcoin" | "mbtc" => Ok(BitcoinUnit::MilliBitcoin),
            "bit" | "bits" => Ok(BitcoinUnit::Bit),
            "sat" | "sats" => Ok(BitcoinUnit::Sat),
            "satoshi" | "satoshis" => Ok(BitcoinUnit::Satoshi),
            other => Err(AmountError::UnknownUnit(other.to_string())),
        }
    }
}

/// Convert `value` between units through the whole-coin base.
pub fn convert(value: Decimal, from: BitcoinUnit, to: BitcoinUnit) -> Result<Decimal, AmountError> {
    let base = value
        .checked_mul(from.unit())
        .ok_or(AmountError::Overflow)?;
    base.checked_div(to.unit()).ok_or(AmountError::Overflow)
}

/// Exact value of `satoshi` expressed in `unit`.
pub fn satoshi_to_unit(satoshi: Satoshi, unit: BitcoinUnit) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(satoshi.as_u64()), unit.decimals())
}

/// Display string for an amount, e.g. `"100,000,000 sats"` or
/// `"1.234 567 89 ₿"`.
pub fn format_bitcoin(satoshi: Satoshi, unit: BitcoinUnit) -> String {
    let value = satoshi_to_unit(satoshi, unit);
    let digits = match unit {
        BitcoinUnit::Bitcoin => {
            let fixed = format!("{:.*}", unit.decimals() as usize, value);
            match fixed.split_once('.') {
                Some((whole, fraction)) => format!("{whole}.{}", group_fraction(fraction)),
                None => fixed,
            }
        }
        BitcoinUnit::MilliBitcoin | BitcoinUnit::Bit => value.normalize().to_string(),
        BitcoinUnit::Sat | BitcoinUnit::Satoshi => group_thousands(&value.trunc().to_string(), ','),
    };
    format!("{digits} {}", unit.label_for(value))
}

/// Plain decimal string of `satoshi` in `unit`, as written into an editable
/// amount field.
pub fn value_bitcoin(satoshi: Satoshi, unit: BitcoinUnit) -> String {
    satoshi_to_unit(satoshi, unit).normalize().to_string()
}

/// Inverse of [`value_bitcoin`]. Precision beyond one satoshi is truncated.
pub fn unit_to_satoshi(value: Decimal, unit: BitcoinUnit) -> Result<Satoshi, AmountError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative);
    }
    let sats = convert(value, unit, BitcoinUnit::Satoshi)?;
    Satoshi::from_decimal(sats.trunc())
}

/// Fiat value of `satoshi` at `rate` fiat per bitcoin, unrounded.
pub fn value_fiat(satoshi: Satoshi, rate: f64) -> Result<Decimal, AmountError> {
    let rate = rate_to_decimal(rate)?;
    satoshi_to_unit(satoshi, BitcoinUnit::Bitcoin)
        .checked_mul(rate)
        .ok_or(AmountError::Overflow)
}

/// Fiat display string fixed to two decimals, optionally suffixed with a
/// currency code (`"12.34 USD"`).
pub fn convert_bitcoin_to_fiat(
    satoshi: Satoshi,
    rate: f64,
    fiat_code: Option<&str>,
) -> Result<String, AmountError> {
    let fiat = value_fiat(satoshi, rate)?
        .round_dp_with_strategy(FIAT_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.*}", FIAT_DECIMALS as usize, fiat);
    Ok(match fiat_code {
        Some(code) if !code.is_empty() => format!("{fixed} {code}"),
        _ => fixed,
    })
}

/// Amount in `unit` worth `fiat` at `rate`, truncated to the unit's decimals.
pub fn value_bitcoin_from_fiat(
    fiat: Decimal,
    rate: f64,
    unit: BitcoinUnit,
) -> Result<Decimal, AmountError> {
    if fiat.is_sign_negative() && !fiat.is_zero() {
        return Err(AmountError::Negative);
    }
    let rate = rate_to_decimal(rate)?;
    let btc = fiat.checked_div(rate).ok_or(AmountError::Overflow)?;
    let value = convert(btc, BitcoinUnit::Bitcoin, unit)?;
    Ok(value
        .round_dp_with_strategy(unit.decimals(), RoundingStrategy::ToZero)
        .normalize())
}

/// Group integer digits in threes separated by spaces ("1 000 000").
pub fn format_number_groupings(subject: &str) -> String {
    match subject.split_once('.') {
        Some((whole, fraction)) => format!("{}.{fraction}", group_thousands(whole, ' ')),
        None => group_thousands(subject, ' '),
    }
}

fn rate_to_decimal(rate: f64) -> Result<Decimal, AmountError> {
    let invalid = || AmountError::InvalidRate {
        rate: rate.to_string(),
    };
    if !rate.is_finite() || rate <= 0.0 {
        return Err(invalid());
    }
    let decimal = Decimal::from_f64(rate).ok_or_else(invalid)?;
    if decimal.is_zero() {
        return Err(invalid());
    }
    Ok(decimal)
}

fn group_thousands(digits: &str, separator: char) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

// 3-3-2 clusters: "23456789" -> "234 567 89".
fn group_fraction(fraction: &str) -> String {
    let mut grouped = String::with_capacity(fraction.len() + 2);
    for (idx, ch) in fraction.chars().enumerate() {
        if idx == 3 || idx == 6 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}
