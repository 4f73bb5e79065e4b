//! Display preferences for amount entry.

use serde::{Deserialize, Serialize};

use crate::error::AmountError;
use crate::units::BitcoinUnit;

/// The unit amounts are shown in, plus the fiat rate to mirror them with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmountSettings {
    pub unit: BitcoinUnit,
    /// Fiat per whole bitcoin. `None` disables the fiat side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat_code: Option<String>,
}

impl Default for AmountSettings {
    fn default() -> Self {
        Self {
            unit: BitcoinUnit::Sat,
            fiat_rate: None,
            fiat_code: None,
        }
    }
}

impl AmountSettings {
    pub fn with_unit(mut self, unit: BitcoinUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Rejects rates that could not price an amount.
    pub fn with_fiat(mut self, rate: f64, code: Option<String>) -> Result<Self, AmountError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AmountError::InvalidRate {
                rate: rate.to_string(),
            });
        }
        self.fiat_rate = Some(rate);
        self.fiat_code = code.filter(|code| !code.trim().is_empty());
        Ok(self)
    }
}
