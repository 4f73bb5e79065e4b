//! State behind a paired bitcoin/fiat amount input.
//!
//! Editing either side recomputes the other. The bitcoin side accepts the
//! arithmetic understood by [`crate::expr`], and a keystroke that leaves the
//! expression unparsable keeps the last good value instead of clearing it.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::amount::Satoshi;
use crate::expr;
use crate::settings::AmountSettings;
use crate::units::{self, BitcoinUnit};

const EXPRESSION_CHARS: [char; 9] = ['+', '-', '*', '/', '(', ')', 'x', '×', '÷'];

#[derive(Debug, Clone)]
pub struct AmountField {
    settings: AmountSettings,
    bitcoin_text: Option<String>,
    fiat_text: Option<String>,
    // Last value of the bitcoin side that evaluated, in the display unit.
    last_value: String,
}

impl AmountField {
    pub fn new(settings: AmountSettings) -> Self {
        Self {
            settings,
            bitcoin_text: None,
            fiat_text: None,
            last_value: "0".to_string(),
        }
    }

    /// Field pre-filled with `satoshi`.
    pub fn with_initial(settings: AmountSettings, satoshi: Satoshi) -> Self {
        let mut field = Self::new(settings);
        let value = units::value_bitcoin(satoshi, field.settings.unit);
        field.fiat_text = field.fiat_for(satoshi);
        field.bitcoin_text = Some(value.clone());
        field.last_value = value;
        field
    }

    pub fn settings(&self) -> &AmountSettings {
        &self.settings
    }

    pub fn unit(&self) -> BitcoinUnit {
        self.settings.unit
    }

    /// Text shown on the bitcoin side, `None` when cleared.
    pub fn bitcoin_text(&self) -> Option<&str> {
        self.bitcoin_text.as_deref()
    }

    /// Text shown on the fiat side, `None` when cleared or without a rate.
    pub fn fiat_text(&self) -> Option<&str> {
        self.fiat_text.as_deref()
    }

    pub fn on_change_bitcoin_input(&mut self, text: &str) {
        let text: String = match self.settings.unit {
            BitcoinUnit::Sat | BitcoinUnit::Satoshi => text
                .chars()
                .filter(|c| c.is_ascii_digit() || EXPRESSION_CHARS.contains(c))
                .collect(),
            _ => text.replace(',', "."),
        };
        if text.is_empty() {
            self.clear();
            return;
        }

        self.last_value = expr::evaluate_or(&text, &self.last_value);
        self.bitcoin_text = Some(text);
        self.fiat_text = self.satoshi().and_then(|satoshi| self.fiat_for(satoshi));
    }

    pub fn on_change_fiat_input(&mut self, text: &str) {
        let text = text.replace(',', ".");
        if text.is_empty() || text.starts_with('.') {
            self.clear();
            return;
        }

        if let Some(rate) = self.settings.fiat_rate {
            let bitcoin = expr::evaluate(&text)
                .map_err(|err| err.to_string())
                .and_then(|fiat| {
                    units::value_bitcoin_from_fiat(fiat, rate, self.settings.unit)
                        .map_err(|err| err.to_string())
                });
            match bitcoin {
                Ok(value) => {
                    let value = value.to_string();
                    self.bitcoin_text = Some(value.clone());
                    self.last_value = value;
                }
                Err(error) => debug!(input = %text, %error, "fiat input did not convert"),
            }
        }
        self.fiat_text = Some(text);
    }

    /// Exact amount currently entered, if any.
    pub fn satoshi(&self) -> Option<Satoshi> {
        self.bitcoin_text.as_ref()?;
        let value = Decimal::from_str(&self.last_value).ok()?;
        units::unit_to_satoshi(value, self.settings.unit).ok()
    }

    fn clear(&mut self) {
        self.bitcoin_text = None;
        self.fiat_text = None;
        self.last_value = "0".to_string();
    }

    fn fiat_for(&self, satoshi: Satoshi) -> Option<String> {
        let rate = self.settings.fiat_rate?;
        match units::convert_bitcoin_to_fiat(satoshi, rate, None) {
            Ok(fiat) => Some(fiat),
            Err(error) => {
                debug!(%error, "could not price amount in fiat");
                None
            }
        }
    }
}
