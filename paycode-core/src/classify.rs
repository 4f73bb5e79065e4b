//! Classification of scanned, pasted or typed payment codes.
//!
//! [`classify`] runs a fixed pipeline of total functions. The order of the
//! steps, and of the branches in the last one, decides which protocol wins
//! when a string could superficially match more than one:
//!
//! 1. [`normalize`]: trim, lower-case, drop a leading `lightning:` scheme.
//! 2. [`extract_fallback`]: unwrap an LNURL fallback-scheme web link down to
//!    the embedded `lnurl`/`lnbc`/`lntb` token.
//! 3. [`split_marker`]: for double-wrapped links, keep only what follows the
//!    first `lightning=` marker.
//! 4. Branch, first match wins: LNURL family, Lightning Address, anything
//!    else with the `ln` invoice prefix, otherwise
//!    [`Classification::Unrecognized`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::ClassifyError;
use crate::lnurl::{self, Discriminant, LightningAddress, LnurlTarget};

const LIGHTNING_SCHEME: &str = "lightning:";
const LIGHTNING_MARKER: &str = "lightning=";
const INVOICE_PREFIX: &str = "ln";

static FALLBACK_SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(http.*[&?]lightning=)?((lnurl|lnbc|lntb)([0-9]+[a-z0-9]+))")
        .expect("fallback scheme regex is valid")
});


/// Result of classifying one input. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Classification {
    Bolt11Invoice { raw: String },
    /// LNURL whose sub-protocol is only known after resolving the target.
    LnurlPending { target: LnurlTarget },
    LnurlAuthRequest { target: LnurlTarget },
    LnurlChannelRequest { target: LnurlTarget },
    LnurlWithdrawRequest { target: LnurlTarget },
    LnurlPayRequest { target: LnurlTarget },
    LightningAddressRequest { address: LightningAddress },
    Unrecognized,
}

impl Classification {
    /// Narrow a pending LNURL target once its discriminant is known.
    /// Unknown discriminants yield `None`.
    pub fn resolve_lnurl(target: LnurlTarget, discriminant: &Discriminant) -> Option<Self> {
        match discriminant {
            Discriminant::Login => Some(Classification::LnurlAuthRequest { target }),
            Discriminant::ChannelRequest => Some(Classification::LnurlChannelRequest { target }),
            Discriminant::WithdrawRequest => Some(Classification::LnurlWithdrawRequest { target }),
            Discriminant::PayRequest => Some(Classification::LnurlPayRequest { target }),
            Discriminant::Other(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Classification::Bolt11Invoice { .. } => "bolt11Invoice",
            Classification::LnurlPending { .. } => "lnurlPending",
            Classification::LnurlAuthRequest { .. } => "lnurlAuthRequest",
            Classification::LnurlChannelRequest { .. } => "lnurlChannelRequest",
            Classification::LnurlWithdrawRequest { .. } => "lnurlWithdrawRequest",
            Classification::LnurlPayRequest { .. } => "lnurlPayRequest",
            Classification::LightningAddressRequest { .. } => "lightningAddressRequest",
            Classification::Unrecognized => "unrecognized",
        }
    }

    pub fn lnurl_target(&self) -> Option<&LnurlTarget> {
        match self {
            Classification::LnurlPending { target }
            | Classification::LnurlAuthRequest { target }
            | Classification::LnurlChannelRequest { target }
            | Classification::LnurlWithdrawRequest { target }
            | Classification::LnurlPayRequest { target } => Some(target),
            _ => None,
        }
    }

    /// Text that classifies back to an equal value, when one exists.
    pub fn canonical_text(&self) -> Option<String> {
        match self {
            Classification::Bolt11Invoice { raw } => Some(raw.clone()),
            Classification::LightningAddressRequest { address } => Some(address.to_string()),
            other => other
                .lnurl_target()
                .and_then(LnurlTarget::raw_bech32)
                .map(str::to_string),
        }
    }
}

/// Classify `raw_input`.
///
/// Never fails on an unrecognized shape; errors only when a recognized LNURL
/// shape carries content that does not decode.
pub fn classify(raw_input: &str) -> Result<Classification, ClassifyError> {
    let normalized = normalize(raw_input);
    let unwrapped = extract_fallback(&normalized);
    let Some(code) = split_marker(unwrapped) else {
        debug!("empty payload after lightning= marker");
        return Ok(Classification::Unrecognized);
    };

    let classification = branch(code)?;
    debug!(kind = classification.kind(), "classified payment code");
    Ok(classification)
}

/// Post: lower-case, trimmed, without a leading `lightning:` scheme.
pub fn normalize(raw_input: &str) -> String {
    let lowered = raw_input.trim().to_lowercase();
    match lowered.strip_prefix(LIGHTNING_SCHEME) {
        Some(rest) => rest.trim_start().to_string(),
        None => lowered,
    }
}

/// Post: the embedded lightning token when `code` is a fallback-scheme link
/// or starts with one, otherwise `code` unchanged.
pub fn extract_fallback(code: &str) -> &str {
    match FALLBACK_SCHEME.captures(code).and_then(|caps| caps.get(2)) {
        Some(token) => token.as_str(),
        None => code,
    }
}

/// Post: `code` unchanged when it carries no `lightning=` marker; otherwise
/// the value after the first marker, cut at the next parameter. `None` when
/// that value is empty.
pub fn split_marker(code: &str) -> Option<&str> {
    let Some((_, rest)) = code.split_once(LIGHTNING_MARKER) else {
        return Some(code);
    };
    let end = rest
        .find(|c: char| c == '&' || c == '#' || c.is_whitespace())
        .unwrap_or(rest.len());
    let value = &rest[..end];
    (!value.is_empty()).then_some(value)
}

fn branch(code: &str) -> Result<Classification, ClassifyError> {
    if code.starts_with("lnurl") || code.starts_with("keyauth") {
        let target = lnurl::parse_lnurl(code)?;
        return Ok(Classification::LnurlPending { target });
    }

    if code.contains('@') {
        return Ok(match LightningAddress::parse(code) {
            Some(address) => Classification::LightningAddressRequest { address },
            None => Classification::Unrecognized,
        });
    }

    // Damaged invoices still go to the invoice handler so its decode error
    // reaches the user.
    if code.starts_with(INVOICE_PREFIX) {
        return Ok(Classification::Bolt11Invoice {
            raw: code.to_string(),
        });
    }

    Ok(Classification::Unrecognized)
}
