//! BIP21 `bitcoin:` URIs as pasted into on-chain withdraw fields.

use serde::Serialize;
use url::form_urlencoded;

use crate::amount::Satoshi;
use crate::error::UriError;

const SCHEME: &str = "bitcoin:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinUri {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Satoshi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// BOLT11 invoice carried by a unified QR code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightning: Option<String>,
}

/// Parse a plain address or a `bitcoin:` URI. The scheme is matched
/// case-insensitively and unknown parameters are ignored.
pub fn parse_bitcoin_uri(input: &str) -> Result<BitcoinUri, UriError> {
    let trimmed = input.trim();
    let body = match trimmed.get(..SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => &trimmed[SCHEME.len()..],
        _ => trimmed,
    };

    let (address, query) = body.split_once('?').unwrap_or((body, ""));
    let address = address.trim_start_matches('/').trim();
    if address.is_empty() {
        return Err(UriError::MissingAddress);
    }

    let mut uri = BitcoinUri {
        address: address.to_string(),
        amount: None,
        label: None,
        message: None,
        lightning: None,
    };
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.to_ascii_lowercase().as_str() {
            "amount" => {
                let amount = Satoshi::from_btc_str(&value).map_err(UriError::InvalidAmount)?;
                uri.amount = Some(amount);
            }
            "label" => uri.label = Some(value.into_owned()),
            "message" => uri.message = Some(value.into_owned()),
            "lightning" => uri.lightning = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmountError;

    #[test]
    fn plain_address_passes_through() {
        let uri = parse_bitcoin_uri("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq").unwrap();
        assert_eq!(uri.address, "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq");
        assert_eq!(uri.amount, None);
    }

    #[test]
    fn parses_amount_and_labels_exactly() {
        let uri = parse_bitcoin_uri(
            "BITCOIN:bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq?amount=0.00015&label=Coffee%20Shop&message=thanks+a+lot",
        )
        .unwrap();
        assert_eq!(uri.address, "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq");
        assert_eq!(uri.amount, Some(Satoshi::new(15_000).unwrap()));
        assert_eq!(uri.label.as_deref(), Some("Coffee Shop"));
        assert_eq!(uri.message.as_deref(), Some("thanks a lot"));
    }

    #[test]
    fn unified_qr_carries_invoice() {
        let uri = parse_bitcoin_uri("bitcoin:bc1qexample?lightning=lnbc1500n1xyz").unwrap();
        assert_eq!(uri.lightning.as_deref(), Some("lnbc1500n1xyz"));
    }

    #[test]
    fn rejects_missing_address_and_bad_amounts() {
        assert_eq!(parse_bitcoin_uri("bitcoin:"), Err(UriError::MissingAddress));
        assert_eq!(
            parse_bitcoin_uri("bitcoin:?amount=1"),
            Err(UriError::MissingAddress)
        );
        assert_eq!(
            parse_bitcoin_uri("bitcoin:bc1q?amount=0.123456789"),
            Err(UriError::InvalidAmount(AmountError::TooManyDecimals {
                decimals: 9,
                max: 8
            }))
        );
        assert!(matches!(
            parse_bitcoin_uri("bitcoin:bc1q?amount=-1"),
            Err(UriError::InvalidAmount(AmountError::Negative))
        ));
    }
}
