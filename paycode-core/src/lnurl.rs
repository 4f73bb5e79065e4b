//! LNURL targets, discriminants and Lightning Addresses.
//!
//! Decoding here is purely textual: bech32 payloads are turned back into the
//! URL they wrap and LUD-17 schemes are rewritten to HTTPS. Fetching the
//! target is the resolver's job.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClassifyError;

const LNURL_HRP: &str = "lnurl";
/// LUD-17 schemes for pay, withdraw and channel requests.
const LUD17_SCHEMES: [&str; 3] = ["lnurlp:", "lnurlw:", "lnurlc:"];
const KEYAUTH_SCHEME: &str = "keyauth:";

/// Where an LNURL request must be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LnurlTarget {
    /// Came in as a URL scheme (`lnurlp:`, `lnurlw:`, `lnurlc:`, `keyauth:`).
    Url { url: Url },
    /// Came in as a bech32 payload with the `lnurl` prefix.
    Bech32 { raw: String, url: Url },
}

impl LnurlTarget {
    pub fn url(&self) -> &Url {
        match self {
            LnurlTarget::Url { url } | LnurlTarget::Bech32 { url, .. } => url,
        }
    }

    pub fn raw_bech32(&self) -> Option<&str> {
        match self {
            LnurlTarget::Bech32 { raw, .. } => Some(raw),
            LnurlTarget::Url { .. } => None,
        }
    }

    /// Host shown to the user on confirmation screens.
    pub fn domain(&self) -> Option<&str> {
        self.url().host_str()
    }

    /// Login and channel requests may carry their `tag` in the query string,
    /// which lets a resolver skip the metadata fetch.
    pub fn inline_discriminant(&self) -> Option<Discriminant> {
        self.url()
            .query_pairs()
            .find(|(key, _)| key == "tag")
            .map(|(_, value)| Discriminant::parse(&value))
            .filter(|tag| matches!(tag, Discriminant::Login | Discriminant::ChannelRequest))
    }
}

impl Display for LnurlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Decode a lower-cased code already known to start with `lnurl` or
/// `keyauth`.
pub fn parse_lnurl(code: &str) -> Result<LnurlTarget, ClassifyError> {
    if let Some(body) = LUD17_SCHEMES
        .iter()
        .find_map(|scheme| code.strip_prefix(scheme))
    {
        return from_scheme_body(body);
    }
    if let Some(body) = code.strip_prefix(KEYAUTH_SCHEME) {
        return from_scheme_body(body);
    }
    from_bech32(code)
}

fn from_scheme_body(body: &str) -> Result<LnurlTarget, ClassifyError> {
    let body = body.trim_start_matches('/');
    let end = body
        .find(|c: char| c.is_whitespace() || c == '&')
        .unwrap_or(body.len());
    let body = &body[..end];

    let host = body.split(['/', '?', '#', ':']).next().unwrap_or_default();
    let scheme = if host.ends_with(".onion") { "http" } else { "https" };
    let url = parse_http_url(&format!("{scheme}://{body}"))?;
    Ok(LnurlTarget::Url { url })
}

fn from_bech32(raw: &str) -> Result<LnurlTarget, ClassifyError> {
    let (hrp, data) = bech32::decode(raw).map_err(|err| ClassifyError::Bech32(err.to_string()))?;
    let hrp = hrp.to_string().to_ascii_lowercase();
    if hrp != LNURL_HRP {
        return Err(ClassifyError::UnexpectedHrp { found: hrp });
    }

    let decoded = String::from_utf8(data).map_err(|_| ClassifyError::PayloadNotUtf8)?;
    let url = parse_http_url(decoded.trim())?;
    Ok(LnurlTarget::Bech32 {
        raw: raw.to_string(),
        url,
    })
}

fn parse_http_url(input: &str) -> Result<Url, ClassifyError> {
    let malformed = |reason: String| ClassifyError::MalformedUrl {
        input: input.to_string(),
        reason,
    };
    let url = Url::parse(input).map_err(|err| malformed(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(malformed(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(malformed("missing host".to_string()));
    }
    Ok(url)
}

/// The `tag` an LNURL service answers with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Discriminant {
    ChannelRequest,
    Login,
    WithdrawRequest,
    PayRequest,
    Other(String),
}

impl Discriminant {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "channelRequest" => Discriminant::ChannelRequest,
            "login" => Discriminant::Login,
            "withdrawRequest" => Discriminant::WithdrawRequest,
            "payRequest" => Discriminant::PayRequest,
            other => Discriminant::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Discriminant::ChannelRequest => "channelRequest",
            Discriminant::Login => "login",
            Discriminant::WithdrawRequest => "withdrawRequest",
            Discriminant::PayRequest => "payRequest",
            Discriminant::Other(other) => other,
        }
    }
}

impl From<String> for Discriminant {
    fn from(value: String) -> Self {
        Discriminant::parse(&value)
    }
}

impl From<Discriminant> for String {
    fn from(value: Discriminant) -> Self {
        value.as_str().to_string()
    }
}

impl Display for Discriminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `user@domain` identifier that resolves to an LNURL-pay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightningAddress {
    pub user: String,
    pub domain: String,
}

impl LightningAddress {
    /// `None` unless both sides of the `@` are present and free of
    /// whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        let (user, domain) = input.trim().split_once('@')?;
        let valid = |part: &str| {
            !part.is_empty() && !part.contains('@') && !part.chars().any(char::is_whitespace)
        };
        if !valid(user) || !valid(domain) {
            return None;
        }
        Some(Self {
            user: user.to_lowercase(),
            domain: domain.to_lowercase(),
        })
    }

    /// LUD-16 endpoint, `http` for onion services.
    pub fn well_known_url(&self) -> Result<Url, ClassifyError> {
        let scheme = if self.domain.ends_with(".onion") {
            "http"
        } else {
            "https"
        };
        parse_http_url(&format!(
            "{scheme}://{}/.well-known/lnurlp/{}",
            self.domain, self.user
        ))
    }
}

impl Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use bech32::{Bech32, Hrp};

    use super::*;

    fn encode(hrp: &str, payload: &[u8]) -> String {
        bech32::encode::<Bech32>(Hrp::parse(hrp).unwrap(), payload).unwrap()
    }

    #[test]
    fn lud17_scheme_becomes_https_url() {
        let target = parse_lnurl("lnurlp://example.com/.well-known/lnurlp/alice").unwrap();
        assert_eq!(
            target.url().as_str(),
            "https://example.com/.well-known/lnurlp/alice"
        );
        assert_eq!(target.raw_bech32(), None);
        assert_eq!(target.domain(), Some("example.com"));
    }

    #[test]
    fn scheme_body_is_truncated_at_whitespace_and_ampersand() {
        let target = parse_lnurl("lnurlw:example.com/withdraw?k1=abc&tag=withdrawRequest").unwrap();
        assert_eq!(target.url().as_str(), "https://example.com/withdraw?k1=abc");

        let target = parse_lnurl("lnurlc:example.com/channel trailing words").unwrap();
        assert_eq!(target.url().as_str(), "https://example.com/channel");
    }

    #[test]
    fn keyauth_scheme_is_a_url_target() {
        let target = parse_lnurl("keyauth://site.com/auth?tag=login&k1=00").unwrap();
        assert_eq!(target.url().as_str(), "https://site.com/auth?tag=login");
        assert_eq!(target.inline_discriminant(), Some(Discriminant::Login));
    }

    #[test]
    fn onion_hosts_use_http() {
        let target = parse_lnurl("lnurlp://abcdef.onion/pay").unwrap();
        assert_eq!(target.url().scheme(), "http");
    }

    #[test]
    fn bech32_payload_decodes_to_url() {
        let raw = encode("lnurl", b"https://service.com/api?q=3fc3");
        let target = parse_lnurl(&raw).unwrap();
        assert_eq!(target.url().as_str(), "https://service.com/api?q=3fc3");
        assert_eq!(target.raw_bech32(), Some(raw.as_str()));
        assert_eq!(target.inline_discriminant(), None);
    }

    #[test]
    fn bech32_failures_are_decode_errors() {
        let mut raw = encode("lnurl", b"https://service.com/api");
        let last = raw.pop().unwrap();
        raw.push(if last == 'q' { 'p' } else { 'q' });
        assert!(matches!(parse_lnurl(&raw), Err(ClassifyError::Bech32(_))));

        assert!(matches!(
            parse_lnurl("lnurlnotbech32"),
            Err(ClassifyError::Bech32(_))
        ));

        let not_a_url = encode("lnurl", b"just some words");
        assert!(matches!(
            parse_lnurl(&not_a_url),
            Err(ClassifyError::MalformedUrl { .. })
        ));

        let binary = encode("lnurl", &[0xff, 0xfe, 0x00]);
        assert!(matches!(
            parse_lnurl(&binary),
            Err(ClassifyError::PayloadNotUtf8)
        ));
    }

    #[test]
    fn scheme_without_host_is_malformed() {
        assert!(matches!(
            parse_lnurl("lnurlp://"),
            Err(ClassifyError::MalformedUrl { .. })
        ));
    }

    #[test]
    fn discriminant_parses_known_tags() {
        assert_eq!(Discriminant::parse("payRequest"), Discriminant::PayRequest);
        assert_eq!(Discriminant::parse("login"), Discriminant::Login);
        assert_eq!(
            Discriminant::parse("hostedChannelRequest"),
            Discriminant::Other("hostedChannelRequest".to_string())
        );
        assert_eq!(Discriminant::WithdrawRequest.to_string(), "withdrawRequest");
    }

    #[test]
    fn lightning_address_parsing_and_well_known_url() {
        let address = LightningAddress::parse("Alice@Example.com").unwrap();
        assert_eq!(address.to_string(), "alice@example.com");
        assert_eq!(
            address.well_known_url().unwrap().as_str(),
            "https://example.com/.well-known/lnurlp/alice"
        );

        let onion = LightningAddress::parse("bob@xyz.onion").unwrap();
        assert_eq!(onion.well_known_url().unwrap().scheme(), "http");

        assert_eq!(LightningAddress::parse("@example.com"), None);
        assert_eq!(LightningAddress::parse("alice@"), None);
        assert_eq!(LightningAddress::parse("a@b@c"), None);
        assert_eq!(LightningAddress::parse("al ice@example.com"), None);
    }
}
