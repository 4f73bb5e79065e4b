//! Error taxonomy shared by the classifier, the unit engine and the CLI.

use thiserror::Error;

/// Stable error codes, grouped by range.
///
/// - 1xxx: classification and decoding
/// - 2xxx: amounts and units
/// - 3xxx: math expressions
/// - 4xxx: payment URIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Bech32 payload failed checksum or charset validation
    Bech32Decode = 1001,
    /// Bech32 payload carried an unexpected human-readable part
    UnexpectedHrp = 1002,
    /// Decoded LNURL payload is not UTF-8
    PayloadNotUtf8 = 1003,
    /// LNURL target is not a usable URL
    MalformedUrl = 1004,

    /// Amount is not an exact integer number of satoshis
    NotAnInteger = 2001,
    /// Amount is negative
    NegativeAmount = 2002,
    /// Amount exceeds the 21 million BTC supply cap
    AmountOutOfRange = 2003,
    /// Amount string is empty or contains invalid characters
    InvalidAmountFormat = 2004,
    /// Amount has more decimals than the unit allows
    TooManyDecimals = 2005,
    /// Fiat rate is zero, negative or not finite
    InvalidRate = 2006,
    /// Unknown bitcoin unit key
    UnknownUnit = 2007,
    /// Decimal arithmetic overflowed
    ArithmeticOverflow = 2008,

    /// Expression contains an unexpected character
    UnexpectedCharacter = 3001,
    /// Expression ended early or has trailing input
    UnexpectedToken = 3002,
    /// Expression divides by zero
    DivisionByZero = 3003,
    /// Expression result overflowed
    ExpressionOverflow = 3004,
    /// Expression nests parentheses or signs too deeply
    ExpressionTooDeep = 3005,

    /// URI has no address component
    MissingAddress = 4001,
    /// URI carries an invalid amount parameter
    InvalidUriAmount = 4002,
}

impl ErrorCode {
    /// Numeric code, e.g. `1001`.
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Returns the error name (e.g., "BECH32_DECODE")
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bech32Decode => "BECH32_DECODE",
            Self::UnexpectedHrp => "UNEXPECTED_HRP",
            Self::PayloadNotUtf8 => "PAYLOAD_NOT_UTF8",
            Self::MalformedUrl => "MALFORMED_URL",
            Self::NotAnInteger => "NOT_AN_INTEGER",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            Self::InvalidAmountFormat => "INVALID_AMOUNT_FORMAT",
            Self::TooManyDecimals => "TOO_MANY_DECIMALS",
            Self::InvalidRate => "INVALID_RATE",
            Self::UnknownUnit => "UNKNOWN_UNIT",
            Self::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            Self::UnexpectedCharacter => "UNEXPECTED_CHARACTER",
            Self::UnexpectedToken => "UNEXPECTED_TOKEN",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::ExpressionOverflow => "EXPRESSION_OVERFLOW",
            Self::ExpressionTooDeep => "EXPRESSION_TOO_DEEP",
            Self::MissingAddress => "MISSING_ADDRESS",
            Self::InvalidUriAmount => "INVALID_URI_AMOUNT",
        }
    }
}

/// Content inside a recognized payment-code shape failed to decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("invalid LNURL encoding: {0}")]
    Bech32(String),
    #[error("unexpected bech32 prefix '{found}', expected 'lnurl'")]
    UnexpectedHrp { found: String },
    #[error("LNURL payload is not valid UTF-8")]
    PayloadNotUtf8,
    #[error("malformed LNURL address '{input}': {reason}")]
    MalformedUrl { input: String, reason: String },
}

impl ClassifyError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Bech32(_) => ErrorCode::Bech32Decode,
            Self::UnexpectedHrp { .. } => ErrorCode::UnexpectedHrp,
            Self::PayloadNotUtf8 => ErrorCode::PayloadNotUtf8,
            Self::MalformedUrl { .. } => ErrorCode::MalformedUrl,
        }
    }
}

/// Amount or unit conversion failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("satoshi amounts must be exact integers, got {found}")]
    NotAnInteger { found: String },
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount {value} exceeds the 21,000,000 BTC supply")]
    AboveMaximum { value: String },
    #[error("amount is empty")]
    Empty,
    #[error("amount '{input}' is not a decimal number")]
    InvalidFormat { input: String },
    #[error("amount has {decimals} decimals, at most {max} allowed")]
    TooManyDecimals { decimals: usize, max: u32 },
    #[error("fiat rate {rate} is not a positive finite number")]
    InvalidRate { rate: String },
    #[error("unknown bitcoin unit '{0}'")]
    UnknownUnit(String),
    #[error("amount arithmetic overflow")]
    Overflow,
}

impl AmountError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotAnInteger { .. } => ErrorCode::NotAnInteger,
            Self::Negative => ErrorCode::NegativeAmount,
            Self::AboveMaximum { .. } => ErrorCode::AmountOutOfRange,
            Self::Empty | Self::InvalidFormat { .. } => ErrorCode::InvalidAmountFormat,
            Self::TooManyDecimals { .. } => ErrorCode::TooManyDecimals,
            Self::InvalidRate { .. } => ErrorCode::InvalidRate,
            Self::UnknownUnit(_) => ErrorCode::UnknownUnit,
            Self::Overflow => ErrorCode::ArithmeticOverflow,
        }
    }
}

/// Math-expression evaluation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("unexpected {found} in expression")]
    UnexpectedToken { found: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression result overflowed")]
    Overflow,
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

impl ExprError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnexpectedCharacter { .. } => ErrorCode::UnexpectedCharacter,
            Self::UnexpectedToken { .. } => ErrorCode::UnexpectedToken,
            Self::DivisionByZero => ErrorCode::DivisionByZero,
            Self::Overflow => ErrorCode::ExpressionOverflow,
            Self::TooDeep { .. } => ErrorCode::ExpressionTooDeep,
        }
    }
}

/// BIP21 `bitcoin:` URI failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("payment URI has no address")]
    MissingAddress,
    #[error("payment URI amount is invalid: {0}")]
    InvalidAmount(#[source] AmountError),
}

impl UriError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingAddress => ErrorCode::MissingAddress,
            Self::InvalidAmount(_) => ErrorCode::InvalidUriAmount,
        }
    }
}

/// Crate-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaycodeError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error(transparent)]
    Uri(#[from] UriError),
}

impl PaycodeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Classify(err) => err.error_code(),
            Self::Amount(err) => err.error_code(),
            Self::Expr(err) => err.error_code(),
            Self::Uri(err) => err.error_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaycodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_their_ranges() {
        let classify = ClassifyError::PayloadNotUtf8.error_code().code();
        let amount = AmountError::Negative.error_code().code();
        let expr = ExprError::DivisionByZero.error_code().code();
        let uri = UriError::MissingAddress.error_code().code();

        assert!((1001..=1099).contains(&classify));
        assert!((2001..=2099).contains(&amount));
        assert!((3001..=3099).contains(&expr));
        assert!((4001..=4099).contains(&uri));
    }

    #[test]
    fn wrapped_errors_keep_their_code_and_message() {
        let err = PaycodeError::from(AmountError::NotAnInteger {
            found: "1.5".to_string(),
        });
        assert_eq!(err.error_code(), ErrorCode::NotAnInteger);
        assert_eq!(err.error_code().name(), "NOT_AN_INTEGER");
        assert_eq!(
            err.to_string(),
            "satoshi amounts must be exact integers, got 1.5"
        );
    }
}
