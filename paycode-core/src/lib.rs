//! Core library for paycode: payment-code classification, routing and
//! bitcoin amount conversion.

pub mod amount;
pub mod bitcoin_uri;
pub mod classify;
pub mod dispatch;
pub mod error;
pub mod expr;
pub mod field;
pub mod lnurl;
pub mod output;
pub mod settings;
pub mod units;

pub use amount::{RawAmount, Satoshi, MAX_SUPPLY_SAT, SATOSHI_PER_BITCOIN};
pub use bitcoin_uri::{parse_bitcoin_uri, BitcoinUri};
pub use classify::{classify, Classification};
pub use dispatch::{
    resolve_and_route, route_input, HandlerError, PaymentHandlers, RouteOutcome, ScanGate,
    ScanGuard, Screen,
};
pub use error::{
    AmountError, ClassifyError, ErrorCode, ExprError, PaycodeError, Result, UriError,
};
pub use expr::{evaluate, evaluate_or, sanitize_expression};
pub use field::AmountField;
pub use lnurl::{Discriminant, LightningAddress, LnurlTarget};
pub use output::{truncate_code, AgentError, OutputMode};
pub use settings::AmountSettings;
pub use units::{
    convert, convert_bitcoin_to_fiat, format_bitcoin, format_number_groupings, unit_to_satoshi,
    value_bitcoin, value_bitcoin_from_fiat, value_fiat, BitcoinUnit,
};
