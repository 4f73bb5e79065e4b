//! Routing a classification to exactly one protocol handler.
//!
//! The dispatcher owns no state. Pending LNURL targets travel inside
//! [`Classification::LnurlPending`] and are narrowed here once the caller's
//! resolver reports a discriminant, so two scans never share a pending slot.
//!
//! Callers feeding a live scanner must not dispatch concurrently for the same
//! input stream; [`ScanGate`] is the ready-made way to hold that contract.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::classify::{classify, Classification};
use crate::lnurl::{Discriminant, LightningAddress, LnurlTarget};

/// Failure reported by a caller-supplied handler. The message is shown to the
/// user verbatim after the error prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Protocol handlers supplied by the caller, one per protocol family.
///
/// Implementations own all network access, timeouts and retries.
#[async_trait]
pub trait PaymentHandlers: Send + Sync {
    /// Decode and stage a BOLT11 invoice for confirmation.
    async fn accept_bolt11(&self, raw: &str) -> Result<(), HandlerError>;

    /// Fetch the LNURL target and report its `tag`.
    async fn resolve_lnurl(&self, target: &LnurlTarget) -> Result<Discriminant, HandlerError>;

    /// Resolve the address into a pay request. `Ok(false)` means the service
    /// answered but did not yield a usable pay request.
    async fn resolve_lightning_address(
        &self,
        address: &LightningAddress,
    ) -> Result<bool, HandlerError>;

    /// Drop whatever the caller staged while resolving an LNURL.
    async fn clear_pending_lnurl(&self);
}

/// Screens a routed payment code can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Screen {
    SendConfirmation,
    AuthRequest,
    ChannelRequest,
    PayRequest,
    WithdrawRequest,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::SendConfirmation => "SendConfirmation",
            Screen::AuthRequest => "AuthRequest",
            Screen::ChannelRequest => "ChannelRequest",
            Screen::PayRequest => "PayRequest",
            Screen::WithdrawRequest => "WithdrawRequest",
        }
    }

    /// Navigation stack the screen lives in.
    pub fn stack(&self) -> &'static str {
        match self {
            Screen::SendConfirmation => "Send",
            Screen::AuthRequest
            | Screen::ChannelRequest
            | Screen::PayRequest
            | Screen::WithdrawRequest => "LNURL",
        }
    }

    /// Whether the caller should pop back to where the scan started once the
    /// screen is done.
    pub fn go_back_after(&self) -> bool {
        matches!(self, Screen::SendConfirmation | Screen::ChannelRequest)
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RouteOutcome {
    Navigate { screen: Screen, params: Value },
    ShowError { message: String },
    /// Keep scanning or accepting input.
    NoOp,
}

impl RouteOutcome {
    fn navigate(screen: Screen, params: Value) -> Self {
        info!(screen = screen.name(), stack = screen.stack(), "routing payment code");
        RouteOutcome::Navigate { screen, params }
    }

    fn error(error_prefix: &str, message: impl std::fmt::Display) -> Self {
        RouteOutcome::ShowError {
            message: format!("{error_prefix}: {message}"),
        }
    }
}

/// Invoke at most one handler for `classification` and map its result.
pub async fn resolve_and_route<H>(
    classification: Classification,
    handlers: &H,
    error_prefix: &str,
) -> RouteOutcome
where
    H: PaymentHandlers + ?Sized,
{
    match classification {
        Classification::Bolt11Invoice { raw } => match handlers.accept_bolt11(&raw).await {
            Ok(()) => RouteOutcome::navigate(Screen::SendConfirmation, json!({ "invoice": raw })),
            Err(err) => {
                warn!(error = %err, "invoice rejected");
                RouteOutcome::error(error_prefix, err)
            }
        },
        Classification::LnurlPending { target } => match handlers.resolve_lnurl(&target).await {
            Ok(discriminant) => match lnurl_screen(&discriminant) {
                Some(screen) => navigate_lnurl(screen, &target),
                None => {
                    warn!(tag = %discriminant, "unsupported LNURL discriminant");
                    handlers.clear_pending_lnurl().await;
                    RouteOutcome::error(
                        error_prefix,
                        format_args!("Unsupported LNURL request: {discriminant}"),
                    )
                }
            },
            Err(err) => {
                warn!(error = %err, url = %target, "LNURL resolution failed");
                RouteOutcome::error(error_prefix, err)
            }
        },
        Classification::LnurlAuthRequest { target } => navigate_lnurl(Screen::AuthRequest, &target),
        Classification::LnurlChannelRequest { target } => {
            navigate_lnurl(Screen::ChannelRequest, &target)
        }
        Classification::LnurlWithdrawRequest { target } => {
            navigate_lnurl(Screen::WithdrawRequest, &target)
        }
        Classification::LnurlPayRequest { target } => navigate_lnurl(Screen::PayRequest, &target),
        Classification::LightningAddressRequest { address } => {
            match handlers.resolve_lightning_address(&address).await {
                Ok(true) => RouteOutcome::navigate(
                    Screen::PayRequest,
                    json!({ "lightningAddress": address.to_string(), "domain": address.domain }),
                ),
                Ok(false) => {
                    warn!(%address, "lightning address did not resolve");
                    RouteOutcome::error(
                        error_prefix,
                        format_args!("Could not resolve Lightning Address {address}"),
                    )
                }
                Err(err) => {
                    warn!(error = %err, %address, "lightning address resolution failed");
                    RouteOutcome::error(error_prefix, err)
                }
            }
        }
        Classification::Unrecognized => RouteOutcome::NoOp,
    }
}

/// Classify `raw` and route it. Decode failures become
/// [`RouteOutcome::ShowError`].
pub async fn route_input<H>(raw: &str, handlers: &H, error_prefix: &str) -> RouteOutcome
where
    H: PaymentHandlers + ?Sized,
{
    match classify(raw) {
        Ok(classification) => resolve_and_route(classification, handlers, error_prefix).await,
        Err(err) => {
            warn!(error = %err, code = err.error_code().code(), "payment code failed to decode");
            RouteOutcome::error(error_prefix, err)
        }
    }
}

/// Screen for a resolved discriminant, `None` for tags this wallet does not
/// handle.
fn lnurl_screen(discriminant: &Discriminant) -> Option<Screen> {
    match discriminant {
        Discriminant::Login => Some(Screen::AuthRequest),
        Discriminant::ChannelRequest => Some(Screen::ChannelRequest),
        Discriminant::WithdrawRequest => Some(Screen::WithdrawRequest),
        Discriminant::PayRequest => Some(Screen::PayRequest),
        Discriminant::Other(_) => None,
    }
}

fn navigate_lnurl(screen: Screen, target: &LnurlTarget) -> RouteOutcome {
    RouteOutcome::navigate(screen, lnurl_params(target))
}

fn lnurl_params(target: &LnurlTarget) -> Value {
    let mut params = json!({
        "url": target.url().as_str(),
        "domain": target.domain(),
    });
    if let Some(raw) = target.raw_bech32() {
        params["lnurl"] = Value::String(raw.to_string());
    }
    params
}

/// Non-reentrancy gate for a scanner feeding the dispatcher.
#[derive(Debug, Default)]
pub struct ScanGate {
    busy: AtomicBool,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another scan is being dispatched.
    pub fn try_acquire(&self) -> Option<ScanGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Route `raw` unless a dispatch is already in flight, in which case the
    /// scan is dropped and `None` returned.
    pub async fn dispatch<H>(
        &self,
        raw: &str,
        handlers: &H,
        error_prefix: &str,
    ) -> Option<RouteOutcome>
    where
        H: PaymentHandlers + ?Sized,
    {
        let Some(_guard) = self.try_acquire() else {
            info!("scan ignored while a previous code is being dispatched");
            return None;
        };
        Some(route_input(raw, handlers, error_prefix).await)
    }
}

/// Reopens the gate on drop.
#[derive(Debug)]
pub struct ScanGuard<'a> {
    gate: &'a ScanGate,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
