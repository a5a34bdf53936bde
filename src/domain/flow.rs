//! Checkout flow states and the contract with the hosting page

use crate::domain::currency::{CryptoAmount, Currency};
use crate::domain::payments::{PaymentSession, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// State of the payment flow controller
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Flow not yet started, or initialization failed and may be retried
    Idle,
    /// Session created, backend call in flight
    Initializing,
    /// Wallet and amount shown, poller and timer running
    AwaitingPayment,
    Completed,
    Expired,
    Cancelled,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Initializing => "initializing",
            FlowState::AwaitingPayment => "awaiting_payment",
            FlowState::Completed => "completed",
            FlowState::Expired => "expired",
            FlowState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Completed | FlowState::Expired | FlowState::Cancelled)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the flow closed without a payment
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Expired,
    Cancelled,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Expired => "expired",
            CloseReason::Cancelled => "cancelled",
        }
    }
}

/// Callbacks into the page embedding the flow
///
/// Each is invoked at most once per flow instance, never while the
/// controller holds its lock.
pub trait CheckoutHost: Send + Sync {
    /// Payment confirmed (clear the cart, show the order)
    fn on_success(&self, session: &PaymentSession);

    /// Flow closed by expiry or by the user
    fn on_close(&self, reason: CloseReason);
}

/// What the payment modal displays
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub order_id: String,
    pub state: FlowState,
    pub status: PaymentStatus,
    pub currency: Currency,
    pub amount_fiat: f64,
    pub amount_crypto: Option<CryptoAmount>,
    pub wallet_address: Option<String>,
    pub payment_uri: Option<String>,
    pub rate: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: u64,
}

/// Format seconds as `m:ss`
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
