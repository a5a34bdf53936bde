//! Payments domain models and types

use crate::domain::currency::{ConversionTable, CryptoAmount, Currency};
use crate::domain::gateway::{PaymentGateway, PaymentQuote, PaymentReference};
use crate::shared::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Payment session status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Uninitialized,
    AwaitingPayment,
    Completed,
    Expired,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Uninitialized => "uninitialized",
            PaymentStatus::AwaitingPayment => "awaiting_payment",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Expired | PaymentStatus::Cancelled
        )
    }

    /// Allowed moves: forward only, never out of a terminal status
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Uninitialized, AwaitingPayment)
                | (Uninitialized, Cancelled)
                | (AwaitingPayment, Completed)
                | (AwaitingPayment, Expired)
                | (AwaitingPayment, Cancelled)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how much to pay, always replaced as a whole
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentTarget {
    pub currency: Currency,
    pub wallet_address: String,
    pub amount_crypto: CryptoAmount,
    pub payment_id: Option<String>,
}

impl PaymentTarget {
    /// Build a target from a backend quote
    ///
    /// The quote must be for `requested`; the amount always comes from the table.
    pub fn from_quote(
        quote: PaymentQuote,
        requested: Currency,
        amount_fiat: f64,
        table: &ConversionTable,
    ) -> AppResult<Self> {
        if quote.currency != requested {
            return Err(AppError::Backend(format!(
                "requested a {} address but received one for {}",
                requested, quote.currency
            )));
        }
        validate_wallet_address(&quote.wallet_address)?;

        let amount_crypto = table.to_crypto(amount_fiat, requested)?;
        if let Some(quoted) = quote.amount {
            if !amount_crypto.approx_eq(quoted) {
                warn!(
                    currency = %requested,
                    quoted = quoted,
                    computed = %amount_crypto,
                    "Backend amount differs from conversion table"
                );
            }
        }

        Ok(Self {
            currency: requested,
            wallet_address: quote.wallet_address,
            amount_crypto,
            payment_id: quote.payment_id,
        })
    }

    /// Solana Pay transfer request URI
    pub fn payment_uri(&self) -> String {
        let mut uri = format!("solana:{}?amount={}", self.wallet_address, self.amount_crypto);
        if let Some(mint) = self.currency.spl_token_mint() {
            uri.push_str("&spl-token=");
            uri.push_str(mint);
        }
        uri
    }
}

fn validate_wallet_address(address: &str) -> AppResult<()> {
    static BASE58_ADDRESS: OnceLock<Regex> = OnceLock::new();
    let pattern = BASE58_ADDRESS.get_or_init(|| {
        Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("wallet address pattern is valid")
    });
    if pattern.is_match(address) {
        Ok(())
    } else {
        Err(AppError::Backend(format!("malformed wallet address: {:?}", address)))
    }
}

/// One attempt to pay for an order
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    order_id: String,
    amount_fiat: f64,
    currency: Currency,
    target: Option<PaymentTarget>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: PaymentStatus,
}

impl PaymentSession {
    /// Create an uninitialized session expiring `window` from now
    pub fn new(
        order_id: impl Into<String>,
        amount_fiat: f64,
        currency: Currency,
        window: std::time::Duration,
    ) -> AppResult<Self> {
        let order_id = order_id.into();
        if order_id.trim().is_empty() {
            return Err(AppError::Validation("order id is empty".into()));
        }
        if !amount_fiat.is_finite() || amount_fiat <= 0.0 {
            return Err(AppError::Validation(format!(
                "order total must be positive, got {}",
                amount_fiat
            )));
        }
        let window = chrono::Duration::from_std(window)
            .map_err(|e| AppError::Validation(format!("invalid session window: {}", e)))?;

        let created_at = Utc::now();
        Ok(Self {
            order_id,
            amount_fiat,
            currency,
            target: None,
            created_at,
            expires_at: created_at + window,
            status: PaymentStatus::Uninitialized,
        })
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn amount_fiat(&self) -> f64 {
        self.amount_fiat
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn target(&self) -> Option<&PaymentTarget> {
        self.target.as_ref()
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.wallet_address.as_str())
    }

    pub fn amount_crypto(&self) -> Option<CryptoAmount> {
        self.target.as_ref().map(|t| t.amount_crypto)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reference the status poller checks
    pub fn reference(&self) -> PaymentReference {
        PaymentReference {
            order_id: self.order_id.clone(),
            payment_id: self.target.as_ref().and_then(|t| t.payment_id.clone()),
        }
    }

    /// Fetch a payment target for the current currency and start awaiting payment
    pub async fn initialize(
        &mut self,
        gateway: &dyn PaymentGateway,
        table: &ConversionTable,
    ) -> AppResult<()> {
        if self.status != PaymentStatus::Uninitialized {
            return Err(AppError::invalid_transition("initialize", self.status));
        }

        let target = self
            .fetch_target(self.currency, gateway, table)
            .await
            .map_err(|e| match e {
                // retrying cannot fix these
                AppError::UnsupportedCurrency { .. }
                | AppError::Authentication(_)
                | AppError::Validation(_) => e,
                other => AppError::InitializationFailed(other.to_string()),
            })?;

        self.set_payment_target(target)?;
        self.transition(PaymentStatus::AwaitingPayment)
    }

    /// Move the session to another currency
    ///
    /// Before initialization only the selection changes. While awaiting
    /// payment a fresh target is fetched; on failure the current one stays.
    pub async fn switch_currency(
        &mut self,
        currency: Currency,
        gateway: &dyn PaymentGateway,
        table: &ConversionTable,
    ) -> AppResult<()> {
        match self.status {
            PaymentStatus::Uninitialized => {
                table.rate_of(currency)?;
                self.currency = currency;
                Ok(())
            }
            PaymentStatus::AwaitingPayment => {
                if currency == self.currency {
                    debug!(order_id = %self.order_id, currency = %currency, "Currency already selected");
                    return Ok(());
                }
                let target = self.fetch_target(currency, gateway, table).await?;
                self.set_payment_target(target)
            }
            status => Err(AppError::invalid_transition("switch currency", status)),
        }
    }

    /// Replace currency, wallet address and amount in one step
    pub fn set_payment_target(&mut self, target: PaymentTarget) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::invalid_transition("change payment target", self.status));
        }
        self.currency = target.currency;
        self.target = Some(target);
        Ok(())
    }

    pub fn complete(&mut self) -> AppResult<()> {
        self.transition(PaymentStatus::Completed)
    }

    pub fn expire(&mut self) -> AppResult<()> {
        self.transition(PaymentStatus::Expired)
    }

    pub fn cancel(&mut self) -> AppResult<()> {
        self.transition(PaymentStatus::Cancelled)
    }

    fn transition(&mut self, next: PaymentStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(
                format!("move to {}", next),
                self.status,
            ));
        }
        self.status = next;
        Ok(())
    }

    async fn fetch_target(
        &self,
        currency: Currency,
        gateway: &dyn PaymentGateway,
        table: &ConversionTable,
    ) -> AppResult<PaymentTarget> {
        // fail on unknown rates before touching the network
        table.rate_of(currency)?;
        let quote = gateway.create_payment(&self.order_id, currency).await?;
        PaymentTarget::from_quote(quote, currency, self.amount_fiat, table)
    }
}
