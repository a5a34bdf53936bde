//! Port to the remote order/payment backend
//!
//! The flow only depends on this trait; the reqwest adapter and the test
//! fixtures implement it.

use crate::domain::currency::Currency;
use crate::shared::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Order created by `POST /checkout`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOrder {
    pub order_id: String,
    /// Order total in the store base currency
    pub total_amount: f64,
}

/// Backend answer to a payment creation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentQuote {
    /// Identifier of the payment at the processor, when the backend issues one
    pub payment_id: Option<String>,
    pub currency: Currency,
    pub wallet_address: String,
    /// Amount the backend expects, used only as a cross-check
    pub amount: Option<f64>,
}

/// What the status endpoint is asked about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentReference {
    pub order_id: String,
    pub payment_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create the order to be paid from the current cart
    async fn create_checkout(&self) -> AppResult<CheckoutOrder>;

    /// Request a wallet address for paying `order_id` in `currency`
    async fn create_payment(&self, order_id: &str, currency: Currency) -> AppResult<PaymentQuote>;

    /// Ask whether the referenced payment has been received
    async fn is_paid(&self, reference: &PaymentReference) -> AppResult<bool>;
}
