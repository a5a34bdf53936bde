//! In-memory order and payment store for the sandbox backend

use crate::domain::currency::{ConversionTable, Currency};
use crate::domain::gateway::{CheckoutOrder, PaymentQuote};
use crate::shared::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Payment address issued for one order and currency
#[derive(Debug, Clone, Serialize)]
pub struct SandboxPayment {
    pub payment_id: String,
    pub currency: Currency,
    pub wallet_address: String,
    pub amount: f64,
}

/// Order as the sandbox remembers it
#[derive(Debug, Clone, Serialize)]
pub struct SandboxOrder {
    pub order_id: String,
    pub total_amount: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub payments: HashMap<Currency, SandboxPayment>,
}

/// Orders and payments kept for the lifetime of the process
#[derive(Clone)]
pub struct PaymentsStore {
    table: Arc<ConversionTable>,
    orders: Arc<RwLock<HashMap<String, SandboxOrder>>>,
    payment_index: Arc<RwLock<HashMap<String, String>>>,
}

impl PaymentsStore {
    pub fn new(table: Arc<ConversionTable>) -> Self {
        Self {
            table,
            orders: Arc::new(RwLock::new(HashMap::new())),
            payment_index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an order with a fresh id
    pub async fn create_order(&self, total_amount: f64) -> AppResult<CheckoutOrder> {
        if !total_amount.is_finite() || total_amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "order total must be positive, got {}",
                total_amount
            )));
        }

        let order_id = format!(
            "ORD-{}",
            uuid::Uuid::new_v4().simple().to_string()[..12].to_uppercase()
        );
        let order = SandboxOrder {
            order_id: order_id.clone(),
            total_amount,
            paid: false,
            created_at: Utc::now(),
            payments: HashMap::new(),
        };
        self.orders.write().await.insert(order_id.clone(), order);

        Ok(CheckoutOrder {
            order_id,
            total_amount,
        })
    }

    /// Issue (or re-issue) the payment address of `order_id` in `currency`
    ///
    /// The same order and currency always yield the same address and id.
    pub async fn create_payment(&self, order_id: &str, currency: Currency) -> AppResult<PaymentQuote> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::Validation(format!("unknown order {}", order_id)))?;

        let payment = match order.payments.get(&currency) {
            Some(existing) => existing.clone(),
            None => {
                let amount = self.table.to_crypto(order.total_amount, currency)?.value();
                let payment = SandboxPayment {
                    payment_id: payment_id(order_id, currency),
                    currency,
                    wallet_address: wallet_address(order_id, currency),
                    amount,
                };
                order.payments.insert(currency, payment.clone());
                self.payment_index
                    .write()
                    .await
                    .insert(payment.payment_id.clone(), order_id.to_string());
                payment
            }
        };

        Ok(PaymentQuote {
            payment_id: Some(payment.payment_id),
            currency: payment.currency,
            wallet_address: payment.wallet_address,
            amount: Some(payment.amount),
        })
    }

    pub async fn is_order_paid(&self, order_id: &str) -> AppResult<bool> {
        self.orders
            .read()
            .await
            .get(order_id)
            .map(|o| o.paid)
            .ok_or_else(|| AppError::Validation(format!("unknown order {}", order_id)))
    }

    pub async fn is_payment_paid(&self, payment_id: &str) -> AppResult<bool> {
        let order_id = self
            .payment_index
            .read()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("unknown payment {}", payment_id)))?;
        self.is_order_paid(&order_id).await
    }

    /// Simulate funds arriving for `order_id`
    pub async fn mark_paid(&self, order_id: &str) -> AppResult<SandboxOrder> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::Validation(format!("unknown order {}", order_id)))?;
        order.paid = true;
        Ok(order.clone())
    }

    /// Snapshot of an order and the payments issued for it
    pub async fn get(&self, order_id: &str) -> Option<SandboxOrder> {
        self.orders.read().await.get(order_id).cloned()
    }
}

fn digest(kind: &str, order_id: &str, currency: Currency) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(order_id.as_bytes());
    hasher.update(b":");
    hasher.update(currency.code().as_bytes());
    hasher.finalize().into()
}

fn payment_id(order_id: &str, currency: Currency) -> String {
    hex::encode(&digest("payment", order_id, currency)[..12])
}

/// 32-byte digest rendered like a Solana public key
fn wallet_address(order_id: &str, currency: Currency) -> String {
    bs58::encode(digest("wallet", order_id, currency)).into_string()
}
