//! Common test utilities and mock implementations
//!
//! This module provides the scripted backend and the recording host
//! shared by the unit and scenario tests.

use crate::{
    domain::{
        CheckoutHost, CheckoutOrder, CloseReason, Currency, PaymentGateway, PaymentQuote,
        PaymentReference, PaymentSession,
    },
    shared::error::{AppError, AppResult},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wallet the scripted backend hands out for SOL
pub fn sol_address() -> String {
    "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".to_string()
}

/// Wallet the scripted backend hands out for USDT
pub fn usdt_address() -> String {
    "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".to_string()
}

#[derive(Default)]
struct Script {
    next_order: u32,
    checkout_failures: u32,
    create_failures: u32,
    create_error: Option<AppError>,
    check_failures: u32,
    paid: HashSet<String>,
    create_calls: u32,
    check_calls: HashMap<String, u32>,
}

/// In-memory backend whose answers tests control
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_checkout(&self, count: u32) {
        self.script.lock().unwrap().checkout_failures = count;
    }

    pub fn fail_next_create(&self, count: u32) {
        self.script.lock().unwrap().create_failures = count;
    }

    /// Answer the next payment creation with `error`
    pub fn fail_next_create_with(&self, error: AppError) {
        self.script.lock().unwrap().create_error = Some(error);
    }

    pub fn fail_next_checks(&self, count: u32) {
        self.script.lock().unwrap().check_failures = count;
    }

    /// Report `order_id` as paid from the next status check on
    pub fn mark_paid(&self, order_id: &str) {
        self.script.lock().unwrap().paid.insert(order_id.to_string());
    }

    pub fn create_calls(&self) -> u32 {
        self.script.lock().unwrap().create_calls
    }

    pub fn check_calls(&self) -> u32 {
        self.script.lock().unwrap().check_calls.values().sum()
    }

    pub fn check_calls_for(&self, order_id: &str) -> u32 {
        self.script
            .lock()
            .unwrap()
            .check_calls
            .get(order_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_checkout(&self) -> AppResult<CheckoutOrder> {
        let mut script = self.script.lock().unwrap();
        if script.checkout_failures > 0 {
            script.checkout_failures -= 1;
            return Err(AppError::Backend("cart is empty".into()));
        }
        script.next_order += 1;
        Ok(CheckoutOrder {
            order_id: format!("order-{}", script.next_order),
            total_amount: 1_600_000.0,
        })
    }

    async fn create_payment(&self, order_id: &str, currency: Currency) -> AppResult<PaymentQuote> {
        let mut script = self.script.lock().unwrap();
        script.create_calls += 1;
        if let Some(error) = script.create_error.take() {
            return Err(error);
        }
        if script.create_failures > 0 {
            script.create_failures -= 1;
            return Err(AppError::Http("connection refused".into()));
        }
        let wallet_address = match currency {
            Currency::Sol => sol_address(),
            Currency::Usdt => usdt_address(),
        };
        Ok(PaymentQuote {
            payment_id: Some(format!("{}-{}", order_id, currency.code().to_lowercase())),
            currency,
            wallet_address,
            amount: None,
        })
    }

    async fn is_paid(&self, reference: &PaymentReference) -> AppResult<bool> {
        let mut script = self.script.lock().unwrap();
        *script.check_calls.entry(reference.order_id.clone()).or_insert(0) += 1;
        if script.check_failures > 0 {
            script.check_failures -= 1;
            return Err(AppError::Http("timed out".into()));
        }
        Ok(script.paid.contains(&reference.order_id))
    }
}

/// Scripted backend whose answers take time to arrive
///
/// A zero check latency still yields once, so a status answer never
/// arrives in the same poll of the runtime as its request.
pub struct DelayedGateway {
    inner: Arc<ScriptedGateway>,
    check_latency: Duration,
    create_latency: Duration,
}

impl DelayedGateway {
    pub fn new(inner: Arc<ScriptedGateway>, check_latency: Duration) -> Self {
        Self {
            inner,
            check_latency,
            create_latency: Duration::ZERO,
        }
    }

    pub fn with_create_latency(mut self, latency: Duration) -> Self {
        self.create_latency = latency;
        self
    }
}

#[async_trait]
impl PaymentGateway for DelayedGateway {
    async fn create_checkout(&self) -> AppResult<CheckoutOrder> {
        self.inner.create_checkout().await
    }

    async fn create_payment(&self, order_id: &str, currency: Currency) -> AppResult<PaymentQuote> {
        if !self.create_latency.is_zero() {
            tokio::time::sleep(self.create_latency).await;
        }
        self.inner.create_payment(order_id, currency).await
    }

    async fn is_paid(&self, reference: &PaymentReference) -> AppResult<bool> {
        if self.check_latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.check_latency).await;
        }
        self.inner.is_paid(reference).await
    }
}

/// Callback observed by a test host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Success { order_id: String, currency: Currency },
    Close(CloseReason),
}

/// Host that records every callback it receives
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HostEvent::Success { .. }))
            .count()
    }

    pub fn closes(&self) -> Vec<CloseReason> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Close(reason) => Some(reason),
                HostEvent::Success { .. } => None,
            })
            .collect()
    }
}

impl CheckoutHost for RecordingHost {
    fn on_success(&self, session: &PaymentSession) {
        self.events.lock().unwrap().push(HostEvent::Success {
            order_id: session.order_id().to_string(),
            currency: session.currency(),
        });
    }

    fn on_close(&self, reason: CloseReason) {
        self.events.lock().unwrap().push(HostEvent::Close(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_gateway_numbers_orders() {
        let gateway = ScriptedGateway::new();
        assert_eq!(gateway.create_checkout().await.unwrap().order_id, "order-1");
        assert_eq!(gateway.create_checkout().await.unwrap().order_id, "order-2");
    }

    #[tokio::test]
    async fn test_scripted_gateway_failures_are_consumed() {
        let gateway = ScriptedGateway::new();
        gateway.fail_next_checks(1);
        let reference = PaymentReference {
            order_id: "order-1".into(),
            payment_id: None,
        };

        assert!(gateway.is_paid(&reference).await.is_err());
        assert!(!gateway.is_paid(&reference).await.unwrap());
        gateway.mark_paid("order-1");
        assert!(gateway.is_paid(&reference).await.unwrap());
        assert_eq!(gateway.check_calls_for("order-1"), 3);
    }
}
