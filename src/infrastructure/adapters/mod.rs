//! Infrastructure adapters module
//!
//! This module contains adapters for the storefront API and the sandbox store.

pub mod payment_api;
pub mod payments_store;

pub use payment_api::{ApiCredentials, PaymentApiAdapter};
pub use payments_store::{PaymentsStore, SandboxOrder, SandboxPayment};
