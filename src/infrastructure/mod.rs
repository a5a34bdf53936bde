//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the HTTP client for the storefront backend and the
//! in-memory sandbox that can stand in for it.

pub mod adapters;
pub mod http;

pub use adapters::{ApiCredentials, PaymentApiAdapter, PaymentsStore};
