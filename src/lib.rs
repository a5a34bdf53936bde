//! Scent Checkout - Crypto payment settlement for the fragrance storefront
//!
//! This library drives a single checkout from order creation to a confirmed
//! (or expired, or cancelled) crypto payment: it converts the order total
//! into SOL or USDT, fetches a wallet address from the storefront backend,
//! polls for confirmation and enforces a fixed payment window.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

#[cfg(test)]
mod tests;

pub use application::services::{FlowSettings, PaymentFlowController};
pub use config::AppConfig;
pub use shared::error::{AppError, AppResult};
