//! Application layer - Use cases and application services
//!
//! This module contains the services that schedule polling and expiry
//! and the use cases that drive a checkout from cart to payment.

pub mod services;
pub mod use_cases;

pub use services::*;
pub use use_cases::*;
