//! HTTP route handlers module
//!
//! Handlers of the sandbox backend that stands in for the storefront API.

pub mod payments;

pub use payments::{
    handle_checkout, handle_get_order, handle_mark_paid, handle_payment_check, handle_payment_create,
    handle_payment_status, CreatePaymentBody, SandboxState,
};
