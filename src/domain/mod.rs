//! Domain layer - Core payment models and rules
//!
//! This module contains the currency table, the payment session state
//! machine and the port to the remote backend, independent of HTTP and
//! scheduling concerns.

pub mod currency;
pub mod flow;
pub mod gateway;
pub mod payments;

pub use currency::{ConversionTable, CryptoAmount, Currency};
pub use flow::{format_countdown, CheckoutHost, CloseReason, FlowState, PaymentView};
pub use gateway::{CheckoutOrder, PaymentGateway, PaymentQuote, PaymentReference};
pub use payments::{PaymentSession, PaymentStatus, PaymentTarget};
