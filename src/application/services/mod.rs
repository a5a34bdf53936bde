//! Application services - Background tasks and flow orchestration

pub mod countdown;
pub mod payment_flow;
pub mod status_poller;

pub use countdown::CountdownTimer;
pub use payment_flow::{FlowSettings, PaymentFlowController};
pub use status_poller::StatusPoller;
