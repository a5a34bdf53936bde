//! HTTP infrastructure module
//!
//! This module contains the handlers and routes of the sandbox backend.

pub mod handlers;
pub mod routes;

pub use handlers::SandboxState;
pub use routes::PaymentsRoutes;
