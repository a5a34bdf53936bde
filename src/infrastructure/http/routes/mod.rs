//! HTTP routes module
//!
//! This module contains the route configuration of the sandbox backend.

pub mod payments;

pub use payments::PaymentsRoutes;
