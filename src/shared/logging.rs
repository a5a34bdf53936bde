//! Logging utilities module
//!
//! This module provides centralized logging functionality and utilities.

use crate::shared::error::{AppError, AppResult};
use tracing::{info, warn};

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified configuration
    ///
    /// `RUST_LOG` takes precedence over `level` when set.
    pub fn initialize(level: &str, format: &str) -> AppResult<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let result = if format.eq_ignore_ascii_case("json") {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|e| AppError::Internal(format!("Failed to initialize logging: {}", e)))
    }

    /// Log a flow state change
    pub fn log_transition(order_id: &str, from: &str, to: &str) {
        info!(
            order_id = %order_id,
            from = %from,
            to = %to,
            "Checkout flow transition"
        );
    }

    /// Log a failed backend call
    pub fn log_backend_failure(order_id: &str, operation: &str, error: &AppError, attempt: u32) {
        warn!(
            order_id = %order_id,
            operation = %operation,
            error = %error,
            error_kind = error.kind(),
            attempt = attempt,
            "Backend call failed"
        );
    }
}
