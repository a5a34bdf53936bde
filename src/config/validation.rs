//! Configuration validation module
//!
//! This module provides additional validation logic for configuration
//! beyond the basic validator crate validation.

use crate::config::app_config::{AppConfig, BackendConfig, LoggingConfig, PaymentConfig};
use crate::domain::currency::Currency;
use crate::shared::error::{AppError, AppResult};

/// Configuration validator for cross-field rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> AppResult<()> {
        Self::validate_backend_config(&config.backend)?;
        Self::validate_payment_config(&config.payment)?;
        Self::validate_logging_config(&config.logging)?;
        Ok(())
    }

    /// Validate the backend URL and credentials
    fn validate_backend_config(backend: &BackendConfig) -> AppResult<()> {
        let url = backend.base_url.as_str();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "Backend URL must start with http:// or https://".to_string(),
            ));
        }

        if !url.starts_with("https://") && !url.contains("localhost") && !url.contains("127.0.0.1") {
            tracing::warn!(base_url = %url, "Backend URL is not HTTPS; bearer tokens will travel in clear text");
        }

        if let Some(token) = &backend.auth_token {
            if token.trim().is_empty() {
                return Err(AppError::Validation("Backend auth token is empty".to_string()));
            }
        }

        Ok(())
    }

    /// Validate currencies, rates and timing
    fn validate_payment_config(payment: &PaymentConfig) -> AppResult<()> {
        let default_currency: Currency = payment.default_currency.parse()?;
        let rates = payment.currency_rates()?;

        for (currency, rate) in &rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(AppError::Validation(format!(
                    "Rate for {} must be a positive number, got {}",
                    currency, rate
                )));
            }
        }

        if !rates.contains_key(&default_currency) {
            return Err(AppError::Validation(format!(
                "No conversion rate configured for default currency {}",
                default_currency
            )));
        }

        if payment.poll_interval_seconds >= payment.session_window_seconds {
            return Err(AppError::Validation(
                "Poll interval must be shorter than the session window".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate logging format
    fn validate_logging_config(logging: &LoggingConfig) -> AppResult<()> {
        if !["text", "json"].contains(&logging.format.to_lowercase().as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid log format: {}",
                logging.format
            )));
        }
        Ok(())
    }
}
