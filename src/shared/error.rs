//! Error handling module
//!
//! This module provides centralized error handling for the checkout flow.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Unsupported currency: {code}")]
    UnsupportedCurrency { code: String },

    #[error("Payment initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Invalid state transition: cannot {action} while {state}")]
    InvalidStateTransition { action: String, state: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a rejected transition
    pub fn invalid_transition(action: impl Into<String>, state: impl std::fmt::Display) -> Self {
        AppError::InvalidStateTransition {
            action: action.into(),
            state: state.to_string(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Http(_) | AppError::Backend(_) | AppError::InitializationFailed(_)
        )
    }

    /// Short machine-friendly label, used as a log and metrics field
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Authentication(_) => "authentication",
            AppError::Backend(_) => "backend",
            AppError::UnsupportedCurrency { .. } => "unsupported_currency",
            AppError::InitializationFailed(_) => "initialization_failed",
            AppError::InvalidStateTransition { .. } => "invalid_state_transition",
            AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status the sandbox backend answers with for this error
    pub fn http_status_code(&self) -> warp::http::StatusCode {
        match self {
            AppError::Validation(_) | AppError::Json(_) | AppError::UnsupportedCurrency { .. } => {
                warp::http::StatusCode::BAD_REQUEST
            }
            AppError::Authentication(_) => warp::http::StatusCode::UNAUTHORIZED,
            AppError::InvalidStateTransition { .. } => warp::http::StatusCode::CONFLICT,
            _ => warp::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Json(err.to_string())
        } else {
            AppError::Http(err.to_string())
        }
    }
}
