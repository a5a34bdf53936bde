//! Application configuration structures
//!
//! This module contains the main configuration structures for the checkout
//! client and the sandbox backend.

use crate::config::validation::ConfigValidator;
use crate::domain::currency::{ConversionTable, Currency};
use crate::shared::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use validator::Validate;

/// Remote order/payment backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    /// Base URL of the storefront API (e.g., "https://shop.example.com")
    #[validate(url)]
    pub base_url: String,

    /// Bearer token injected into every request
    pub auth_token: Option<String>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    /// Retry attempts for checkout and payment creation (never for status polls)
    #[validate(range(min = 0, max = 10))]
    pub max_retries: u32,
}

/// Payment flow configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentConfig {
    /// Currency preselected when a session is created
    #[validate(length(min = 1))]
    pub default_currency: String,

    /// Seconds between two payment status checks
    #[validate(range(min = 1, max = 60))]
    pub poll_interval_seconds: u64,

    /// Lifetime of a payment address in seconds
    #[validate(range(min = 60, max = 3600))]
    pub session_window_seconds: u64,

    /// Fiat units per coin, keyed by currency code
    ///
    /// Codes are matched case-insensitively; each currency may appear once.
    pub rates: HashMap<String, f64>,
}

impl PaymentConfig {
    /// Rates keyed by currency, rejecting codes that name the same currency twice
    pub fn currency_rates(&self) -> AppResult<HashMap<Currency, f64>> {
        let mut codes = HashMap::new();
        let mut rates = HashMap::new();
        for (code, rate) in &self.rates {
            let currency: Currency = code.parse()?;
            if let Some(previous) = codes.insert(currency, code.as_str()) {
                return Err(AppError::Validation(format!(
                    "Rate for {} configured twice (as {:?} and {:?})",
                    currency, previous, code
                )));
            }
            rates.insert(currency, *rate);
        }
        Ok(rates)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format ("text" or "json")
    #[validate(length(min = 1))]
    pub format: String,
}

/// Sandbox backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SandboxConfig {
    /// Address to bind to
    pub bind_address: IpAddr,

    /// Port to listen on
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Total (fiat) assigned to every order created by `POST /api/checkout`
    #[validate(range(min = 1.0))]
    pub order_total: f64,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend configuration
    pub backend: BackendConfig,

    /// Payment flow configuration
    pub payment: PaymentConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Sandbox backend configuration
    pub sandbox: SandboxConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            auth_token: None,
            timeout_seconds: 30,
            max_retries: 2,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            default_currency: "USDT".to_string(),
            poll_interval_seconds: 10,
            session_window_seconds: 900, // 15 minutes
            rates: ConversionTable::default()
                .entries()
                .map(|(currency, rate)| (currency.code().to_lowercase(), rate))
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([127, 0, 0, 1]),
            port: 8000,
            order_total: 1_600_000.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            payment: PaymentConfig::default(),
            logging: LoggingConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Environment keys arrive lowercased (`SCENT_CHECKOUT__PAYMENT__RATES__SOL`
    /// becomes `payment.rates.sol`), so the default rates use lowercase codes
    /// and an override replaces the default instead of sitting next to it.
    pub fn load() -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("Checkout").required(false))
            .add_source(config::Environment::with_prefix("SCENT_CHECKOUT").separator("__"))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let mut config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;
        config.payment.rates = config
            .payment
            .currency_rates()?
            .into_iter()
            .map(|(currency, rate)| (currency.code().to_string(), rate))
            .collect();

        config
            .validate_config()
            .map_err(|e| AppError::Validation(format!("Configuration validation failed: {}", e)))?;
        ConfigValidator::validate_config(&config)?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.backend.validate()?;
        self.payment.validate()?;
        self.logging.validate()?;
        self.sandbox.validate()?;
        Ok(())
    }

    /// Currency preselected for new sessions
    pub fn default_currency(&self) -> AppResult<Currency> {
        self.payment.default_currency.parse()
    }

    /// Conversion table built from the configured rates
    pub fn conversion_table(&self) -> AppResult<ConversionTable> {
        ConversionTable::new(self.payment.currency_rates()?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.payment.poll_interval_seconds)
    }

    pub fn session_window(&self) -> Duration {
        Duration::from_secs(self.payment.session_window_seconds)
    }

    /// Socket address the sandbox backend binds to
    pub fn sandbox_address(&self) -> SocketAddr {
        SocketAddr::new(self.sandbox.bind_address, self.sandbox.port)
    }
}
