//! Test suite for the checkout payment flow
//!
//! This module provides:
//! - Scripted backend and recording host shared by all tests
//! - Scenario tests that drive the flow controller on a paused clock

pub mod common;

/// Test configuration and utilities
pub mod config {
    use crate::config::AppConfig;
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Initialize test environment
    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// Configuration with a fast poll and a short window
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.payment.poll_interval_seconds = 1;
        config.payment.session_window_seconds = 60;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::FlowSettings;
    use crate::config::ConfigValidator;
    use std::time::Duration;

    #[test]
    fn test_config_initialization() {
        config::init();
        let test_config = config::test_config();
        assert!(ConfigValidator::validate_config(&test_config).is_ok());

        let settings = FlowSettings::from_config(&test_config).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.session_window, Duration::from_secs(60));
    }
}
