//! Metrics utilities module
//!
//! Prometheus counters for the checkout flow. Each instance owns its own
//! registry so that several flows (and tests) never collide on registration.

use crate::shared::error::{AppError, AppResult};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the flow counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    pub flows_started: u64,
    pub completed: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub currency_switches: u64,
    pub poll_ticks: u64,
    pub poll_errors: u64,
}

/// Counters recorded by the flow controller and the status poller
pub struct FlowMetrics {
    registry: Registry,
    flows_started: IntCounter,
    outcomes: IntCounterVec,
    currency_switches: IntCounter,
    poll_ticks: IntCounter,
    poll_errors: IntCounter,
}

impl FlowMetrics {
    /// Create and register the counters
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let flows_started = IntCounter::new(
            "checkout_flows_started_total",
            "Payment flows that reached initialization",
        )
        .map_err(metrics_error)?;
        let outcomes = IntCounterVec::new(
            Opts::new("checkout_flow_outcomes_total", "Terminal payment flow outcomes"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let currency_switches = IntCounter::new(
            "checkout_currency_switches_total",
            "Successful currency switches",
        )
        .map_err(metrics_error)?;
        let poll_ticks = IntCounter::new(
            "checkout_status_polls_total",
            "Payment status checks sent to the backend",
        )
        .map_err(metrics_error)?;
        let poll_errors = IntCounter::new(
            "checkout_status_poll_errors_total",
            "Payment status checks that failed",
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(flows_started.clone())).map_err(metrics_error)?;
        registry.register(Box::new(outcomes.clone())).map_err(metrics_error)?;
        registry.register(Box::new(currency_switches.clone())).map_err(metrics_error)?;
        registry.register(Box::new(poll_ticks.clone())).map_err(metrics_error)?;
        registry.register(Box::new(poll_errors.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            flows_started,
            outcomes,
            currency_switches,
            poll_ticks,
            poll_errors,
        })
    }

    pub fn record_flow_started(&self) {
        self.flows_started.inc();
    }

    /// Record a terminal outcome (`completed`, `expired`, `cancelled`)
    pub fn record_outcome(&self, outcome: &str) {
        self.outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn record_currency_switch(&self) {
        self.currency_switches.inc();
    }

    pub fn record_poll(&self) {
        self.poll_ticks.inc();
    }

    pub fn record_poll_error(&self) {
        self.poll_errors.inc();
    }

    /// Current counter values
    pub fn summary(&self) -> MetricsSummary {
        let outcome = |label: &str| self.outcomes.with_label_values(&[label]).get();
        MetricsSummary {
            flows_started: self.flows_started.get(),
            completed: outcome("completed"),
            expired: outcome("expired"),
            cancelled: outcome("cancelled"),
            currency_switches: self.currency_switches.get(),
            poll_ticks: self.poll_ticks.get(),
            poll_errors: self.poll_errors.get(),
        }
    }

    /// Prometheus text exposition of all counters
    pub fn render(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("metrics encoding: {}", e)))
    }
}

fn metrics_error(err: prometheus::Error) -> AppError {
    AppError::Internal(format!("metrics: {}", err))
}
