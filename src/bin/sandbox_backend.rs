//! Sandbox Backend Service
//!
//! An in-memory stand-in for the storefront order/payment API, for trying
//! the checkout flow without a real shop or wallet. Payments are simulated
//! with `POST /api/sandbox/orders/{order_id}/pay`.

use scent_checkout::{
    config::AppConfig,
    infrastructure::{
        adapters::PaymentsStore,
        http::{PaymentsRoutes, SandboxState},
    },
    shared::{
        error::AppResult,
        logging::LoggingUtils,
    },
};
use std::sync::Arc;
use tracing::{error, info};
use warp::Filter;

/// Sandbox service
pub struct SandboxService {
    config: AppConfig,
    state: SandboxState,
}

impl SandboxService {
    /// Create a new sandbox service
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let table = Arc::new(config.conversion_table()?);
        let state = SandboxState {
            store: PaymentsStore::new(table),
            order_total: config.sandbox.order_total,
            auth_token: config.backend.auth_token.as_deref().map(Arc::from),
        };
        Ok(Self { config, state })
    }

    /// Run the sandbox service
    pub async fn run(self) -> AppResult<()> {
        let addr = self.config.sandbox_address();

        info!(
            address = %addr,
            bearer_required = self.state.auth_token.is_some(),
            "Starting sandbox backend"
        );

        let health = warp::path("health").and(warp::get()).map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "sandbox-backend",
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        });
        let routes = health.or(PaymentsRoutes::create_routes(self.state));

        warp::serve(routes).run(addr).await;

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    LoggingUtils::initialize(&config.logging.level, &config.logging.format)?;

    let service = SandboxService::new(config)?;
    if let Err(e) = service.run().await {
        error!("Sandbox backend failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
