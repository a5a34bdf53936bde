use crate::{
    application::services::PaymentFlowController,
    domain::{CheckoutOrder, Currency, PaymentGateway, PaymentView},
    shared::error::AppResult,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Use case for turning the current cart into an order awaiting payment
pub struct CheckoutUseCase {
    gateway: Arc<dyn PaymentGateway>,
    controller: Arc<PaymentFlowController>,
}

impl CheckoutUseCase {
    pub fn new(gateway: Arc<dyn PaymentGateway>, controller: Arc<PaymentFlowController>) -> Self {
        Self { gateway, controller }
    }

    /// Create the order, then open the payment flow for it
    pub async fn execute(&self, currency: Option<Currency>) -> AppResult<(CheckoutOrder, PaymentView)> {
        let order = match self.gateway.create_checkout().await {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Checkout failed");
                return Err(e);
            }
        };
        info!(order_id = %order.order_id, total = order.total_amount, "Order created");

        let view = self.controller.start(&order, currency).await?;
        Ok((order, view))
    }

    pub fn controller(&self) -> &Arc<PaymentFlowController> {
        &self.controller
    }
}
