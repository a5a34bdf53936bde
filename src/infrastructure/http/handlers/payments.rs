//! Sandbox backend HTTP handlers

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::Reply;

use crate::domain::currency::Currency;
use crate::infrastructure::adapters::PaymentsStore;
use crate::shared::error::{AppError, AppResult};

/// Body of `POST /api/payment/create`
#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    pub order_id: String,
    pub currency: String,
}

/// Shared state of the sandbox handlers
#[derive(Clone)]
pub struct SandboxState {
    pub store: PaymentsStore,
    pub order_total: f64,
    pub auth_token: Option<Arc<str>>,
}

impl SandboxState {
    fn authorize(&self, header: Option<&str>) -> AppResult<()> {
        let Some(expected) = self.auth_token.as_deref() else {
            return Ok(());
        };
        match header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(AppError::Authentication("invalid bearer token".into())),
            None => Err(AppError::Authentication("missing bearer token".into())),
        }
    }
}

fn wrapped(data: serde_json::Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "status": "success", "data": data })),
        StatusCode::OK,
    )
}

fn error_reply(error: &AppError) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "status": "error",
            "error": error.kind(),
            "message": error.to_string(),
        })),
        error.http_status_code(),
    )
}

fn respond(result: AppResult<warp::reply::WithStatus<warp::reply::Json>>) -> warp::reply::WithStatus<warp::reply::Json> {
    match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Sandbox request failed");
            error_reply(&e)
        }
    }
}

pub async fn handle_checkout(
    authorization: Option<String>,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        state.authorize(authorization.as_deref())?;
        let order = state.store.create_order(state.order_total).await?;
        info!(order_id = %order.order_id, total = order.total_amount, "Sandbox order created");
        Ok::<_, AppError>(wrapped(serde_json::json!({
            "order_id": order.order_id,
            "total_amount": order.total_amount,
        })))
    }
    .await;
    Ok(respond(result))
}

pub async fn handle_payment_create(
    body: CreatePaymentBody,
    authorization: Option<String>,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        state.authorize(authorization.as_deref())?;
        let currency: Currency = body.currency.parse()?;
        let quote = state.store.create_payment(&body.order_id, currency).await?;
        info!(order_id = %body.order_id, currency = %currency, "Sandbox payment address issued");
        Ok::<_, AppError>(wrapped(serde_json::json!({
            "id": quote.payment_id,
            "walletAddress": quote.wallet_address,
            "amount": quote.amount,
            "currency": quote.currency,
        })))
    }
    .await;
    Ok(respond(result))
}

pub async fn handle_payment_status(
    order_id: String,
    authorization: Option<String>,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        state.authorize(authorization.as_deref())?;
        let paid = state.store.is_order_paid(&order_id).await?;
        Ok::<_, AppError>(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "isPaid": paid })),
            StatusCode::OK,
        ))
    }
    .await;
    Ok(respond(result))
}

pub async fn handle_payment_check(
    payment_id: String,
    authorization: Option<String>,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        state.authorize(authorization.as_deref())?;
        let paid = state.store.is_payment_paid(&payment_id).await?;
        Ok::<_, AppError>(wrapped(serde_json::json!({ "isPaid": paid })))
    }
    .await;
    Ok(respond(result))
}

pub async fn handle_mark_paid(
    order_id: String,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        let order = state.store.mark_paid(&order_id).await?;
        info!(order_id = %order.order_id, "Sandbox payment received");
        Ok::<_, AppError>(wrapped(serde_json::json!({ "order_id": order.order_id, "paid": order.paid })))
    }
    .await;
    Ok(respond(result))
}

pub async fn handle_get_order(
    order_id: String,
    state: SandboxState,
) -> Result<impl Reply, warp::reject::Rejection> {
    let result = async {
        let order = state
            .store
            .get(&order_id)
            .await
            .ok_or_else(|| AppError::Validation(format!("unknown order {}", order_id)))?;
        Ok::<_, AppError>(wrapped(serde_json::to_value(order)?))
    }
    .await;
    Ok(respond(result))
}
