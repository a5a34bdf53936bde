//! HTTP adapter tests against live warp servers
//!
//! Runs on the real clock: the servers listen on ephemeral ports and the
//! client talks to them over TCP.

use crate::{
    domain::{ConversionTable, Currency, PaymentGateway, PaymentReference},
    infrastructure::{
        adapters::{ApiCredentials, PaymentApiAdapter, PaymentsStore},
        http::{handlers::SandboxState, routes::PaymentsRoutes},
    },
    shared::error::AppError,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_test::{assert_err, assert_ok};
use warp::http::{Method, StatusCode};
use warp::path::FullPath;
use warp::Filter;

/// Serve `routes` on a free local port and return its base URL
async fn serve<F>(routes: F) -> String
where
    F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);

    tokio::spawn(warp::serve(routes).run(addr));
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    format!("http://{}", addr)
}

/// Backend answering every request with `status` and `body`
///
/// Records each request as `METHOD /path` followed by its authorization
/// header, if any.
async fn fixed_backend(status: StatusCode, body: Value) -> (String, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let routes = warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("authorization"))
        .map(move |method: Method, path: FullPath, authorization: Option<String>| {
            let line = match authorization {
                Some(value) => format!("{} {} {}", method, path.as_str(), value),
                None => format!("{} {}", method, path.as_str()),
            };
            log.lock().unwrap().push(line);
            warp::reply::with_status(warp::reply::json(&body), status)
        });
    (serve(routes).await, seen)
}

fn adapter(base_url: &str, credentials: ApiCredentials) -> PaymentApiAdapter {
    PaymentApiAdapter::new(base_url, credentials, Duration::from_secs(5), 2)
        .unwrap()
        .with_retry_backoff(Duration::from_millis(5))
}

fn reference(order_id: &str, payment_id: Option<&str>) -> PaymentReference {
    PaymentReference {
        order_id: order_id.to_string(),
        payment_id: payment_id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_checkout_and_payment_against_sandbox() {
    let state = SandboxState {
        store: PaymentsStore::new(Arc::new(ConversionTable::default())),
        order_total: 1_600_000.0,
        auth_token: Some(Arc::from("sandbox-token")),
    };
    let url = serve(PaymentsRoutes::create_routes(state.clone())).await;
    let api = adapter(&url, ApiCredentials::bearer("sandbox-token"));

    let order = assert_ok!(api.create_checkout().await);
    assert!(order.order_id.starts_with("ORD-"));
    assert_eq!(order.total_amount, 1_600_000.0);

    let quote = assert_ok!(api.create_payment(&order.order_id, Currency::Sol).await);
    assert_eq!(quote.currency, Currency::Sol);
    assert_eq!(quote.amount, Some(0.5));
    let payment_id = quote.payment_id.clone().unwrap();

    let by_payment = reference(&order.order_id, Some(&payment_id));
    let by_order = reference(&order.order_id, None);
    assert!(!assert_ok!(api.is_paid(&by_payment).await));
    assert!(!assert_ok!(api.is_paid(&by_order).await));

    state.store.mark_paid(&order.order_id).await.unwrap();
    assert!(assert_ok!(api.is_paid(&by_payment).await));
    assert!(assert_ok!(api.is_paid(&by_order).await));
}

#[tokio::test]
async fn test_sandbox_rejects_missing_token() {
    let state = SandboxState {
        store: PaymentsStore::new(Arc::new(ConversionTable::default())),
        order_total: 1_600_000.0,
        auth_token: Some(Arc::from("sandbox-token")),
    };
    let url = serve(PaymentsRoutes::create_routes(state)).await;

    let err = assert_err!(adapter(&url, ApiCredentials::anonymous()).create_checkout().await);
    assert!(matches!(err, AppError::Authentication(_)));

    let err = assert_err!(adapter(&url, ApiCredentials::bearer("wrong")).create_checkout().await);
    assert!(matches!(err, AppError::Authentication(_)));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let (url, seen) = fixed_backend(
        StatusCode::OK,
        json!({ "status": "success", "data": { "order_id": "ORD-1", "total_amount": 1600000 } }),
    )
    .await;

    assert_ok!(adapter(&url, ApiCredentials::bearer("secret")).create_checkout().await);
    assert_ok!(adapter(&url, ApiCredentials::anonymous()).create_checkout().await);

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["POST /api/checkout Bearer secret", "POST /api/checkout"]
    );
}

#[tokio::test]
async fn test_server_errors_are_retried_up_to_limit() {
    let (url, seen) = fixed_backend(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "status": "error", "message": "upstream down" }),
    )
    .await;
    let api = adapter(&url, ApiCredentials::anonymous());

    let err = assert_err!(api.create_payment("ORD-1", Currency::Usdt).await);
    assert!(matches!(err, AppError::Http(_)));
    // first attempt plus two retries
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (url, seen) = fixed_backend(StatusCode::BAD_REQUEST, json!({ "error": "unknown order" })).await;
    let err = assert_err!(adapter(&url, ApiCredentials::anonymous()).create_checkout().await);
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(seen.lock().unwrap().len(), 1);

    let (url, seen) = fixed_backend(StatusCode::UNAUTHORIZED, json!({ "message": "Token expired" })).await;
    let err = assert_err!(adapter(&url, ApiCredentials::bearer("old")).create_checkout().await);
    assert_eq!(err, AppError::Authentication("Token expired".into()));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_check_is_sent_once() {
    let (url, seen) = fixed_backend(StatusCode::BAD_GATEWAY, json!({})).await;
    let api = adapter(&url, ApiCredentials::anonymous());

    let err = assert_err!(api.is_paid(&reference("ORD-1", None)).await);
    assert!(err.is_retryable());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_endpoint_follows_payment_id() {
    let (url, seen) = fixed_backend(StatusCode::OK, json!({ "isPaid": true })).await;
    let api = adapter(&url, ApiCredentials::anonymous());

    assert!(assert_ok!(api.is_paid(&reference("ORD-1", Some("pay-1"))).await));
    assert!(assert_ok!(api.is_paid(&reference("ORD-1", None)).await));

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["POST /api/payment/check/pay-1", "GET /api/payment/status/ORD-1"]
    );
}
