//! Storefront payment API adapter
//!
//! Implements [`PaymentGateway`] over HTTP. Checkout and payment creation are
//! retried with linear backoff; status checks are sent once because the
//! poller already retries on its next tick.

use crate::{
    config::app_config::BackendConfig,
    domain::{CheckoutOrder, Currency, PaymentGateway, PaymentQuote, PaymentReference},
    shared::error::{AppError, AppResult},
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bearer credentials injected into every backend request
#[derive(Clone, Default)]
pub struct ApiCredentials {
    token: Option<String>,
}

impl ApiCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_some() { "<redacted>" } else { "<none>" };
        f.debug_struct("ApiCredentials").field("token", &token).finish()
    }
}

/// Either `{"status": .., "data": {..}}` or the payload itself
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    #[serde(deserialize_with = "id_string")]
    order_id: String,
    #[serde(alias = "total_amount_idr")]
    total_amount: f64,
}

#[derive(Serialize)]
struct CreatePaymentRequest<'a> {
    order_id: &'a str,
    currency: Currency,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    #[serde(rename = "walletAddress", alias = "wallet_address")]
    wallet_address: String,
    #[serde(default)]
    amount: Option<f64>,
    currency: Currency,
    #[serde(default, deserialize_with = "optional_id_string")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    #[serde(rename = "isPaid", alias = "is_paid")]
    is_paid: bool,
}

/// Order and payment ids arrive as strings or numbers depending on the backend
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected an id, got {}", other))),
    }
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected an id, got {}", other))),
    }
}

/// Decode a response body, tolerating both envelope styles
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    let value: Value = serde_json::from_slice(body)?;
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("backend reported an error");
        return Err(AppError::Backend(message.to_string()));
    }
    let envelope: Envelope<T> = serde_json::from_value(value)?;
    Ok(envelope.into_inner())
}

/// Turn a non-success status into an error; 5xx stays retryable
fn status_error(status: StatusCode, body: &[u8]) -> AppError {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

    if status == StatusCode::UNAUTHORIZED {
        AppError::Authentication(detail)
    } else if status.is_server_error() {
        AppError::Http(format!("backend returned {}: {}", status.as_u16(), detail))
    } else {
        AppError::Validation(format!("backend rejected request ({}): {}", status.as_u16(), detail))
    }
}

/// HTTP client for the storefront order/payment API
pub struct PaymentApiAdapter {
    client: Client,
    base_url: Url,
    credentials: ApiCredentials,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PaymentApiAdapter {
    /// Create a new adapter
    pub fn new(
        base_url: &str,
        credentials: ApiCredentials,
        timeout: Duration,
        max_retries: u32,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("Backend URL {} cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            credentials,
            max_retries,
            retry_backoff: Duration::from_millis(100),
        })
    }

    /// Create an adapter from the backend section of the configuration
    pub fn from_config(config: &BackendConfig) -> AppResult<Self> {
        let credentials = match &config.auth_token {
            Some(token) => ApiCredentials::bearer(token.clone()),
            None => ApiCredentials::anonymous(),
        };
        Self::new(
            &config.base_url,
            credentials,
            Duration::from_secs(config.timeout_seconds),
            config.max_retries,
        )
    }

    /// Override the base delay between retries (attempt `n` waits `n * backoff`)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> AppResult<T> {
        debug!(method = %method, url = %url, "Sending backend request");

        let mut request = self
            .credentials
            .apply(self.client.request(method, url))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }
        decode_body(&bytes)
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> AppResult<T> {
        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), url.clone(), body.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        operation = %operation,
                        error = %e,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        "Backend request failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for PaymentApiAdapter {
    async fn create_checkout(&self) -> AppResult<CheckoutOrder> {
        let url = self.endpoint(&["api", "checkout"]);
        let response: CheckoutResponse = self
            .send_with_retry("checkout", Method::POST, url, None)
            .await?;

        info!(order_id = %response.order_id, total = response.total_amount, "Checkout created");
        Ok(CheckoutOrder {
            order_id: response.order_id,
            total_amount: response.total_amount,
        })
    }

    async fn create_payment(&self, order_id: &str, currency: Currency) -> AppResult<PaymentQuote> {
        let url = self.endpoint(&["api", "payment", "create"]);
        let body = serde_json::to_value(CreatePaymentRequest { order_id, currency })?;
        let response: CreatePaymentResponse = self
            .send_with_retry("create_payment", Method::POST, url, Some(body))
            .await?;

        Ok(PaymentQuote {
            payment_id: response.id,
            currency: response.currency,
            wallet_address: response.wallet_address,
            amount: response.amount,
        })
    }

    async fn is_paid(&self, reference: &PaymentReference) -> AppResult<bool> {
        let (method, url) = match &reference.payment_id {
            Some(payment_id) => (
                Method::POST,
                self.endpoint(&["api", "payment", "check", payment_id.as_str()]),
            ),
            None => (
                Method::GET,
                self.endpoint(&["api", "payment", "status", reference.order_id.as_str()]),
            ),
        };
        let response: PaymentStatusResponse = self.send_once(method, url, None).await?;
        Ok(response.is_paid)
    }
}
