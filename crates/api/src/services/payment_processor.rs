//! HTTP client for a card payment processor.
//!
//! Speaks the common form-encoded payment-intent API: `POST /v1/payment_intents`
//! with an `Idempotency-Key` header, `GET /v1/payment_intents/{id}` and
//! `POST /v1/payment_intents/{id}/cancel`, authenticated with a bearer secret key.

use async_trait::async_trait;
use domain::models::PaymentIntentStatus;
use domain::services::{PaymentProcessor, ProcessorError, ProcessorIntent, ProcessorIntentRequest};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PaymentsConfig;

/// Connection settings for [`HttpPaymentProcessor`].
#[derive(Debug, Clone)]
pub struct HttpProcessorConfig {
    pub api_base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl From<&PaymentsConfig> for HttpProcessorConfig {
    fn from(config: &PaymentsConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            secret_key: config.secret_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    #[serde(default)]
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps the processor's intent status onto the local lifecycle. Every
/// in-flight status (`requires_action`, `processing`, ...) is still unpaid.
fn map_status(status: &str) -> PaymentIntentStatus {
    match status {
        "succeeded" => PaymentIntentStatus::Succeeded,
        "canceled" | "cancelled" => PaymentIntentStatus::Cancelled,
        "failed" => PaymentIntentStatus::Failed,
        _ => PaymentIntentStatus::RequiresPayment,
    }
}

impl From<IntentBody> for ProcessorIntent {
    fn from(body: IntentBody) -> Self {
        Self {
            status: map_status(&body.status),
            id: body.id,
            client_secret: body.client_secret.unwrap_or_default(),
            amount_cents: body.amount,
        }
    }
}

pub struct HttpPaymentProcessor {
    client: Client,
    config: HttpProcessorConfig,
}

impl HttpPaymentProcessor {
    pub fn new(config: HttpProcessorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder, intent_id: Option<&str>) -> Result<ProcessorIntent, ProcessorError> {
        let response = request
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProcessorError::Unavailable("request timed out".to_string())
                } else {
                    ProcessorError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<IntentBody>()
                .await
                .map(Into::into)
                .map_err(|e| ProcessorError::Unavailable(format!("invalid response body: {}", e)));
        }

        let detail = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .map(|envelope| {
                let code = envelope.error.code.unwrap_or_default();
                let message = envelope.error.message.unwrap_or_default();
                format!("{} {}", code, message).trim().to_string()
            })
            .unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => Err(ProcessorError::NotFound(
                intent_id.unwrap_or_default().to_string(),
            )),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => Err(
                ProcessorError::Unavailable(format!("HTTP {}: {}", s.as_u16(), detail)),
            ),
            s => Err(ProcessorError::Rejected(format!(
                "HTTP {}: {}",
                s.as_u16(),
                detail
            ))),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn create_intent(
        &self,
        request: ProcessorIntentRequest,
    ) -> Result<ProcessorIntent, ProcessorError> {
        let mut form = vec![
            ("amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        let mut metadata: Vec<_> = request.metadata.iter().collect();
        metadata.sort();
        form.extend(
            metadata
                .into_iter()
                .map(|(key, value)| (format!("metadata[{}]", key), value.clone())),
        );

        debug!(amount = request.amount_cents, currency = %request.currency, "Creating processor intent");
        let builder = self
            .client
            .post(self.url("/v1/payment_intents"))
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form);
        self.send(builder, None).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let builder = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{}", intent_id)));
        self.send(builder, Some(intent_id)).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let builder = self
            .client
            .post(self.url(&format!("/v1/payment_intents/{}/cancel", intent_id)));
        match self.send(builder, Some(intent_id)).await {
            // Cancelling an intent that already settled is refused; report its
            // current state instead.
            Err(ProcessorError::Rejected(reason)) => {
                warn!(intent_id = %intent_id, reason = %reason, "Processor refused cancellation");
                self.retrieve_intent(intent_id).await
            }
            other => other,
        }
    }
}
