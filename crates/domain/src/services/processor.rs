//! Payment processor seam.
//!
//! The registration core only needs the processor's intent contract: open an
//! intent with an idempotency key, read its status, and cancel it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::PaymentIntentStatus;

/// Parameters for opening an intent at the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorIntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

/// The processor's view of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorIntent {
    pub id: String,
    pub client_secret: String,
    pub status: PaymentIntentStatus,
    pub amount_cents: i64,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),

    #[error("Payment processor rejected the request: {0}")]
    Rejected(String),

    #[error("Payment intent {0} not found at processor")]
    NotFound(String),
}

/// External payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(
        &self,
        request: ProcessorIntentRequest,
    ) -> Result<ProcessorIntent, ProcessorError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError>;

    /// Cancels an open intent. Returns the intent as the processor now sees
    /// it, which may already be succeeded.
    async fn cancel_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError>;
}

#[derive(Debug, Default)]
struct MockProcessorState {
    intents: HashMap<String, ProcessorIntent>,
    /// Idempotency key to the request first seen with it and the intent opened.
    by_key: HashMap<String, (ProcessorIntentRequest, String)>,
    last_request: Option<ProcessorIntentRequest>,
}

/// Mock processor for development and testing.
///
/// Idempotency keys behave like a real processor's: a repeated key replays
/// the intent first opened with it, whatever its current status, and a
/// repeated key with different parameters is rejected.
#[derive(Debug, Default)]
pub struct MockPaymentProcessor {
    state: Mutex<MockProcessorState>,
    create_calls: AtomicUsize,
    intents_created: AtomicUsize,
    simulate_failure: AtomicBool,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor that fails every intent creation.
    pub fn failing() -> Self {
        let processor = Self::default();
        processor.simulate_failure.store(true, Ordering::SeqCst);
        processor
    }

    pub fn set_failing(&self, failing: bool) {
        self.simulate_failure.store(failing, Ordering::SeqCst);
    }

    /// Number of `create_intent` calls received.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// The most recent `create_intent` request received.
    pub async fn last_request(&self) -> Option<ProcessorIntentRequest> {
        self.state.lock().await.last_request.clone()
    }

    /// Number of distinct intents opened (chargeable objects).
    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    /// Simulates the payer completing or abandoning payment.
    pub async fn set_status(&self, intent_id: &str, status: PaymentIntentStatus) -> bool {
        match self.state.lock().await.intents.get_mut(intent_id) {
            Some(intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(
        &self,
        request: ProcessorIntentRequest,
    ) -> Result<ProcessorIntent, ProcessorError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.simulate_failure.load(Ordering::SeqCst) {
            tracing::warn!(
                idempotency_key = %request.idempotency_key,
                "Mock payment processor simulating failure"
            );
            return Err(ProcessorError::Unavailable("Simulated failure".to_string()));
        }

        let mut state = self.state.lock().await;
        state.last_request = Some(request.clone());
        if let Some((original, intent_id)) = state.by_key.get(&request.idempotency_key) {
            if *original != request {
                return Err(ProcessorError::Rejected(format!(
                    "idempotency_key_in_use: key {} was used with different parameters",
                    request.idempotency_key
                )));
            }
            return state
                .intents
                .get(intent_id)
                .cloned()
                .ok_or_else(|| ProcessorError::NotFound(intent_id.clone()));
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = ProcessorIntent {
            client_secret: format!("{}_secret_{}", id, Uuid::new_v4().simple()),
            id: id.clone(),
            status: PaymentIntentStatus::RequiresPayment,
            amount_cents: request.amount_cents,
        };
        state
            .by_key
            .insert(request.idempotency_key.clone(), (request.clone(), id.clone()));
        state.intents.insert(id, intent.clone());
        self.intents_created.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            intent_id = %intent.id,
            amount_cents = request.amount_cents,
            currency = %request.currency,
            "Mock: Would create payment intent"
        );
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError> {
        self.state
            .lock()
            .await
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ProcessorError::NotFound(intent_id.to_string()))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<ProcessorIntent, ProcessorError> {
        let mut state = self.state.lock().await;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| ProcessorError::NotFound(intent_id.to_string()))?;
        if intent.status == PaymentIntentStatus::RequiresPayment {
            intent.status = PaymentIntentStatus::Cancelled;
        }
        Ok(intent.clone())
    }
}
