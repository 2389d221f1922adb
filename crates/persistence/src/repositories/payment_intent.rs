//! Payment intent repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{PaymentIntent, PaymentIntentStatus};
use domain::store::{IntentInsert, PaymentIntentStore};
use domain::{RegistrationError, RegistrationResult};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{DocumentTypeDb, PaymentIntentEntity, PaymentIntentStatusDb};
use crate::metrics::QueryTimer;

/// Repository for payment intent database operations.
#[derive(Clone)]
pub struct PaymentIntentRepository {
    pool: PgPool,
}

impl PaymentIntentRepository {
    /// Creates a new PaymentIntentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_entity(&self, intent_id: &str) -> Result<Option<PaymentIntentEntity>, sqlx::Error> {
        sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            SELECT id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                   amount_cents, currency, client_secret, status, document_type, document_url,
                   price_tier_id, created_at, updated_at
            FROM payment_intents
            WHERE id = $1
            "#,
        )
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_open_by_key(&self, key: &str) -> Result<Option<PaymentIntentEntity>, sqlx::Error> {
        sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            SELECT id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                   amount_cents, currency, client_secret, status, document_type, document_url,
                   price_tier_id, created_at, updated_at
            FROM payment_intents
            WHERE idempotency_key = $1 AND status = 'requires_payment'
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl PaymentIntentStore for PaymentIntentRepository {
    async fn find_live_by_key(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>> {
        let timer = QueryTimer::new("find_live_intent_by_key");
        let result = sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            SELECT id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                   amount_cents, currency, client_secret, status, document_type, document_url,
                   price_tier_id, created_at, updated_at
            FROM payment_intents
            WHERE idempotency_key = $1
              AND status IN ('requires_payment', 'succeeded')
              AND created_at >= $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .bind(since)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn count_closed_by_key(&self, key: &str) -> RegistrationResult<u64> {
        let timer = QueryTimer::new("count_closed_intents_by_key");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM payment_intents
            WHERE idempotency_key = $1 AND status <> 'requires_payment'
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.max(0) as u64)
    }

    async fn insert_intent(&self, intent: PaymentIntent) -> RegistrationResult<IntentInsert> {
        let timer = QueryTimer::new("insert_payment_intent");
        let (document_type, document_url) = match &intent.document {
            Some(doc) => (
                Some(DocumentTypeDb::from(doc.document_type)),
                Some(doc.document_url.clone()),
            ),
            None => (None, None),
        };

        // Conflicts on either the id or the open-key index leave the stored row in place.
        let result = sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            INSERT INTO payment_intents (
                id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                amount_cents, currency, client_secret, status, document_type, document_url,
                price_tier_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT DO NOTHING
            RETURNING id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                      amount_cents, currency, client_secret, status, document_type, document_url,
                      price_tier_id, created_at, updated_at
            "#,
        )
        .bind(&intent.id)
        .bind(&intent.idempotency_key)
        .bind(&intent.user_id)
        .bind(&intent.email)
        .bind(intent.event_id)
        .bind(intent.ticket_id)
        .bind(intent.hold_id)
        .bind(Json(&intent.upsells))
        .bind(intent.amount_cents)
        .bind(&intent.currency)
        .bind(&intent.client_secret)
        .bind(PaymentIntentStatusDb::from(intent.status))
        .bind(document_type)
        .bind(document_url)
        .bind(intent.price_tier_id)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        if let Some(inserted) = result? {
            return Ok(IntentInsert::Inserted(inserted.into()));
        }

        if let Some(existing) = self.find_entity(&intent.id).await? {
            return Ok(IntentInsert::Existing(existing.into()));
        }
        if let Some(existing) = self.find_open_by_key(&intent.idempotency_key).await? {
            return Ok(IntentInsert::Existing(existing.into()));
        }
        Err(RegistrationError::Store(format!(
            "payment intent {} conflicted with a row that no longer exists",
            intent.id
        )))
    }

    async fn find_intent(&self, intent_id: &str) -> RegistrationResult<Option<PaymentIntent>> {
        let timer = QueryTimer::new("find_payment_intent");
        let result = self.find_entity(intent_id).await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn transition_intent(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<PaymentIntent>> {
        if !status.is_terminal() {
            return Err(RegistrationError::InvalidTransition(format!(
                "payment intent cannot move to {}",
                status
            )));
        }

        let timer = QueryTimer::new("transition_payment_intent");
        let result = sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            UPDATE payment_intents
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'requires_payment'
            RETURNING id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                      amount_cents, currency, client_secret, status, document_type, document_url,
                      price_tier_id, created_at, updated_at
            "#,
        )
        .bind(intent_id)
        .bind(PaymentIntentStatusDb::from(status))
        .bind(at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn update_intent_hold(
        &self,
        intent_id: &str,
        hold_id: Uuid,
        at: DateTime<Utc>,
    ) -> RegistrationResult<()> {
        let timer = QueryTimer::new("update_payment_intent_hold");
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET hold_id = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(intent_id)
        .bind(hold_id)
        .bind(at)
        .execute(&self.pool)
        .await;
        timer.finish(&result);

        if result?.rows_affected() == 0 {
            return Err(RegistrationError::NotFound("Payment intent".to_string()));
        }
        Ok(())
    }

    async fn list_stale_intents(
        &self,
        created_before: DateTime<Utc>,
    ) -> RegistrationResult<Vec<PaymentIntent>> {
        let timer = QueryTimer::new("list_stale_payment_intents");
        let result = sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            SELECT id, idempotency_key, user_id, email, event_id, ticket_id, hold_id, upsells,
                   amount_cents, currency, client_secret, status, document_type, document_url,
                   price_tier_id, created_at, updated_at
            FROM payment_intents
            WHERE status = 'requires_payment' AND created_at < $1
            ORDER BY created_at
            "#,
        )
        .bind(created_before)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn list_unregistered_succeeded(&self) -> RegistrationResult<Vec<PaymentIntent>> {
        let timer = QueryTimer::new("list_unregistered_succeeded_intents");
        let result = sqlx::query_as::<_, PaymentIntentEntity>(
            r#"
            SELECT p.id, p.idempotency_key, p.user_id, p.email, p.event_id, p.ticket_id,
                   p.hold_id, p.upsells, p.amount_cents, p.currency, p.client_secret, p.status,
                   p.document_type, p.document_url, p.price_tier_id, p.created_at, p.updated_at
            FROM payment_intents p
            WHERE p.status = 'succeeded'
              AND NOT EXISTS (
                  SELECT 1 FROM registrations r WHERE r.payment_intent_id = p.id
              )
            ORDER BY p.updated_at
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.into_iter().map(Into::into).collect())
    }
}
