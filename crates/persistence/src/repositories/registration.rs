//! Registration repository: ledger rows and check-in counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    ApprovalDecision, CheckinStats, CounterDrift, DocumentReference, EventCheckinCounter,
    Registration, RegistrationInsert,
};
use domain::store::RegistrationStore;
use domain::RegistrationResult;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    ApprovalStatusDb, CheckinCounterEntity, CheckinStatsEntity, CounterDriftEntity,
    DocumentTypeDb, RegistrationEntity,
};
use crate::metrics::QueryTimer;

/// Repository for registration database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_by_intent_entity(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                   amount_cents, currency, document_required, approval_status, checked_in,
                   checked_in_at, qr_code_token, document_type, document_url, created_at,
                   approved_at, rejection_reason
            FROM registrations
            WHERE payment_intent_id = $1
            "#,
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> RegistrationResult<RegistrationInsert> {
        let timer = QueryTimer::new("insert_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            INSERT INTO registrations (
                id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                amount_cents, currency, document_required, approval_status, checked_in,
                checked_in_at, qr_code_token, document_type, document_url, created_at,
                approved_at, rejection_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (payment_intent_id) DO NOTHING
            RETURNING id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                      amount_cents, currency, document_required, approval_status, checked_in,
                      checked_in_at, qr_code_token, document_type, document_url, created_at,
                      approved_at, rejection_reason
            "#,
        )
        .bind(registration.id)
        .bind(registration.event_id)
        .bind(registration.ticket_id)
        .bind(&registration.user_id)
        .bind(&registration.email)
        .bind(&registration.payment_intent_id)
        .bind(Json(&registration.upsells))
        .bind(registration.amount_cents)
        .bind(&registration.currency)
        .bind(registration.document_required)
        .bind(ApprovalStatusDb::from(registration.approval_status))
        .bind(registration.checked_in)
        .bind(registration.checked_in_at)
        .bind(&registration.qr_code_token)
        .bind(registration.document_type.map(DocumentTypeDb::from))
        .bind(&registration.document_url)
        .bind(registration.created_at)
        .bind(registration.approved_at)
        .bind(&registration.rejection_reason)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);

        if let Some(created) = result? {
            return Ok(RegistrationInsert::Created(created.into()));
        }
        match self
            .find_by_intent_entity(&registration.payment_intent_id)
            .await?
        {
            Some(existing) => Ok(RegistrationInsert::Existing(existing.into())),
            None => Err(domain::RegistrationError::Store(format!(
                "registration for intent {} conflicted but was not found",
                registration.payment_intent_id
            ))),
        }
    }

    async fn find_registration(&self, id: Uuid) -> RegistrationResult<Option<Registration>> {
        let timer = QueryTimer::new("find_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                   amount_cents, currency, document_required, approval_status, checked_in,
                   checked_in_at, qr_code_token, document_type, document_url, created_at,
                   approved_at, rejection_reason
            FROM registrations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> RegistrationResult<Option<Registration>> {
        let timer = QueryTimer::new("find_registration_by_intent");
        let result = self.find_by_intent_entity(payment_intent_id).await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn find_by_token(&self, token: &str) -> RegistrationResult<Option<Registration>> {
        let timer = QueryTimer::new("find_registration_by_token");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                   amount_cents, currency, document_required, approval_status, checked_in,
                   checked_in_at, qr_code_token, document_type, document_url, created_at,
                   approved_at, rejection_reason
            FROM registrations
            WHERE qr_code_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn set_approval(
        &self,
        id: Uuid,
        decision: &ApprovalDecision,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>> {
        let (status, approved_at, reason) = match decision {
            ApprovalDecision::Approve => (ApprovalStatusDb::Approved, Some(at), None),
            ApprovalDecision::Reject { reason } => {
                (ApprovalStatusDb::Rejected, None, Some(reason.as_str()))
            }
        };

        let timer = QueryTimer::new("set_registration_approval");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            UPDATE registrations
            SET approval_status = $2,
                approved_at = COALESCE($3, approved_at),
                rejection_reason = COALESCE($4, rejection_reason)
            WHERE id = $1 AND approval_status = 'pending'
            RETURNING id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                      amount_cents, currency, document_required, approval_status, checked_in,
                      checked_in_at, qr_code_token, document_type, document_url, created_at,
                      approved_at, rejection_reason
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(approved_at)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn attach_document(
        &self,
        id: Uuid,
        document: &DocumentReference,
    ) -> RegistrationResult<Option<Registration>> {
        let timer = QueryTimer::new("attach_registration_document");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            UPDATE registrations
            SET document_type = $2, document_url = $3
            WHERE id = $1 AND approval_status = 'pending'
            RETURNING id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                      amount_cents, currency, document_required, approval_status, checked_in,
                      checked_in_at, qr_code_token, document_type, document_url, created_at,
                      approved_at, rejection_reason
            "#,
        )
        .bind(id)
        .bind(DocumentTypeDb::from(document.document_type))
        .bind(&document.document_url)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn check_in(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Option<Registration>> {
        let timer = QueryTimer::new("check_in_registration");
        let mut tx = self.pool.begin().await?;

        let checked_in = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            UPDATE registrations
            SET checked_in = TRUE, checked_in_at = $2
            WHERE qr_code_token = $1
              AND checked_in = FALSE
              AND (approval_status = 'approved' OR document_required = FALSE)
            RETURNING id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                      amount_cents, currency, document_required, approval_status, checked_in,
                      checked_in_at, qr_code_token, document_type, document_url, created_at,
                      approved_at, rejection_reason
            "#,
        )
        .bind(token)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(registration) = checked_in else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO event_checkin_counters (event_id, checked_in)
            VALUES ($1, 1)
            ON CONFLICT (event_id) DO UPDATE
            SET checked_in = event_checkin_counters.checked_in + 1
            "#,
        )
        .bind(registration.event_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(registration.into()))
    }

    async fn list_for_event(&self, event_id: Uuid) -> RegistrationResult<Vec<Registration>> {
        let timer = QueryTimer::new("list_event_registrations");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, ticket_id, user_id, email, payment_intent_id, upsells,
                   amount_cents, currency, document_required, approval_status, checked_in,
                   checked_in_at, qr_code_token, document_type, document_url, created_at,
                   approved_at, rejection_reason
            FROM registrations
            WHERE event_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn checkin_stats(&self, event_id: Uuid) -> RegistrationResult<CheckinStats> {
        let timer = QueryTimer::new("event_checkin_stats");
        let result = sqlx::query_as::<_, CheckinStatsEntity>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE checked_in) AS checked_in
            FROM registrations
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        let stats = result?;
        Ok(CheckinStats::new(stats.total, stats.checked_in))
    }

    async fn find_checkin_counter(
        &self,
        event_id: Uuid,
    ) -> RegistrationResult<Option<EventCheckinCounter>> {
        let timer = QueryTimer::new("find_checkin_counter");
        let result = sqlx::query_as::<_, CheckinCounterEntity>(
            r#"
            SELECT event_id, checked_in, reconciled_at
            FROM event_checkin_counters
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }

    async fn reconcile_checkin_counters(
        &self,
        at: DateTime<Utc>,
    ) -> RegistrationResult<Vec<CounterDrift>> {
        let timer = QueryTimer::new("reconcile_checkin_counters");
        let result = sqlx::query_as::<_, CounterDriftEntity>(
            r#"
            WITH actual AS (
                SELECT event_id, COUNT(*) FILTER (WHERE checked_in) AS checked_in
                FROM registrations
                GROUP BY event_id
                UNION ALL
                SELECT c.event_id, 0::BIGINT
                FROM event_checkin_counters c
                WHERE NOT EXISTS (SELECT 1 FROM registrations r WHERE r.event_id = c.event_id)
            ),
            previous AS (
                SELECT event_id, checked_in FROM event_checkin_counters
            ),
            upserted AS (
                INSERT INTO event_checkin_counters (event_id, checked_in, reconciled_at)
                SELECT event_id, checked_in, $1 FROM actual
                ON CONFLICT (event_id) DO UPDATE
                SET checked_in = EXCLUDED.checked_in, reconciled_at = EXCLUDED.reconciled_at
                RETURNING event_id, checked_in
            )
            SELECT u.event_id, COALESCE(p.checked_in, 0) AS cached, u.checked_in AS actual
            FROM upserted u
            LEFT JOIN previous p ON p.event_id = u.event_id
            WHERE COALESCE(p.checked_in, 0) <> u.checked_in
            ORDER BY u.event_id
            "#,
        )
        .bind(at)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.into_iter().map(Into::into).collect())
    }
}
