//! Capacity repository: seat holds and seat counters.
//!
//! Every transaction locks the event row first, then holds, then the ticket
//! row, so concurrent reserves, confirmations and sweeps never deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{CapacityHold, HoldConfirmation, ReserveOutcome};
use domain::store::CapacityStore;
use domain::RegistrationResult;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::{CapacityHoldEntity, EventStatusDb, HoldSeatsEntity, HoldStatusDb};
use crate::metrics::QueryTimer;

/// Repository for capacity hold database operations.
#[derive(Clone)]
pub struct CapacityRepository {
    pool: PgPool,
}

impl CapacityRepository {
    /// Creates a new CapacityRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Locks an event row and returns its status.
    async fn lock_event(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> Result<Option<EventStatusDb>, sqlx::Error> {
        sqlx::query_scalar::<_, EventStatusDb>(
            r#"
            SELECT status FROM events WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Expires stale active holds of one event and returns their seats.
    /// The event row must already be locked.
    async fn expire_event_holds(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let expired = sqlx::query_scalar::<_, i64>(
            r#"
            WITH expired AS (
                UPDATE capacity_holds
                SET status = 'expired'
                WHERE event_id = $1 AND status = 'active' AND expires_at < $2
                RETURNING ticket_id, seats
            ),
            per_ticket AS (
                SELECT ticket_id, SUM(seats)::INTEGER AS seats
                FROM expired
                GROUP BY ticket_id
            ),
            ticket_release AS (
                UPDATE tickets t
                SET seats_held = GREATEST(t.seats_held - p.seats, 0)
                FROM per_ticket p
                WHERE t.id = p.ticket_id
                RETURNING t.id
            ),
            event_release AS (
                UPDATE events
                SET seats_held = GREATEST(seats_held - (SELECT COALESCE(SUM(seats), 0) FROM expired)::INTEGER, 0)
                WHERE id = $1 AND EXISTS (SELECT 1 FROM expired)
                RETURNING id
            )
            SELECT COUNT(*) FROM expired
            "#,
        )
        .bind(event_id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(expired as u64)
    }

    /// Moves an active hold to `to` and adjusts both seat counters.
    /// Returns the hold's seats when the transition happened.
    async fn settle_hold(
        &self,
        hold_id: Uuid,
        to: HoldStatusDb,
    ) -> Result<Option<HoldSeatsEntity>, sqlx::Error> {
        let Some(event_id) = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT event_id FROM capacity_holds WHERE id = $1
            "#,
        )
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let confirming = to == HoldStatusDb::Confirmed;
        let mut tx = self.pool.begin().await?;
        Self::lock_event(&mut tx, event_id).await?;

        let settled = sqlx::query_as::<_, HoldSeatsEntity>(
            r#"
            UPDATE capacity_holds
            SET status = $2
            WHERE id = $1 AND status = 'active'
            RETURNING event_id, ticket_id, seats
            "#,
        )
        .bind(hold_id)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(hold) = settled {
            sqlx::query(
                r#"
                UPDATE events
                SET seats_held = GREATEST(seats_held - $2, 0),
                    seats_confirmed = seats_confirmed + CASE WHEN $3 THEN $2 ELSE 0 END,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(hold.event_id)
            .bind(hold.seats)
            .bind(confirming)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE tickets
                SET seats_held = GREATEST(seats_held - $2, 0),
                    seats_confirmed = seats_confirmed + CASE WHEN $3 THEN $2 ELSE 0 END,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(hold.ticket_id)
            .bind(hold.seats)
            .bind(confirming)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(settled)
    }

    async fn find_hold_entity(
        &self,
        hold_id: Uuid,
    ) -> Result<Option<CapacityHoldEntity>, sqlx::Error> {
        sqlx::query_as::<_, CapacityHoldEntity>(
            r#"
            SELECT id, event_id, ticket_id, seats, status, created_at, expires_at
            FROM capacity_holds
            WHERE id = $1
            "#,
        )
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl CapacityStore for CapacityRepository {
    async fn try_reserve(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RegistrationResult<ReserveOutcome> {
        let timer = QueryTimer::new("reserve_seat");
        let mut tx = self.pool.begin().await?;

        let Some(status) = Self::lock_event(&mut tx, event_id).await? else {
            timer.record();
            return Ok(ReserveOutcome::NotFound);
        };
        let ticket_event = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT event_id FROM tickets WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?;
        if ticket_event != Some(event_id) {
            timer.record();
            return Ok(ReserveOutcome::NotFound);
        }
        if status != EventStatusDb::OnSale {
            timer.record();
            return Ok(ReserveOutcome::EventNotOnSale);
        }

        Self::expire_event_holds(&mut tx, event_id, now).await?;

        let event_seat = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE events
            SET seats_held = seats_held + 1, updated_at = $2
            WHERE id = $1 AND seats_held + seats_confirmed < capacity
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        if event_seat.is_none() {
            // Keep the expirations; only the increment is refused.
            tx.commit().await?;
            timer.record();
            return Ok(ReserveOutcome::Exhausted);
        }

        let ticket_seat = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE tickets
            SET seats_held = seats_held + 1, updated_at = $2
            WHERE id = $1
              AND (max_participants = 0 OR seats_held + seats_confirmed < max_participants)
            RETURNING id
            "#,
        )
        .bind(ticket_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        if ticket_seat.is_none() {
            tx.rollback().await?;
            timer.record();
            return Ok(ReserveOutcome::Exhausted);
        }

        let hold = sqlx::query_as::<_, CapacityHoldEntity>(
            r#"
            INSERT INTO capacity_holds (event_id, ticket_id, seats, status, created_at, expires_at)
            VALUES ($1, $2, 1, 'active', $3, $4)
            RETURNING id, event_id, ticket_id, seats, status, created_at, expires_at
            "#,
        )
        .bind(event_id)
        .bind(ticket_id)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(ReserveOutcome::Granted(hold.into()))
    }

    async fn confirm_hold(&self, hold_id: Uuid) -> RegistrationResult<HoldConfirmation> {
        let timer = QueryTimer::new("confirm_hold");
        let settled = self.settle_hold(hold_id, HoldStatusDb::Confirmed).await;
        timer.finish(&settled);
        if settled?.is_some() {
            return Ok(HoldConfirmation::Confirmed);
        }

        match self.find_hold_entity(hold_id).await? {
            Some(hold) if hold.status == HoldStatusDb::Confirmed => {
                Ok(HoldConfirmation::AlreadyConfirmed)
            }
            Some(_) => Ok(HoldConfirmation::Lapsed),
            None => Err(domain::RegistrationError::NotFound(
                "Capacity hold".to_string(),
            )),
        }
    }

    async fn release_hold(&self, hold_id: Uuid) -> RegistrationResult<bool> {
        let timer = QueryTimer::new("release_hold");
        let settled = self.settle_hold(hold_id, HoldStatusDb::Released).await;
        timer.finish(&settled);
        Ok(settled?.is_some())
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> RegistrationResult<u64> {
        let timer = QueryTimer::new("expire_holds");
        let events = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT event_id
            FROM capacity_holds
            WHERE status = 'active' AND expires_at < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut expired = 0;
        for event_id in events {
            let mut tx = self.pool.begin().await?;
            Self::lock_event(&mut tx, event_id).await?;
            expired += Self::expire_event_holds(&mut tx, event_id, now).await?;
            tx.commit().await?;
        }
        timer.record();
        if expired > 0 {
            tracing::debug!(expired, "Expired stale capacity holds");
        }
        Ok(expired)
    }

    async fn find_hold(&self, hold_id: Uuid) -> RegistrationResult<Option<CapacityHold>> {
        let timer = QueryTimer::new("find_hold");
        let result = self.find_hold_entity(hold_id).await;
        timer.finish(&result);
        Ok(result?.map(Into::into))
    }
}
