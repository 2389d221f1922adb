//! Catalog repository: events, tickets and price tiers.

use async_trait::async_trait;
use domain::models::{Event, PriceTier, Ticket};
use domain::store::CatalogStore;
use domain::RegistrationResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{DocumentTypeDb, EventEntity, EventStatusDb, PriceTierEntity, TicketEntity};
use crate::metrics::QueryTimer;

/// Repository for catalog database operations.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts an event. Seat counters start at zero.
    pub async fn create_event(&self, event: &Event) -> Result<EventEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_event");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            INSERT INTO events (id, name, capacity, status, starts_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, name, capacity, status, starts_at, seats_held, seats_confirmed,
                      created_at, updated_at
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.capacity)
        .bind(EventStatusDb::from(event.status))
        .bind(event.starts_at)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Inserts a ticket for an existing event.
    pub async fn create_ticket(&self, ticket: &Ticket) -> Result<TicketEntity, sqlx::Error> {
        let document_types: Vec<DocumentTypeDb> =
            ticket.document_types.iter().map(|&t| t.into()).collect();

        let timer = QueryTimer::new("create_ticket");
        let result = sqlx::query_as::<_, TicketEntity>(
            r#"
            INSERT INTO tickets (id, event_id, name, base_price_cents, currency,
                                 max_participants, requires_document, document_types)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, event_id, name, base_price_cents, currency, max_participants,
                      requires_document, document_types, seats_held, seats_confirmed,
                      created_at, updated_at
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.event_id)
        .bind(&ticket.name)
        .bind(ticket.base_price_cents)
        .bind(&ticket.currency)
        .bind(ticket.max_participants)
        .bind(ticket.requires_document)
        .bind(document_types)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    pub async fn create_price_tier(&self, tier: &PriceTier) -> Result<PriceTierEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_price_tier");
        let result = sqlx::query_as::<_, PriceTierEntity>(
            r#"
            INSERT INTO price_tiers (id, event_id, name, discount_percentage,
                                     available_from, available_until, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, event_id, name, discount_percentage, available_from,
                      available_until, display_order, created_at
            "#,
        )
        .bind(tier.id)
        .bind(tier.event_id)
        .bind(&tier.name)
        .bind(tier.discount_percentage)
        .bind(tier.available_from)
        .bind(tier.available_until)
        .bind(tier.display_order)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Raw event row including seat counters.
    pub async fn find_event_entity(&self, event_id: Uuid) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, name, capacity, status, starts_at, seats_held, seats_confirmed,
                   created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Raw ticket row including seat counters.
    pub async fn find_ticket_entity(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_ticket");
        let result = sqlx::query_as::<_, TicketEntity>(
            r#"
            SELECT id, event_id, name, base_price_cents, currency, max_participants,
                   requires_document, document_types, seats_held, seats_confirmed,
                   created_at, updated_at
            FROM tickets
            WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn find_event(&self, event_id: Uuid) -> RegistrationResult<Option<Event>> {
        Ok(self.find_event_entity(event_id).await?.map(Into::into))
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> RegistrationResult<Option<Ticket>> {
        Ok(self.find_ticket_entity(ticket_id).await?.map(Into::into))
    }

    async fn list_price_tiers(&self, event_id: Uuid) -> RegistrationResult<Vec<PriceTier>> {
        let timer = QueryTimer::new("list_price_tiers");
        let result = sqlx::query_as::<_, PriceTierEntity>(
            r#"
            SELECT id, event_id, name, discount_percentage, available_from,
                   available_until, display_order, created_at
            FROM price_tiers
            WHERE event_id = $1
            ORDER BY display_order, id
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.into_iter().map(Into::into).collect())
    }
}
