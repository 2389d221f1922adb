//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod capacity_hold;
pub mod checkin_counter;
pub mod event;
pub mod payment_intent;
pub mod price_tier;
pub mod registration;
pub mod ticket;

pub use capacity_hold::{CapacityHoldEntity, HoldSeatsEntity, HoldStatusDb};
pub use checkin_counter::{CheckinCounterEntity, CheckinStatsEntity, CounterDriftEntity};
pub use event::{EventEntity, EventStatusDb};
pub use payment_intent::{PaymentIntentEntity, PaymentIntentStatusDb};
pub use price_tier::PriceTierEntity;
pub use registration::{ApprovalStatusDb, RegistrationEntity};
pub use ticket::{DocumentTypeDb, TicketEntity};
