//! HTTP route handlers.

pub mod checkin;
pub mod health;
pub mod payment_intents;
pub mod payment_webhooks;
pub mod registrations;
