//! Domain layer for the race registration backend.
//!
//! This crate contains:
//! - Domain models (Event, Ticket, PriceTier, CapacityHold, PaymentIntent, Registration)
//! - The registration core services and their storage seams
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
pub mod store;

pub use errors::{RegistrationError, RegistrationResult};
