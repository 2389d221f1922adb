//! Repository implementations for database operations.
//!
//! Each repository implements one of the domain store traits.

pub mod capacity;
pub mod catalog;
pub mod payment_intent;
pub mod registration;

pub use capacity::CapacityRepository;
pub use catalog::CatalogRepository;
pub use payment_intent::PaymentIntentRepository;
pub use registration::RegistrationRepository;
