//! External service integrations.

pub mod payment_processor;

pub use payment_processor::{HttpPaymentProcessor, HttpProcessorConfig};
