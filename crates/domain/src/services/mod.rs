//! Domain services for race registration.
//!
//! Services contain business logic that operates on domain models through
//! the store traits.

pub mod capacity;
pub mod checkin;
pub mod documents;
pub mod ledger;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod processor;

pub use capacity::{CapacityAllocator, DEFAULT_HOLD_TTL_SECS};
pub use checkin::CheckInService;
pub use documents::{validate_document, DocumentApprovalGate};
pub use ledger::RegistrationLedger;
pub use notification::{
    MockRegistrationNotifier, NotificationResult, NotificationType, RecordingNotifier,
    RegistrationNotification, RegistrationNotifier,
};
pub use payment::{
    idempotency_key, processor_idempotency_key, CreateIntentCommand, CreatedIntent,
    IntentExpiryReport, IntentSync, PaymentIntentCoordinator, PaymentSettings,
    ReconciliationReport, StatusApplication, WebhookOutcome,
};
pub use pricing::PriceQuote;
pub use processor::{
    MockPaymentProcessor, PaymentProcessor, ProcessorError, ProcessorIntent,
    ProcessorIntentRequest,
};
