//! Domain models for race registration.

pub mod checkin;
pub mod event;
pub mod hold;
pub mod payment_intent;
pub mod price_tier;
pub mod registration;
pub mod ticket;

pub use checkin::{
    CheckInOutcome, CheckInQuery, CheckInRequest, CheckInResponse, CheckinStats, CounterDrift,
    EventCheckinCounter, EventOverview,
};
pub use event::{Event, EventStatus};
pub use hold::{CapacityHold, HoldConfirmation, HoldStatus, ReserveOutcome, SeatUsage};
pub use payment_intent::{
    CreatePaymentIntentRequest, CreatePaymentIntentResponse, DocumentReference, PaymentConfirmed,
    PaymentIntent, PaymentIntentStatus, ProcessorWebhookData, ProcessorWebhookEvent, Upsell,
    WebhookAck,
};
pub use price_tier::PriceTier;
pub use registration::{
    ApprovalDecision, ApprovalRequest, ApprovalStatus, CreateRegistrationRequest, Registration,
    RegistrationInsert, RegistrationState, UploadDocumentRequest,
};
pub use ticket::{DocumentType, Ticket};
