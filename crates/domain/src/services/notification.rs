//! Registration notifications.
//!
//! Email composition and delivery live outside the registration core; the
//! core only emits typed notifications through [`RegistrationNotifier`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::Registration;

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PaymentConfirmed,
    DocumentRequired,
    DocumentRejected,
    RegistrationApproved,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::PaymentConfirmed => write!(f, "payment_confirmed"),
            NotificationType::DocumentRequired => write!(f, "document_required"),
            NotificationType::DocumentRejected => write!(f, "document_rejected"),
            NotificationType::RegistrationApproved => write!(f, "registration_approved"),
        }
    }
}

/// Payload handed to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub email: String,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RegistrationNotification {
    pub fn new(notification_type: NotificationType, registration: &Registration) -> Self {
        Self {
            notification_type,
            registration_id: registration.id,
            event_id: registration.event_id,
            email: registration.email.clone(),
            amount_cents: registration.amount_cents,
            currency: registration.currency.clone(),
            reason: registration.rejection_reason.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of a notification send attempt.
#[derive(Debug, Clone)]
pub enum NotificationResult {
    /// Notification was sent successfully.
    Sent,
    /// Notification sending failed (but was non-blocking).
    Failed(String),
}

/// Outbound notification seam.
#[async_trait::async_trait]
pub trait RegistrationNotifier: Send + Sync {
    async fn notify(&self, notification: RegistrationNotification) -> NotificationResult;
}

/// Mock notifier for development.
///
/// Logs notifications but doesn't actually send them.
#[derive(Debug, Clone, Default)]
pub struct MockRegistrationNotifier {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
}

impl MockRegistrationNotifier {
    pub fn new() -> Self {
        Self {
            simulate_failure: false,
        }
    }

    /// Create a mock notifier that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
        }
    }
}

#[async_trait::async_trait]
impl RegistrationNotifier for MockRegistrationNotifier {
    async fn notify(&self, notification: RegistrationNotification) -> NotificationResult {
        if self.simulate_failure {
            tracing::warn!(
                registration_id = %notification.registration_id,
                notification_type = %notification.notification_type,
                "Mock notifier simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            registration_id = %notification.registration_id,
            notification_type = %notification.notification_type,
            email = %notification.email,
            "Mock: Would send registration notification"
        );
        NotificationResult::Sent
    }
}

/// Notifier that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<RegistrationNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<RegistrationNotification> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_types(&self) -> Vec<NotificationType> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|n| n.notification_type)
            .collect()
    }
}

#[async_trait::async_trait]
impl RegistrationNotifier for RecordingNotifier {
    async fn notify(&self, notification: RegistrationNotification) -> NotificationResult {
        self.sent.lock().await.push(notification);
        NotificationResult::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(notification_type: NotificationType) -> RegistrationNotification {
        RegistrationNotification {
            notification_type,
            registration_id: Uuid::nil(),
            event_id: Uuid::nil(),
            email: "runner@example.com".to_string(),
            amount_cents: 5_000,
            currency: "eur".to_string(),
            reason: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_notification_type_display() {
        assert_eq!(
            NotificationType::PaymentConfirmed.to_string(),
            "payment_confirmed"
        );
        assert_eq!(
            NotificationType::DocumentRequired.to_string(),
            "document_required"
        );
        assert_eq!(
            NotificationType::DocumentRejected.to_string(),
            "document_rejected"
        );
        assert_eq!(
            NotificationType::RegistrationApproved.to_string(),
            "registration_approved"
        );
    }

    #[test]
    fn test_notification_serialization() {
        let json = serde_json::to_string(&notification(NotificationType::DocumentRequired)).unwrap();
        assert!(json.contains(r#""type":"document_required""#));
        assert!(!json.contains("reason"));
    }

    #[tokio::test]
    async fn test_mock_notifier_send() {
        let notifier = MockRegistrationNotifier::new();
        let result = notifier
            .notify(notification(NotificationType::PaymentConfirmed))
            .await;
        assert!(matches!(result, NotificationResult::Sent));
    }

    #[tokio::test]
    async fn test_mock_notifier_failure() {
        let notifier = MockRegistrationNotifier::failing();
        let result = notifier
            .notify(notification(NotificationType::PaymentConfirmed))
            .await;
        assert!(matches!(result, NotificationResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier
            .notify(notification(NotificationType::PaymentConfirmed))
            .await;
        notifier
            .notify(notification(NotificationType::DocumentRequired))
            .await;
        assert_eq!(
            notifier.sent_types().await,
            vec![
                NotificationType::PaymentConfirmed,
                NotificationType::DocumentRequired
            ]
        );
    }
}
