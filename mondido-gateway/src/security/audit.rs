//! Audit logging for gateway calls.
//!
//! Provides structured audit events on the `audit` tracing target with
//! unique correlation IDs, so every transaction attempt can be matched to
//! its outcome.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scrub::scrub;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A request is about to be sent.
    TransactionAttempted,
    /// The gateway approved the transaction.
    TransactionApproved,
    /// The gateway declined the transaction or answered with an error.
    TransactionDeclined,
    /// The request never produced a gateway response.
    TransportFailed,
    /// The TLS peer did not match the pinned material.
    PinningViolation,
}

/// Details for audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditDetails {
    /// Operation name, e.g. `purchase`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Merchant order reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    /// HTTP status of the gateway response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Error message, scrubbed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the call in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use mondido_gateway::security::audit::{AuditEvent, AuditEventType, audit_log};
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::TransactionAttempted, "123", Uuid::new_v4())
///     .with_operation("purchase")
///     .with_payment_ref("order-1");
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event timestamp.
    pub timestamp: SystemTime,
    /// What happened.
    pub event_type: AuditEventType,
    /// Merchant the call was made for.
    pub merchant_id: String,
    /// Correlation ID shared by all events of one call.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event.
    #[must_use]
    pub fn new(event_type: AuditEventType, merchant_id: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            merchant_id: merchant_id.into(),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Adds the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.details.operation = Some(operation.into());
        self
    }

    /// Adds the merchant order reference.
    #[must_use]
    pub fn with_payment_ref(mut self, payment_ref: impl Into<String>) -> Self {
        self.details.payment_ref = Some(payment_ref.into());
        self
    }

    /// Adds the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.details.status = Some(status);
        self
    }

    /// Adds an error message.
    ///
    /// Credentials and card data are scrubbed from the message.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::security::audit::{AuditEvent, AuditEventType};
    /// use uuid::Uuid;
    ///
    /// let event = AuditEvent::new(AuditEventType::TransportFailed, "123", Uuid::new_v4())
    ///     .with_error("timeout sending card_number=4111111111111111");
    /// assert_eq!(
    ///     event.details.error.as_deref(),
    ///     Some("timeout sending card_number=[FILTERED]")
    /// );
    /// ```
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(scrub(&error.into()));
        self
    }

    /// Adds the call duration.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duration in ms fits u64 for practical values"
    )]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Logs audit event to tracing with target "audit".
///
/// Audit logs use a separate target so they can be filtered and routed on
/// their own, e.g. `RUST_LOG=audit=info`.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        merchant_id = %event.merchant_id,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}
