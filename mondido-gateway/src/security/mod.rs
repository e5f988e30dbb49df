//! Log safety for gateway traffic.
//!
//! # Audit Logging
//!
//! Every gateway call emits structured events on the `audit` tracing target,
//! correlated by a per-call UUID:
//!
//! ```rust
//! use mondido_gateway::security::audit::{AuditEvent, AuditEventType};
//! use uuid::Uuid;
//!
//! let event = AuditEvent::new(AuditEventType::TransactionDeclined, "123", Uuid::new_v4())
//!     .with_operation("purchase")
//!     .with_status(422);
//!
//! mondido_gateway::security::audit::audit_log(&event);
//! ```
//!
//! # Scrubbing
//!
//! [`scrub`] strips the Basic-auth credential and card data from a wire
//! transcript. The client passes every logged exchange through it.

pub mod audit;
mod scrub;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log};
pub use scrub::{FILTERED, SCRUBBED_FIELDS, scrub};
