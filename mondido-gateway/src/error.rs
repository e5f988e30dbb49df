//! Error types for the Mondido gateway client.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Validation Errors** ([`GatewayError::MissingField`], [`GatewayError::InvalidAmount`],
//!   [`GatewayError::InvalidConfig`]):
//!   required configuration or request fields are missing, raised before any network activity
//! - **Credential Errors** ([`GatewayError::InvalidKeyMaterial`]): malformed public key or
//!   pinned material, raised when the client is constructed
//! - **Security Errors** ([`GatewayError::PinningViolation`]): the TLS peer did not match the
//!   pinned certificate or public key
//! - **Network Errors** ([`GatewayError::HttpError`], [`GatewayError::TransportError`]):
//!   only visible at the transport boundary, the client folds them into a failed
//!   [`NormalizedResult`](crate::response::NormalizedResult)
//!
//! # Examples
//!
//! ```
//! use mondido_gateway::error::{GatewayError, Result};
//!
//! fn require_order_id(order_id: Option<&str>) -> Result<&str> {
//!     order_id.ok_or_else(|| GatewayError::MissingField("order_id".to_owned()))
//! }
//!
//! assert!(require_order_id(None).is_err());
//! ```

use thiserror::Error;

use crate::pinning::PinKind;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur in the gateway client.
///
/// Only validation errors, credential errors and pinning violations prevent a
/// [`NormalizedResult`](crate::response::NormalizedResult) from being produced.
/// Everything else that goes wrong on the wire is reported as a failed result.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required option or request field was not supplied.
    ///
    /// # Recovery
    ///
    /// Supply the named field and retry. No request was sent.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A request amount cannot be sent as given.
    ///
    /// The gateway takes exactly two fraction digits; rounding would charge
    /// a different amount from the one requested. No request was sent.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The gateway configuration is invalid.
    ///
    /// Common causes include a non-HTTPS base URL, a loopback base URL, or
    /// transport timeouts outside their allowed ranges.
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),

    /// Credential material supplied at construction could not be parsed.
    ///
    /// Covers the RSA public key used for field encryption and all three
    /// kinds of pinned material.
    #[error("Invalid credential material: {0}")]
    InvalidKeyMaterial(String),

    /// A cryptographic operation failed at request time.
    ///
    /// The usual cause is a field value longer than the RSA key can encrypt
    /// in a single PKCS#1 v1.5 block.
    #[error("Cryptographic operation failed: {0}")]
    CryptoError(String),

    /// The TLS peer did not match the pinned material.
    ///
    /// This is fatal and must never be retried: the connection may be
    /// intercepted by a party holding a certificate the local trust store accepts.
    #[error("security problem: pinned {0} doesn't match")]
    PinningViolation(PinKind),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, refused connections, DNS and TLS failures.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport-level failure that is not a [`reqwest::Error`].
    #[error("Transport failure: {0}")]
    TransportError(String),
}

impl GatewayError {
    /// Returns true if the error must stop the caller instead of being normalized.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::PinningViolation(_))
    }

    /// Returns true for local validation failures raised before any network activity.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::InvalidAmount(_) | Self::InvalidConfig(_))
    }
}
