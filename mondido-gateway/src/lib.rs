//! Mondido Gateway: request authentication and transport security for the
//! Mondido payment API.
//!
//! This crate covers the parts of a payment-gateway client that have to be
//! exactly right for the gateway to accept a request and for the merchant to
//! trust the answer:
//!
//! - **Integrity hashing**: the MD5 transaction hash the gateway recomputes
//! - **Field encryption**: RSA PKCS#1 v1.5 encryption of card fields
//! - **TLS pinning**: certificate, fingerprint or public-key pins enforced in rustls
//! - **Response normalization**: one canonical result for approvals, declines,
//!   error envelopes and garbage bodies
//!
//! # Architecture
//!
//! ```text
//! operation (purchase, refund, ...)
//!     │ OutgoingRequest
//!     ▼
//! HashSigner ──► FieldEncryptor ──► Transport (reqwest + pinned rustls)
//!                                        │ status + body
//!                                        ▼
//!                                 ResponseNormalizer ──► NormalizedResult
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mondido_gateway::{
//!     MondidoClient,
//!     config::Credentials,
//!     operations::{CreditCard, PaymentInstrument, TransactionOptions},
//! };
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> mondido_gateway::error::Result<()> {
//! let credentials = Credentials::new("123", "api-token", "hash-secret")
//!     .with_pinned_certificate_fingerprint("62:aa:79:67:b6:55:5b:b5:c6:a7:79:ab:da:f9:de:73:37:93:a8:ab:c4:7f:44:ce:e6:14:bb:4c:18:04:62:7c");
//! let client = MondidoClient::new(credentials)?.with_test_mode(true);
//!
//! let card = PaymentInstrument::Card(
//!     CreditCard::new("4111111111111111", 12, 2030).with_holder("Anna Berg").with_cvv("200"),
//! );
//! let result = client
//!     .purchase(Decimal::new(1000, 2), "SEK", &card, &TransactionOptions::new("order-1"))
//!     .await?;
//!
//! if result.success() {
//!     println!("approved: {}", result.authorization().unwrap_or_default());
//! } else {
//!     println!("declined: {} ({:?})", result.message(), result.error_code());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`signing`]: transaction integrity hash
//! - [`encryption`]: field-level RSA encryption
//! - [`pinning`]: pin matching and the rustls verifier
//! - [`response`]: response parsing and normalization
//! - [`client`]: the request pipeline
//! - [`operations`]: purchase, authorize, refund, store, unstore
//! - [`transport`]: transport trait and reqwest implementation
//! - [`security`]: audit events and transcript scrubbing
//! - [`config`]: credentials and TOML configuration
//! - [`error`]: error types
//!
//! # Error Handling
//!
//! Gateway declines and network failures are *results*, not errors: they come
//! back as an unsuccessful [`NormalizedResult`](response::NormalizedResult).
//! [`GatewayError`] is reserved for problems the caller must act on:
//!
//! ```rust,no_run
//! use mondido_gateway::{GatewayError, MondidoClient, config::Credentials};
//!
//! # async fn example() {
//! let client = MondidoClient::new(Credentials::new("123", "token", "secret")).unwrap();
//!
//! match client.unstore("42").await {
//!     Ok(result) => println!("{}", result.message()),
//!     Err(GatewayError::PinningViolation(kind)) => eprintln!("possible interception ({kind})"),
//!     Err(e) => eprintln!("not sent: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and rsa"
)]

pub mod client;
pub mod config;
pub mod encryption;
pub mod error;
pub mod operations;
pub mod pinning;
pub mod request;
pub mod response;
pub mod security;
pub mod signing;
pub mod transport;

pub use client::MondidoClient;
pub use error::{GatewayError, Result};
