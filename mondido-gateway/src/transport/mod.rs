//! Transport abstraction.
//!
//! The client only needs "send a request, get status and body back". The
//! [`Transport`] trait captures that so the request pipeline can be driven by
//! the reqwest-backed [`HttpTransport`] in production and by scripted
//! transports in tests.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mondido_gateway::{
//!     pinning::PinningVerifier,
//!     transport::{HttpConfig, HttpMethod, HttpTransport, Transport, TransportRequest},
//! };
//!
//! # async fn example() -> mondido_gateway::error::Result<()> {
//! let transport = HttpTransport::with_config(&HttpConfig::default(), PinningVerifier::disabled())?;
//!
//! let request = TransportRequest {
//!     method: HttpMethod::Post,
//!     url: "https://api.mondido.com/v1/transactions".to_owned(),
//!     body: Some("amount=10.00".to_owned()),
//!     headers: vec![("Authorization".to_owned(), "Basic MTIzOnRva2Vu".to_owned())],
//! };
//!
//! let response = transport.send(&request).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::fmt;
#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use crate::error::Result;

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// HTTP verb of a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request.
#[derive(Clone)]
pub struct TransportRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Form-encoded body, if any.
    pub body: Option<String>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body_len", &self.body.as_ref().map_or(0, String::len))
            .field("headers", &header_names)
            .finish()
    }
}

/// Response from the transport.
///
/// Non-2xx statuses are responses, not errors; the body is normalized either way.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Body decoded as UTF-8, invalid sequences replaced.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends gateway requests.
///
/// Implementations must return [`GatewayError::PinningViolation`](crate::error::GatewayError::PinningViolation)
/// when the peer fails pinning, so the client can tell it apart from
/// ordinary network failures.
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns error if the request could not be delivered or no response was read.
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}
