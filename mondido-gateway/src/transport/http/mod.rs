//! HTTP transport implementation.
//!
//! Sends gateway requests with reqwest over rustls. Without pinning the
//! client uses reqwest's default rustls setup and the webpki root set. With
//! pinning it is built from [`pinning::client_config`], and a handshake
//! rejected by the pin is reported as
//! [`GatewayError::PinningViolation`] rather than a generic HTTP error.

use std::error::Error as StdError;

use reqwest::Client;
use rustls::CertificateError;
use tracing::{instrument, warn};

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{GatewayError, Result},
    pinning::{self, PinKind, PinningVerifier},
    transport::{HttpMethod, Transport, TransportRequest, TransportResponse},
};

const PINNING_MESSAGE_PREFIX: &str = "security problem: pinned";

/// Validates header name and value for CRLF injection prevention.
fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.contains('\r') || name.contains('\n') || name.contains('\0') {
        return Err(GatewayError::TransportError(
            "Invalid header name: control characters not allowed".to_owned(),
        ));
    }
    if value.contains('\r') || value.contains('\n') || value.contains('\0') {
        return Err(GatewayError::TransportError(
            "Invalid header value: control characters not allowed".to_owned(),
        ));
    }
    Ok(())
}

/// Finds a pinning violation anywhere in an error's source chain.
///
/// `io::Error` hides its payload from `source()`, so its inner error is
/// followed explicitly.
fn pinning_violation(error: &(dyn StdError + 'static)) -> Option<PinKind> {
    let mut current = Some(error);

    while let Some(err) = current {
        if let Some(GatewayError::PinningViolation(kind)) = err.downcast_ref::<GatewayError>() {
            return Some(*kind);
        }

        if let Some(rustls::Error::InvalidCertificate(CertificateError::Other(other))) =
            err.downcast_ref::<rustls::Error>()
            && let Some(GatewayError::PinningViolation(kind)) =
                other.0.downcast_ref::<GatewayError>()
        {
            return Some(*kind);
        }

        let message = err.to_string();
        if let Some(rest) = message.split(PINNING_MESSAGE_PREFIX).nth(1) {
            let kind =
                if rest.trim_start().starts_with("public key") { PinKind::PublicKey } else { PinKind::Certificate };
            return Some(kind);
        }

        current = match err.downcast_ref::<std::io::Error>() {
            Some(io) => io.get_ref().map(|inner| inner as &(dyn StdError + 'static)),
            None => err.source(),
        };
    }

    None
}

/// HTTP transport using reqwest.
///
/// # Examples
///
/// ```
/// use mondido_gateway::{
///     pinning::PinningVerifier,
///     transport::{HttpConfig, HttpTransport, HttpVersion, Transport},
/// };
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::with_config(&config, PinningVerifier::disabled()).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// assert!(!transport.is_pinned());
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
    pinned: bool,
}

impl HttpTransport {
    /// Creates HTTP transport with custom configuration.
    ///
    /// Installs the pinning verifier into the TLS stack when `pins` is active.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS configuration or HTTP client cannot be built.
    pub fn with_config(config: &HttpConfig, pins: PinningVerifier) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Auto => builder,
        };

        let pinned = pins.is_active();
        if pinned {
            builder = builder.use_preconfigured_tls(pinning::client_config(pins)?);
        }

        let client = builder.build().map_err(GatewayError::HttpError)?;

        Ok(Self { client, http_version: config.http_version, pinned })
    }

    /// Returns true if TLS connections are pinned.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pinned
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method, url = %request.url, pinned = self.pinned)
    )]
    async fn execute_request(&self, request: &TransportRequest) -> Result<TransportResponse> {
        for (name, value) in &request.headers {
            validate_header(name, value)?;
        }

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(TransportResponse { status, body })
    }
}

fn classify(error: reqwest::Error) -> GatewayError {
    if let Some(kind) = pinning_violation(&error) {
        warn!(pin = %kind, "TLS peer rejected by pinning");
        return GatewayError::PinningViolation(kind);
    }
    GatewayError::HttpError(error)
}

impl Transport for HttpTransport {
    async fn send<'a>(&'a self, request: &'a TransportRequest) -> Result<TransportResponse> {
        self.execute_request(request).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Auto => "http",
        }
    }
}
