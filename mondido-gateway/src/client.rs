//! Request pipeline.
//!
//! [`MondidoClient`] runs every gateway call through the same stages:
//!
//! ```text
//! build -> sign -> encrypt (optional) -> transmit -> parse -> normalize
//! ```
//!
//! Request building and signing live with the individual
//! [operations](crate::operations); this module owns the rest. Transport
//! failures and non-2xx answers still produce a [`NormalizedResult`]; only
//! pinning violations and local validation or crypto errors surface as
//! [`GatewayError`].

use std::{sync::Arc, time::Instant};

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{Credentials, GatewayConfig, LIVE_URL},
    encryption::FieldEncryptor,
    error::{GatewayError, Result},
    pinning::PinningVerifier,
    request::OutgoingRequest,
    response::{self, NormalizedResult},
    security::{
        audit::{AuditEvent, AuditEventType, audit_log},
        scrub,
    },
    signing::HashSigner,
    transport::{HttpConfig, HttpMethod, HttpTransport, Transport, TransportRequest},
};

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("Mondido RustBindings/", env!("CARGO_PKG_VERSION"));

/// Payment gateway client.
///
/// Holds the immutable credentials, the signer, the optional field encryptor
/// and a transport. Cheap to share behind an `Arc`; every call builds its own
/// request.
///
/// # Examples
///
/// ```rust,no_run
/// use mondido_gateway::{
///     MondidoClient,
///     config::Credentials,
///     operations::{CreditCard, PaymentInstrument, TransactionOptions},
/// };
/// use rust_decimal::Decimal;
///
/// # async fn example() -> mondido_gateway::error::Result<()> {
/// let client = MondidoClient::new(Credentials::new("123", "api-token", "hash-secret"))?
///     .with_test_mode(true);
///
/// let card = PaymentInstrument::Card(CreditCard::new("4111111111111111", 12, 2030).with_cvv("200"));
/// let options = TransactionOptions::new("order-1");
///
/// let result = client.purchase(Decimal::new(1000, 2), "SEK", &card, &options).await?;
/// println!("{}: {}", result.success(), result.message());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MondidoClient<T: Transport = HttpTransport> {
    credentials: Arc<Credentials>,
    base_url: String,
    test: bool,
    signer: HashSigner,
    encryptor: Option<FieldEncryptor>,
    transport: T,
}

impl MondidoClient<HttpTransport> {
    /// Display name of the gateway.
    pub const DISPLAY_NAME: &'static str = "Mondido";
    /// Gateway homepage.
    pub const HOMEPAGE_URL: &'static str = "https://www.mondido.com/";
    /// Production API root.
    pub const LIVE_URL: &'static str = LIVE_URL;
    /// Currency used when an operation has none of its own.
    pub const DEFAULT_CURRENCY: &'static str = "USD";
    /// ISO country codes the gateway serves.
    pub const SUPPORTED_COUNTRIES: &'static [&'static str] = &["SE"];
    /// Card brands the gateway accepts.
    pub const SUPPORTED_CARD_TYPES: &'static [&'static str] = &[
        "visa",
        "master",
        "discover",
        "american_express",
        "diners_club",
        "jcb",
        "switch",
        "solo",
        "maestro",
        "laser",
    ];

    /// Creates a client for the live API with default transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidKeyMaterial`] if the public key or any
    /// pinned material is malformed.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_http_config(credentials, &HttpConfig::default())
    }

    /// Creates a client for the live API with custom transport settings.
    ///
    /// # Errors
    ///
    /// Returns error if credential material is malformed, the transport
    /// settings are out of range or the HTTP client cannot be built.
    pub fn with_http_config(credentials: Credentials, http: &HttpConfig) -> Result<Self> {
        http.validate()?;
        let pins = PinningVerifier::from_credentials(&credentials)?;
        let transport = HttpTransport::with_config(http, pins)?;
        Self::with_transport(credentials, transport)
    }

    /// Creates a client from a validated configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, a secret cannot be
    /// resolved or credential material is malformed.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::with_http_config(config.credentials()?, &config.transport)?;
        Ok(client.with_base_url(&config.base_url).with_test_mode(config.test))
    }
}

impl<T: Transport> MondidoClient<T> {
    /// Creates a client over a caller-supplied transport.
    ///
    /// Pinning is the transport's concern; only the field-encryption key is
    /// parsed here.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidKeyMaterial`] if the public key is malformed.
    pub fn with_transport(credentials: Credentials, transport: T) -> Result<Self> {
        let encryptor = credentials.public_key_pem().map(FieldEncryptor::from_pem).transpose()?;
        let signer = HashSigner::new(&credentials);

        Ok(Self {
            credentials: Arc::new(credentials),
            base_url: LIVE_URL.to_owned(),
            test: false,
            signer,
            encryptor,
            transport,
        })
    }

    /// Overrides the API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Marks subsequent transactions as test transactions.
    #[must_use]
    pub const fn with_test_mode(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// Client credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns true in test mode.
    #[must_use]
    pub const fn is_test(&self) -> bool {
        self.test
    }

    /// Returns true if sensitive fields are encrypted.
    #[must_use]
    pub const fn encrypts_fields(&self) -> bool {
        self.encryptor.is_some()
    }

    pub(crate) const fn signer(&self) -> &HashSigner {
        &self.signer
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Value of the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let pair = format!("{}:{}", self.credentials.merchant_id(), self.credentials.api_token());
        format!("Basic {}", STANDARD.encode(pair))
    }

    /// Sends one request through the pipeline and normalizes the answer.
    ///
    /// `request` must already be signed. Declared fields are encrypted here
    /// when a public key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PinningViolation`] if the TLS peer fails pinning,
    /// or [`GatewayError::CryptoError`] if a declared field cannot be encrypted.
    /// Every other failure is reported as an unsuccessful [`NormalizedResult`].
    #[instrument(
        skip(self, request),
        fields(merchant_id = %self.credentials.merchant_id(), request_id = tracing::field::Empty)
    )]
    pub async fn execute(
        &self,
        operation: &str,
        method: HttpMethod,
        path: &str,
        request: Option<OutgoingRequest>,
    ) -> Result<NormalizedResult> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let payment_ref = request.as_ref().and_then(|r| r.text("payment_ref")).map(str::to_owned);
        let event = |event_type| {
            let event = AuditEvent::new(event_type, self.credentials.merchant_id(), request_id)
                .with_operation(operation);
            match &payment_ref {
                Some(payment_ref) => event.with_payment_ref(payment_ref.as_str()),
                None => event,
            }
        };

        let body = match request {
            Some(mut request) => {
                if let Some(encryptor) = &self.encryptor {
                    encryptor.encrypt(&mut request)?;
                }
                Some(request.encode())
            }
            None => None,
        };

        let outgoing = TransportRequest {
            method,
            url: self.url(path),
            body,
            headers: vec![
                ("Authorization".to_owned(), self.authorization_header()),
                ("User-Agent".to_owned(), USER_AGENT.to_owned()),
            ],
        };

        debug!(
            transcript = %scrub(&transcript(&outgoing)),
            protocol = self.transport.protocol_name(),
            "sending gateway request"
        );
        audit_log(&event(AuditEventType::TransactionAttempted));

        let started = Instant::now();
        let outcome = self.transport.send(&outgoing).await;
        let elapsed = started.elapsed();

        let response = match outcome {
            Ok(response) => response,
            Err(error @ GatewayError::PinningViolation(_)) => {
                warn!(error = %error, "aborting gateway call");
                audit_log(
                    &event(AuditEventType::PinningViolation)
                        .with_error(error.to_string())
                        .with_duration(elapsed),
                );
                return Err(error);
            }
            Err(error) => {
                let message = scrub(&error.to_string());
                warn!(error = %message, "gateway request failed");
                audit_log(
                    &event(AuditEventType::TransportFailed)
                        .with_error(message.as_str())
                        .with_duration(elapsed),
                );
                return Ok(response::normalize(&message));
            }
        };

        let body = response.body_text();
        debug!(status = response.status, body = %scrub(&body), "gateway response received");

        let result = response::normalize(&body);
        let event_type = if result.success() {
            AuditEventType::TransactionApproved
        } else {
            AuditEventType::TransactionDeclined
        };
        audit_log(&event(event_type).with_status(response.status).with_duration(elapsed));

        Ok(result)
    }
}

fn transcript(request: &TransportRequest) -> String {
    let mut text = format!("{} {}\n", request.method, request.url);
    for (name, value) in &request.headers {
        text.push_str(&format!("{name}: {value}\n"));
    }
    if let Some(body) = &request.body {
        text.push_str(body);
    }
    text
}
