//! TLS certificate and public-key pinning.
//!
//! Pinning restricts which server the client will talk to beyond what the
//! platform trust store allows. Three kinds of pin are supported, checked
//! against the leaf certificate only:
//!
//! 1. **Certificate**: the leaf DER must be byte-identical to the pinned certificate.
//! 2. **Fingerprint**: the SHA-256 of the leaf DER must equal the pinned fingerprint.
//! 3. **Public key**: the leaf's SubjectPublicKeyInfo must use the same algorithm
//!    and encode to the same bytes as the pinned key.
//!
//! When several pins are configured only the first in that order is consulted,
//! but all of them must parse.
//!
//! [`PinningVerifier`] is the pure decision logic. [`PinnedServerVerifier`] plugs
//! it into rustls, and [`client_config`] builds a [`rustls::ClientConfig`] that
//! uses it.

use std::{fmt, sync::Arc};

use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, OtherError, RootCertStore,
    SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject},
};
use sha2::{Digest, Sha256};
use x509_cert::{
    Certificate,
    der::{Decode, DecodePem, Encode},
    spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned},
};

use crate::{
    config::Credentials,
    error::{GatewayError, Result},
};

/// Which pinned material a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// Pinned certificate or certificate fingerprint.
    Certificate,
    /// Pinned public key.
    PublicKey,
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certificate => f.write_str("certificate"),
            Self::PublicKey => f.write_str("public key"),
        }
    }
}

/// Outcome of checking a leaf certificate against the active pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCheck {
    /// No pin is configured; the platform verdict stands.
    NotConfigured,
    /// The leaf matches the pin.
    Matched,
    /// The leaf does not match the pin.
    Mismatch(PinKind),
}

#[derive(Clone, PartialEq, Eq)]
enum Pin {
    Certificate(Vec<u8>),
    Fingerprint([u8; 32]),
    PublicKey { algorithm: ObjectIdentifier, spki_der: Vec<u8> },
}

/// Pure pin-matching logic, parsed once from credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct PinningVerifier {
    active: Option<Pin>,
}

impl fmt::Debug for PinningVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.active {
            None => "none",
            Some(Pin::Certificate(_)) => "certificate",
            Some(Pin::Fingerprint(_)) => "fingerprint",
            Some(Pin::PublicKey { .. }) => "public_key",
        };
        f.debug_struct("PinningVerifier").field("mode", &mode).finish()
    }
}

impl PinningVerifier {
    /// Parses every configured pin and keeps the one with highest precedence.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidKeyMaterial`] if any configured pin is malformed.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let certificate = credentials.pinned_certificate().map(parse_certificate).transpose()?;
        let fingerprint =
            credentials.pinned_certificate_fingerprint().map(parse_fingerprint).transpose()?;
        let public_key = credentials.pinned_public_key().map(parse_public_key).transpose()?;

        Ok(Self { active: certificate.or(fingerprint).or(public_key) })
    }

    /// Verifier that never pins.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { active: None }
    }

    /// Returns true if a pin is configured.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Checks a leaf certificate (DER) against the active pin.
    #[must_use]
    pub fn check_leaf(&self, leaf_der: &[u8]) -> PinCheck {
        let Some(pin) = &self.active else {
            return PinCheck::NotConfigured;
        };

        let matched = match pin {
            Pin::Certificate(pinned) => pinned.as_slice() == leaf_der,
            Pin::Fingerprint(pinned) => Sha256::digest(leaf_der).as_slice() == pinned.as_slice(),
            Pin::PublicKey { algorithm, spki_der } => {
                leaf_public_key(leaf_der).is_some_and(|(leaf_algorithm, leaf_spki)| {
                    leaf_algorithm == *algorithm && leaf_spki == *spki_der
                })
            }
        };

        if matched { PinCheck::Matched } else { PinCheck::Mismatch(self.kind()) }
    }

    /// Per-certificate verification callback.
    ///
    /// `depth` is the certificate's position in the presented chain, 0 being
    /// the leaf. Only the leaf is pinned; every other certificate keeps
    /// `preverify_ok`. A pin only narrows trust: a matching leaf is accepted
    /// when `preverify_ok` is true and a mismatching one never is.
    ///
    /// [`PinnedServerVerifier`] passes `preverify_ok = true` for a pinned
    /// self-signed leaf, i.e. when the platform's only complaint is an unknown
    /// issuer and no intermediates were presented.
    #[must_use]
    pub fn verify(&self, preverify_ok: bool, depth: usize, cert_der: &[u8]) -> bool {
        if depth != 0 {
            return preverify_ok;
        }
        match self.check_leaf(cert_der) {
            PinCheck::NotConfigured | PinCheck::Matched => preverify_ok,
            PinCheck::Mismatch(_) => false,
        }
    }

    fn kind(&self) -> PinKind {
        match self.active {
            Some(Pin::PublicKey { .. }) => PinKind::PublicKey,
            _ => PinKind::Certificate,
        }
    }
}

fn parse_certificate(pem: &str) -> Result<Pin> {
    let der = CertificateDer::from_pem_slice(pem.trim().as_bytes()).map_err(|e| {
        GatewayError::InvalidKeyMaterial(format!("invalid pinned certificate: {e}"))
    })?;
    Certificate::from_der(der.as_ref()).map_err(|e| {
        GatewayError::InvalidKeyMaterial(format!("invalid pinned certificate: {e}"))
    })?;
    Ok(Pin::Certificate(der.as_ref().to_vec()))
}

fn parse_fingerprint(fingerprint: &str) -> Result<Pin> {
    let normalized: String = fingerprint
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    let bytes = hex::decode(&normalized).map_err(|e| {
        GatewayError::InvalidKeyMaterial(format!("invalid pinned certificate fingerprint: {e}"))
    })?;
    let digest: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        GatewayError::InvalidKeyMaterial(format!(
            "pinned certificate fingerprint must be a SHA-256 digest, got {} bytes",
            bytes.len()
        ))
    })?;
    Ok(Pin::Fingerprint(digest))
}

fn parse_public_key(pem: &str) -> Result<Pin> {
    let spki = SubjectPublicKeyInfoOwned::from_pem(pem.trim())
        .map_err(|e| GatewayError::InvalidKeyMaterial(format!("invalid pinned public key: {e}")))?;
    let spki_der = spki
        .to_der()
        .map_err(|e| GatewayError::InvalidKeyMaterial(format!("invalid pinned public key: {e}")))?;
    Ok(Pin::PublicKey { algorithm: spki.algorithm.oid, spki_der })
}

fn leaf_public_key(leaf_der: &[u8]) -> Option<(ObjectIdentifier, Vec<u8>)> {
    let certificate = Certificate::from_der(leaf_der).ok()?;
    let spki = certificate.tbs_certificate.subject_public_key_info;
    let der = spki.to_der().ok()?;
    Some((spki.algorithm.oid, der))
}

/// rustls server certificate verifier enforcing a [`PinningVerifier`].
///
/// Platform verification runs first through a WebPKI verifier over the
/// Mozilla root set. Without a pin its verdict is final. With a pin, a leaf
/// mismatch is rejected with [`GatewayError::PinningViolation`] carried as the
/// rustls error source, and a matching leaf is additionally accepted when the
/// only platform complaint is an unknown issuer for a chain of one.
#[derive(Debug)]
pub struct PinnedServerVerifier {
    pins: PinningVerifier,
    inner: Arc<WebPkiServerVerifier>,
}

impl PinnedServerVerifier {
    /// Creates a verifier backed by the webpki root set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TransportError`] if the platform verifier cannot be built.
    pub fn new(pins: PinningVerifier, provider: Arc<CryptoProvider>) -> Result<Self> {
        let roots = RootCertStore { roots: webpki_roots::TLS_SERVER_ROOTS.to_vec() };
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| GatewayError::TransportError(format!("cannot build TLS verifier: {e}")))?;
        Ok(Self { pins, inner })
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let platform =
            self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        let lone_unknown_issuer = intermediates.is_empty()
            && matches!(
                platform,
                Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
            );
        let preverify_ok = platform.is_ok() || (self.pins.is_active() && lone_unknown_issuer);

        if self.pins.verify(preverify_ok, 0, end_entity.as_ref()) {
            return Ok(ServerCertVerified::assertion());
        }
        match self.pins.check_leaf(end_entity.as_ref()) {
            PinCheck::Mismatch(kind) => Err(rustls::Error::InvalidCertificate(
                CertificateError::Other(OtherError(Arc::new(GatewayError::PinningViolation(kind)))),
            )),
            PinCheck::NotConfigured | PinCheck::Matched => platform,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Builds a rustls client configuration that enforces `pins`.
///
/// # Errors
///
/// Returns [`GatewayError::TransportError`] if the TLS configuration cannot be built.
pub fn client_config(pins: PinningVerifier) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinnedServerVerifier::new(pins, Arc::clone(&provider))?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::TransportError(format!("invalid TLS protocol versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}
