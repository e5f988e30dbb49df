//! Gateway configuration types.
//!
//! [`Credentials`] is the immutable identity a client is built from.
//! [`GatewayConfig`] is its TOML-deserializable wrapper, adding the base URL,
//! test mode and transport settings.
//!
//! ```toml
//! base_url = "https://api.mondido.com/v1/"
//! test = true
//!
//! [credentials]
//! merchant_id = "123"
//! api_token_env = "MONDIDO_API_TOKEN"
//! hash_secret_env = "MONDIDO_HASH_SECRET"
//! pinned_certificate_fingerprint = "62:aa:79:..."
//!
//! [transport]
//! timeout_secs = 30
//! ```

use std::{fmt, path::Path};

use serde::Deserialize;
use url::Url;

use crate::{
    error::{GatewayError, Result},
    transport::HttpConfig,
};

/// Production API root.
pub const LIVE_URL: &str = "https://api.mondido.com/v1/";

/// Merchant credentials and optional key material.
///
/// Supplied once when a client is constructed and never mutated afterwards.
/// Several pinning options may be set at the same time; the verifier consults
/// only the first configured one in the order certificate, fingerprint,
/// public key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    merchant_id: String,
    api_token: String,
    hash_secret: String,
    public_key_pem: Option<String>,
    pinned_certificate: Option<String>,
    pinned_certificate_fingerprint: Option<String>,
    pinned_public_key: Option<String>,
}

impl Credentials {
    /// Creates credentials without field encryption or pinning.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::config::Credentials;
    ///
    /// let credentials = Credentials::new("123", "api-token", "hash-secret");
    /// assert_eq!(credentials.merchant_id(), "123");
    /// assert!(!credentials.has_pinning());
    /// ```
    #[must_use]
    pub fn new(
        merchant_id: impl Into<String>,
        api_token: impl Into<String>,
        hash_secret: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            api_token: api_token.into(),
            hash_secret: hash_secret.into(),
            public_key_pem: None,
            pinned_certificate: None,
            pinned_certificate_fingerprint: None,
            pinned_public_key: None,
        }
    }

    /// Sets the RSA public key (PEM) used to encrypt sensitive fields.
    #[must_use]
    pub fn with_public_key(mut self, pem: impl Into<String>) -> Self {
        self.public_key_pem = Some(pem.into());
        self
    }

    /// Pins the server's leaf certificate (PEM).
    #[must_use]
    pub fn with_pinned_certificate(mut self, pem: impl Into<String>) -> Self {
        self.pinned_certificate = Some(pem.into());
        self
    }

    /// Pins the SHA-256 fingerprint of the server's leaf certificate (hex, colons optional).
    #[must_use]
    pub fn with_pinned_certificate_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.pinned_certificate_fingerprint = Some(fingerprint.into());
        self
    }

    /// Pins the server's public key (PEM `PUBLIC KEY` block).
    #[must_use]
    pub fn with_pinned_public_key(mut self, pem: impl Into<String>) -> Self {
        self.pinned_public_key = Some(pem.into());
        self
    }

    /// Merchant identifier.
    #[must_use]
    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// API token used for Basic authentication.
    #[must_use]
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Shared secret mixed into the integrity hash.
    #[must_use]
    pub fn hash_secret(&self) -> &str {
        &self.hash_secret
    }

    /// RSA public key for field encryption, if configured.
    #[must_use]
    pub fn public_key_pem(&self) -> Option<&str> {
        non_blank(self.public_key_pem.as_deref())
    }

    /// Pinned leaf certificate, if configured.
    #[must_use]
    pub fn pinned_certificate(&self) -> Option<&str> {
        non_blank(self.pinned_certificate.as_deref())
    }

    /// Pinned leaf certificate fingerprint, if configured.
    #[must_use]
    pub fn pinned_certificate_fingerprint(&self) -> Option<&str> {
        non_blank(self.pinned_certificate_fingerprint.as_deref())
    }

    /// Pinned public key, if configured.
    #[must_use]
    pub fn pinned_public_key(&self) -> Option<&str> {
        non_blank(self.pinned_public_key.as_deref())
    }

    /// Returns true if any pinning option is configured.
    #[must_use]
    pub fn has_pinning(&self) -> bool {
        self.pinned_certificate().is_some()
            || self.pinned_certificate_fingerprint().is_some()
            || self.pinned_public_key().is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_id", &self.merchant_id)
            .field("api_token", &"[FILTERED]")
            .field("hash_secret", &"[FILTERED]")
            .field("public_key", &self.public_key_pem().is_some())
            .field("pinned_certificate", &self.pinned_certificate().is_some())
            .field("pinned_certificate_fingerprint", &self.pinned_certificate_fingerprint().is_some())
            .field("pinned_public_key", &self.pinned_public_key().is_some())
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Root gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// API root; every operation path is appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Marks transactions as test transactions.
    #[serde(default)]
    pub test: bool,

    /// Merchant credentials.
    pub credentials: CredentialsConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub transport: HttpConfig,
}

fn default_base_url() -> String {
    LIVE_URL.to_owned()
}

impl GatewayConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] if parsing or validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::config::GatewayConfig;
    ///
    /// let config = GatewayConfig::from_toml(
    ///     r#"
    ///     test = true
    ///
    ///     [credentials]
    ///     merchant_id = "123"
    ///     api_token = "token"
    ///     hash_secret = "secret"
    ///     "#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(config.base_url, "https://api.mondido.com/v1/");
    /// assert!(config.test);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| GatewayError::InvalidConfig(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::InvalidConfig(format!("cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Validates the configuration.
    ///
    /// Checks that the base URL is HTTPS and not a loopback address, that the
    /// transport limits are in range, and that credential sources are well formed.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<()> {
        self.validate_base_url()?;
        self.transport.validate()?;
        self.credentials.validate()?;
        Ok(())
    }

    fn validate_base_url(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            GatewayError::InvalidConfig(format!("invalid base_url '{}': {e}", self.base_url))
        })?;

        if url.scheme() != "https" {
            return Err(GatewayError::InvalidConfig(format!(
                "base_url must use HTTPS, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str() {
            let host_lower = host.to_lowercase();
            if host_lower == "localhost"
                || host_lower.starts_with("127.")
                || host_lower == "::1"
                || host_lower == "[::1]"
            {
                return Err(GatewayError::InvalidConfig(format!(
                    "base_url must not be localhost or loopback: {host}"
                )));
            }
        }

        Ok(())
    }

    /// Resolves the credential section into [`Credentials`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingField`] if a secret is neither given inline
    /// nor present in its environment variable.
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials.resolve()
    }
}

/// Credential section of [`GatewayConfig`].
///
/// Secrets may be given inline or through the name of an environment variable
/// holding them. Inline values win when both are present.
#[derive(Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Merchant identifier.
    pub merchant_id: String,
    /// Inline API token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Environment variable holding the API token.
    #[serde(default)]
    pub api_token_env: Option<String>,
    /// Inline hash secret.
    #[serde(default)]
    pub hash_secret: Option<String>,
    /// Environment variable holding the hash secret.
    #[serde(default)]
    pub hash_secret_env: Option<String>,
    /// RSA public key (PEM) for field encryption.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Pinned leaf certificate (PEM).
    #[serde(default)]
    pub pinned_certificate: Option<String>,
    /// Pinned SHA-256 leaf certificate fingerprint.
    #[serde(default)]
    pub pinned_certificate_fingerprint: Option<String>,
    /// Pinned public key (PEM).
    #[serde(default)]
    pub pinned_public_key: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("merchant_id", &self.merchant_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "[FILTERED]"))
            .field("api_token_env", &self.api_token_env)
            .field("hash_secret", &self.hash_secret.as_ref().map(|_| "[FILTERED]"))
            .field("hash_secret_env", &self.hash_secret_env)
            .finish_non_exhaustive()
    }
}

impl CredentialsConfig {
    /// Validates environment variable names.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] for a malformed variable name.
    pub fn validate(&self) -> Result<()> {
        for name in [&self.api_token_env, &self.hash_secret_env].into_iter().flatten() {
            validate_env_var_name(name)?;
        }
        Ok(())
    }

    fn resolve(&self) -> Result<Credentials> {
        let api_token = resolve_secret("api_token", self.api_token.as_deref(), self.api_token_env.as_deref())?;
        let hash_secret =
            resolve_secret("hash_secret", self.hash_secret.as_deref(), self.hash_secret_env.as_deref())?;

        Ok(Credentials {
            merchant_id: self.merchant_id.clone(),
            api_token,
            hash_secret,
            public_key_pem: self.public_key.clone(),
            pinned_certificate: self.pinned_certificate.clone(),
            pinned_certificate_fingerprint: self.pinned_certificate_fingerprint.clone(),
            pinned_public_key: self.pinned_public_key.clone(),
        })
    }
}

fn resolve_secret(field: &str, inline: Option<&str>, env_var: Option<&str>) -> Result<String> {
    if let Some(value) = inline {
        return Ok(value.to_owned());
    }
    if let Some(name) = env_var {
        return std::env::var(name).map_err(|_| {
            GatewayError::MissingField(format!("{field} (environment variable {name} is not set)"))
        });
    }
    Err(GatewayError::MissingField(field.to_owned()))
}

fn validate_env_var_name(name: &str) -> Result<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(GatewayError::InvalidConfig(
            "environment variable name cannot be empty".to_owned(),
        ));
    };

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(GatewayError::InvalidConfig(format!(
            "environment variable name must start with letter or underscore: {name}"
        )));
    }

    if let Some(ch) = name.chars().find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
        return Err(GatewayError::InvalidConfig(format!(
            "environment variable name contains invalid character '{ch}': {name}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [credentials]
        merchant_id = "123"
        api_token = "token"
        hash_secret = "secret"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = GatewayConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.base_url, LIVE_URL);
        assert!(!config.test);
        assert_eq!(config.transport.timeout_secs, 30);

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.merchant_id(), "123");
        assert_eq!(credentials.api_token(), "token");
        assert_eq!(credentials.hash_secret(), "secret");
        assert!(credentials.public_key_pem().is_none());
    }

    #[test]
    fn test_rejects_http_base_url() {
        let toml = format!("base_url = \"http://api.mondido.com/v1/\"\n{MINIMAL}");
        let Err(GatewayError::InvalidConfig(msg)) = GatewayConfig::from_toml(&toml) else {
            panic!("expected InvalidConfig");
        };
        assert!(msg.contains("HTTPS"));
    }

    #[test]
    fn test_rejects_loopback_base_url() {
        for url in ["https://localhost/v1/", "https://127.0.0.1/v1/", "https://127.1.2.3/"] {
            let toml = format!("base_url = \"{url}\"\n{MINIMAL}");
            assert!(GatewayConfig::from_toml(&toml).is_err(), "accepted {url}");
        }
    }

    #[test]
    fn test_rejects_out_of_range_timeout() {
        let toml = format!("{MINIMAL}\n[transport]\ntimeout_secs = 0\n");
        assert!(GatewayConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_missing_secret_is_missing_field() {
        let config = GatewayConfig::from_toml(
            r#"
            [credentials]
            merchant_id = "123"
            api_token = "token"
            "#,
        )
        .unwrap();

        let Err(GatewayError::MissingField(field)) = config.credentials() else {
            panic!("expected MissingField");
        };
        assert_eq!(field, "hash_secret");
    }

    #[test]
    fn test_unset_env_var_is_missing_field() {
        let config = GatewayConfig::from_toml(
            r#"
            [credentials]
            merchant_id = "123"
            api_token_env = "MONDIDO_TEST_TOKEN_THAT_IS_NEVER_SET"
            hash_secret = "secret"
            "#,
        )
        .unwrap();

        let err = config.credentials().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("MONDIDO_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_rejects_malformed_env_var_name() {
        let result = GatewayConfig::from_toml(
            r#"
            [credentials]
            merchant_id = "123"
            api_token_env = "1BAD-NAME"
            hash_secret = "secret"
            "#,
        );
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = GatewayConfig::from_toml("credentials = 42");
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("123", "super-token", "super-secret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("123"));
        assert!(!debug.contains("super-token"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_blank_pins_are_inactive() {
        let credentials = Credentials::new("1", "t", "s")
            .with_pinned_certificate("  ")
            .with_pinned_public_key("");
        assert!(!credentials.has_pinning());

        let credentials = credentials.with_pinned_certificate_fingerprint("ab:cd");
        assert!(credentials.has_pinning());
    }
}
