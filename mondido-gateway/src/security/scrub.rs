//! Transcript scrubbing.
//!
//! Removes credentials and card data from request/response transcripts
//! before they reach a log.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement text for scrubbed values.
pub const FILTERED: &str = "[FILTERED]";

/// Form parameters whose values never appear in logs.
pub const SCRUBBED_FIELDS: [&str; 8] = [
    "card_holder",
    "card_cvv",
    "card_expiry",
    "card_number",
    "card_type",
    "hash",
    "amount",
    "merchant_id",
];

#[allow(clippy::expect_used, reason = "pattern is a literal and covered by tests")]
static BASIC_AUTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Authorization: Basic )[A-Za-z0-9+/=]+").expect("valid Basic auth pattern")
});

#[allow(clippy::expect_used, reason = "pattern is built from literals and covered by tests")]
static SENSITIVE_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"\b({})=[^&\s"\\]+"#, SCRUBBED_FIELDS.join("|")))
        .expect("valid sensitive field pattern")
});

/// Replaces the Basic-auth credential and sensitive `name=value` pairs with `[FILTERED]`.
///
/// # Examples
///
/// ```
/// use mondido_gateway::security::scrub;
///
/// let transcript = "Authorization: Basic MTIzOnRva2Vu\ncard_number=4111111111111111&currency=sek";
/// assert_eq!(
///     scrub(transcript),
///     "Authorization: Basic [FILTERED]\ncard_number=[FILTERED]&currency=sek"
/// );
/// ```
#[must_use]
pub fn scrub(transcript: &str) -> String {
    let without_auth = BASIC_AUTH.replace_all(transcript, format!("${{1}}{FILTERED}"));
    SENSITIVE_FIELDS.replace_all(&without_auth, format!("${{1}}={FILTERED}")).into_owned()
}
