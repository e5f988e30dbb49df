//! Gateway response normalization.
//!
//! The gateway answers either with a transaction object or with an error
//! envelope of exactly three keys (`name`, `code`, `description`). Bodies that
//! are not JSON objects (proxy error pages, truncated responses) are replaced
//! by a synthetic envelope that quotes the raw body. [`normalize`] folds all
//! of these into a single [`NormalizedResult`] and never fails.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Message reported for approved transactions.
pub const APPROVED_MESSAGE: &str = "Transaction approved";

const ENVELOPE_KEYS: [&str; 3] = ["name", "code", "description"];

/// Address verification result.
///
/// The gateway does not compare billing addresses, so every result carries `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvsCode {
    /// `E`: AVS data is invalid or AVS is not allowed for this card type.
    NotSupported,
}

impl AvsCode {
    /// Single-letter code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::NotSupported => 'E',
        }
    }

    /// Human readable description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotSupported => "AVS data is invalid or AVS is not allowed for this card type.",
        }
    }
}

/// Card verification value result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CvvCode {
    /// `M`: CVV matches.
    Matched,
    /// `S`: CVV should have been present.
    ShouldHaveBeenPresent,
    /// `N`: CVV does not match.
    DoesNotMatch,
}

impl CvvCode {
    /// Single-letter code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Matched => 'M',
            Self::ShouldHaveBeenPresent => 'S',
            Self::DoesNotMatch => 'N',
        }
    }

    /// Human readable description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Matched => "CVV matches",
            Self::ShouldHaveBeenPresent => "CVV should have been present",
            Self::DoesNotMatch => "CVV does not match",
        }
    }

    fn from_error(name: Option<&str>, code: Option<&str>) -> Self {
        match (name, code) {
            (Some("errors.card_cvv.missing"), _) | (_, Some("124")) => Self::ShouldHaveBeenPresent,
            (Some("errors.card_cvv.invalid"), _) | (_, Some("125")) => Self::DoesNotMatch,
            _ => Self::Matched,
        }
    }
}

/// Canonical error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Card number missing or invalid.
    InvalidNumber,
    /// Expiry date missing or invalid.
    InvalidExpiryDate,
    /// CVC missing or invalid.
    InvalidCvc,
    /// Card has expired.
    ExpiredCard,
    /// Postal code missing.
    IncorrectZip,
    /// Address, city or country missing.
    IncorrectAddress,
    /// Issuer declined the payment.
    CardDeclined,
    /// Unexpected gateway failure.
    ProcessingError,
}

impl ErrorCode {
    /// Maps a gateway error name onto the canonical taxonomy.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::response::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::from_gateway_name("errors.card.expired"), Some(ErrorCode::ExpiredCard));
    /// assert_eq!(ErrorCode::from_gateway_name("errors.something.else"), None);
    /// ```
    #[must_use]
    pub fn from_gateway_name(name: &str) -> Option<Self> {
        let code = match name {
            "errors.card_number.missing" | "errors.card_number.invalid" => Self::InvalidNumber,
            "errors.card_expiry.missing" | "errors.card_expiry.invalid" => Self::InvalidExpiryDate,
            "errors.card_cvv.missing" | "errors.card_cvv.invalid" => Self::InvalidCvc,
            "errors.card.expired" => Self::ExpiredCard,
            "errors.zip.missing" => Self::IncorrectZip,
            "errors.address.missing" | "errors.city.missing" | "errors.country_code.missing" => {
                Self::IncorrectAddress
            }
            "errors.payment.declined" => Self::CardDeclined,
            "errors.unexpected" => Self::ProcessingError,
            _ => return None,
        };
        Some(code)
    }

    /// Canonical snake_case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidNumber => "invalid_number",
            Self::InvalidExpiryDate => "invalid_expiry_date",
            Self::InvalidCvc => "invalid_cvc",
            Self::ExpiredCard => "expired_card",
            Self::IncorrectZip => "incorrect_zip",
            Self::IncorrectAddress => "incorrect_address",
            Self::CardDeclined => "card_declined",
            Self::ProcessingError => "processing_error",
        }
    }
}

/// Parsed gateway response.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// Transaction object.
    Transaction(Map<String, Value>),
    /// Error envelope with exactly `name`, `code` and `description`.
    Error(Map<String, Value>),
}

impl GatewayResponse {
    /// Parses a raw body, substituting a synthetic error envelope for anything
    /// that is not a JSON object.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => Self::classify(object),
            _ => Self::Error(invalid_response_envelope(raw)),
        }
    }

    fn classify(object: Map<String, Value>) -> Self {
        let is_envelope =
            object.len() == ENVELOPE_KEYS.len() && ENVELOPE_KEYS.iter().all(|k| object.contains_key(*k));
        if is_envelope { Self::Error(object) } else { Self::Transaction(object) }
    }

    /// Underlying JSON object.
    #[must_use]
    pub fn object(&self) -> &Map<String, Value> {
        match self {
            Self::Transaction(object) | Self::Error(object) => object,
        }
    }

    /// Returns true for an approved transaction.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Transaction(_)) && self.field("status").as_deref() == Some("approved")
    }

    /// Reads a scalar field as text; numbers are rendered in decimal.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<String> {
        match self.object().get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn is_test(&self) -> bool {
        match self.object().get("test") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

fn invalid_response_envelope(raw: &str) -> Map<String, Value> {
    let description = format!(
        "Invalid response received from the Mondido API.\n  \
         Please contact support@mondido.com if you continue to receive this message.\n  \
         (The raw response returned by the API was {raw:?})"
    );
    let mut envelope = Map::new();
    envelope.insert("name".to_owned(), json!("errors.invalid_response"));
    envelope.insert("code".to_owned(), json!("invalid_response"));
    envelope.insert("description".to_owned(), Value::String(description));
    envelope
}

/// Canonical outcome of one gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedResult {
    success: bool,
    message: String,
    raw: Value,
    test: bool,
    authorization: Option<String>,
    avs: AvsCode,
    cvv: CvvCode,
    error_code: Option<ErrorCode>,
}

impl NormalizedResult {
    /// Whether the gateway approved the transaction.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// `Transaction approved`, or the gateway's description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The parsed response object (or the synthetic envelope).
    #[must_use]
    pub const fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the gateway flagged this as a test transaction.
    #[must_use]
    pub const fn test(&self) -> bool {
        self.test
    }

    /// Transaction id on success, error description on failure.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Address verification result.
    #[must_use]
    pub const fn avs(&self) -> AvsCode {
        self.avs
    }

    /// Card verification result.
    #[must_use]
    pub const fn cvv(&self) -> CvvCode {
        self.cvv
    }

    /// Canonical error code; `None` on success or for unmapped gateway errors.
    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }
}

/// Normalizes a raw gateway body.
///
/// # Examples
///
/// ```
/// use mondido_gateway::response::{ErrorCode, normalize};
///
/// let result = normalize(r#"{"status":"approved","id":"TX123","test":true}"#);
/// assert!(result.success());
/// assert_eq!(result.message(), "Transaction approved");
/// assert_eq!(result.authorization(), Some("TX123"));
///
/// let result = normalize(
///     r#"{"name":"errors.payment.declined","code":"x","description":"Card was declined"}"#,
/// );
/// assert!(!result.success());
/// assert_eq!(result.error_code(), Some(ErrorCode::CardDeclined));
/// ```
#[must_use]
pub fn normalize(raw: &str) -> NormalizedResult {
    from_response(&GatewayResponse::parse(raw))
}

/// Normalizes an already parsed response.
#[must_use]
pub fn from_response(response: &GatewayResponse) -> NormalizedResult {
    let success = response.is_approved();
    let description = response.field("description");
    let name = response.field("name");

    let (message, authorization, cvv, error_code) = if success {
        (APPROVED_MESSAGE.to_owned(), response.field("id"), CvvCode::Matched, None)
    } else {
        let code = response.field("code");
        (
            description.clone().or_else(|| name.clone()).unwrap_or_default(),
            description,
            CvvCode::from_error(name.as_deref(), code.as_deref()),
            name.as_deref().and_then(ErrorCode::from_gateway_name),
        )
    };

    NormalizedResult {
        success,
        message,
        raw: Value::Object(response.object().clone()),
        test: response.is_test(),
        authorization,
        avs: AvsCode::NotSupported,
        cvv,
        error_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_envelope() {
        let result = normalize(
            r#"{"name":"errors.payment.declined","code":"x","description":"Card was declined"}"#,
        );
        assert!(!result.success());
        assert_eq!(result.message(), "Card was declined");
        assert_eq!(result.authorization(), Some("Card was declined"));
        assert_eq!(result.error_code(), Some(ErrorCode::CardDeclined));
        assert_eq!(result.cvv(), CvvCode::Matched);
        assert_eq!(result.avs().code(), 'E');
    }

    #[test]
    fn test_approved_transaction() {
        let result = normalize(r#"{"status":"approved","id":"TX123","test":true}"#);
        assert!(result.success());
        assert_eq!(result.message(), "Transaction approved");
        assert_eq!(result.authorization(), Some("TX123"));
        assert!(result.test());
        assert_eq!(result.error_code(), None);
        assert_eq!(result.cvv().code(), 'M');
        assert_eq!(result.avs(), AvsCode::NotSupported);
    }

    #[test]
    fn test_numeric_transaction_id() {
        let result = normalize(r#"{"status":"approved","id":4711,"payment_ref":"o-1"}"#);
        assert_eq!(result.authorization(), Some("4711"));
        assert!(!result.test());
    }

    #[test]
    fn test_html_body_is_invalid_response() {
        let result = normalize("<html>502</html>");
        assert!(!result.success());
        assert!(result.message().contains("<html>502</html>"));
        assert!(result.message().contains(
            "Please contact support@mondido.com if you continue to receive this message."
        ));
        assert_eq!(result.error_code(), None);
        assert_eq!(result.raw()["code"], "invalid_response");
    }

    #[test]
    fn test_empty_and_non_object_bodies() {
        for raw in ["", "[]", "\"approved\"", "null"] {
            let result = normalize(raw);
            assert!(!result.success(), "{raw:?} was treated as success");
            assert!(result.message().starts_with("Invalid response received from the Mondido API."));
        }
    }

    #[test]
    fn test_cvv_codes() {
        let result = normalize(
            r#"{"name":"errors.card_cvv.invalid","code":"125","description":"CVV invalid"}"#,
        );
        assert_eq!(result.cvv(), CvvCode::DoesNotMatch);
        assert_eq!(result.cvv().message(), "CVV does not match");
        assert_eq!(result.error_code(), Some(ErrorCode::InvalidCvc));

        let result = normalize(
            r#"{"name":"errors.card_cvv.missing","code":124,"description":"CVV missing"}"#,
        );
        assert_eq!(result.cvv(), CvvCode::ShouldHaveBeenPresent);

        // code alone is enough
        let result = normalize(r#"{"name":"errors.other","code":"125","description":"nope"}"#);
        assert_eq!(result.cvv(), CvvCode::DoesNotMatch);

        let result = normalize(
            r#"{"name":"errors.card.expired","code":"130","description":"Card expired"}"#,
        );
        assert_eq!(result.cvv(), CvvCode::Matched);
        assert_eq!(result.error_code(), Some(ErrorCode::ExpiredCard));
    }

    #[test]
    fn test_declined_transaction_object() {
        let result = normalize(
            r#"{"status":"declined","id":99,"name":"errors.payment.declined","description":"Declined","test":true}"#,
        );
        assert!(!result.success());
        assert_eq!(result.message(), "Declined");
        assert_eq!(result.authorization(), Some("Declined"));
        assert_eq!(result.error_code(), Some(ErrorCode::CardDeclined));
        assert!(result.test());
    }

    #[test]
    fn test_envelope_with_approved_status_is_not_success() {
        // a fourth key makes it a transaction; exactly three keys is an envelope
        let response = GatewayResponse::parse(r#"{"name":"a","code":"b","description":"c"}"#);
        assert!(matches!(response, GatewayResponse::Error(_)));

        let response =
            GatewayResponse::parse(r#"{"name":"a","code":"b","description":"c","status":"approved"}"#);
        assert!(matches!(response, GatewayResponse::Transaction(_)));
        assert!(response.is_approved());
    }

    #[test]
    fn test_error_code_table() {
        let table = [
            ("errors.card_number.missing", ErrorCode::InvalidNumber),
            ("errors.card_number.invalid", ErrorCode::InvalidNumber),
            ("errors.card_expiry.missing", ErrorCode::InvalidExpiryDate),
            ("errors.card_expiry.invalid", ErrorCode::InvalidExpiryDate),
            ("errors.card_cvv.missing", ErrorCode::InvalidCvc),
            ("errors.card_cvv.invalid", ErrorCode::InvalidCvc),
            ("errors.card.expired", ErrorCode::ExpiredCard),
            ("errors.zip.missing", ErrorCode::IncorrectZip),
            ("errors.address.missing", ErrorCode::IncorrectAddress),
            ("errors.city.missing", ErrorCode::IncorrectAddress),
            ("errors.country_code.missing", ErrorCode::IncorrectAddress),
            ("errors.payment.declined", ErrorCode::CardDeclined),
            ("errors.unexpected", ErrorCode::ProcessingError),
        ];
        for (name, expected) in table {
            assert_eq!(ErrorCode::from_gateway_name(name), Some(expected), "{name}");
        }
        assert_eq!(ErrorCode::CardDeclined.as_str(), "card_declined");
        assert_eq!(ErrorCode::from_gateway_name("errors.currency.unsupported"), None);
    }

    #[test]
    fn test_unmapped_failure_has_no_error_code() {
        let result = normalize(
            r#"{"name":"errors.merchant.not_found","code":"1","description":"Unknown merchant"}"#,
        );
        assert!(!result.success());
        assert_eq!(result.error_code(), None);
        assert_eq!(result.message(), "Unknown merchant");
    }
}
