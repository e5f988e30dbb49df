//! Transaction integrity hashing.
//!
//! The gateway recomputes an MD5 digest over a fixed concatenation of
//! merchant and order fields plus the shared hash secret, and rejects any
//! transaction whose `hash` parameter does not match. Field boundaries are
//! implicit (no delimiters), so the byte layout must be reproduced exactly:
//!
//! ```text
//! merchant_id + payment_ref + customer_ref + amount + currency + ("test" | "") + secret
//! ```
//!
//! MD5 over a fixed concatenation is a compatibility requirement of the
//! remote service, not a construction to reuse elsewhere.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::instrument;

use crate::{
    config::Credentials,
    error::{GatewayError, Result},
};

/// Fields covered by the integrity hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableTransaction {
    /// Merchant identifier.
    pub merchant_id: String,
    /// Merchant order id (`payment_ref` on the wire).
    pub payment_ref: String,
    /// Merchant customer reference; empty when the order has none.
    pub customer_ref: String,
    /// Transaction amount in major units.
    pub amount: Decimal,
    /// ISO 4217 currency code, any case.
    pub currency: String,
    /// Whether this is a test transaction.
    pub test: bool,
}

impl SignableTransaction {
    /// Amount rendered with exactly two fraction digits, e.g. `10.00`.
    #[must_use]
    pub fn formatted_amount(&self) -> String {
        format_amount(self.amount)
    }

    /// Currency code in the lower case the gateway hashes.
    #[must_use]
    pub fn normalized_currency(&self) -> String {
        self.currency.to_lowercase()
    }
}

/// Formats an amount with exactly two fraction digits.
///
/// Extra precision is rounded half away from zero. Operations reject such
/// amounts before signing, so this only matters to direct callers.
///
/// # Examples
///
/// ```
/// use mondido_gateway::signing::format_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_amount(Decimal::new(10, 0)), "10.00");
/// assert_eq!(format_amount(Decimal::new(1999, 2)), "19.99");
/// assert_eq!(format_amount(Decimal::new(125, 3)), "0.13");
/// ```
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Checks that an amount fits the two fraction digits the gateway accepts.
///
/// Trailing zeros do not count: `10.500` is accepted, `10.005` is not.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidAmount`] if the amount would have to be
/// rounded to be sent.
pub fn check_amount(amount: Decimal) -> Result<Decimal> {
    if amount.normalize().scale() > 2 {
        return Err(GatewayError::InvalidAmount(format!(
            "{amount} has more than two fraction digits"
        )));
    }
    Ok(amount)
}

/// Computes the integrity digest for outgoing transactions.
#[derive(Clone)]
pub struct HashSigner {
    hash_secret: String,
}

impl std::fmt::Debug for HashSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashSigner").field("hash_secret", &"[FILTERED]").finish()
    }
}

impl HashSigner {
    /// Creates a signer from the client credentials.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self { hash_secret: credentials.hash_secret().to_owned() }
    }

    /// Returns the lowercase hex MD5 digest for a transaction.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::{
    ///     config::Credentials,
    ///     signing::{HashSigner, SignableTransaction},
    /// };
    /// use rust_decimal::Decimal;
    ///
    /// let credentials = Credentials::new("123", "token", "S3cr3t");
    /// let signer = HashSigner::new(&credentials);
    ///
    /// let digest = signer.sign(&SignableTransaction {
    ///     merchant_id: "123".to_owned(),
    ///     payment_ref: "order-1".to_owned(),
    ///     customer_ref: String::new(),
    ///     amount: Decimal::new(10, 0),
    ///     currency: "SEK".to_owned(),
    ///     test: false,
    /// });
    ///
    /// assert_eq!(digest, "2cae545953967baec959ef0be99822b0");
    /// ```
    #[must_use]
    #[instrument(skip(self, transaction), fields(payment_ref = %transaction.payment_ref, test = transaction.test))]
    pub fn sign(&self, transaction: &SignableTransaction) -> String {
        let mut material = String::with_capacity(64);
        material.push_str(&transaction.merchant_id);
        material.push_str(&transaction.payment_ref);
        material.push_str(&transaction.customer_ref);
        material.push_str(&transaction.formatted_amount());
        material.push_str(&transaction.normalized_currency());
        if transaction.test {
            material.push_str("test");
        }
        material.push_str(&self.hash_secret);

        format!("{:x}", md5::compute(material.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn signer() -> HashSigner {
        HashSigner::new(&Credentials::new("123", "token", "secret"))
    }

    fn transaction() -> SignableTransaction {
        SignableTransaction {
            merchant_id: "123".to_owned(),
            payment_ref: "order-1".to_owned(),
            customer_ref: "cust-9".to_owned(),
            amount: Decimal::new(10, 0),
            currency: "SEK".to_owned(),
            test: true,
        }
    }

    #[test]
    fn test_known_digest() {
        // md5("123order-1cust-910.00sektestsecret")
        assert_eq!(signer().sign(&transaction()), "26e48bc2a4a6ea88b9a8c31bbc74c3d9");
    }

    #[test]
    fn test_digest_is_lowercase_hex() {
        let digest = signer().sign(&transaction());
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_amount_always_has_two_fraction_digits() {
        assert_eq!(format_amount(Decimal::new(1, 0)), "1.00");
        assert_eq!(format_amount(Decimal::new(15, 1)), "1.50");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "12.35");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_amount_midpoint_rounds_away_from_zero() {
        assert_eq!(format_amount(Decimal::new(125, 3)), "0.13");
        assert_eq!(format_amount(Decimal::new(10005, 3)), "10.01");
        assert_eq!(format_amount(Decimal::new(-125, 3)), "-0.13");
    }

    #[test]
    fn test_check_amount() {
        assert!(check_amount(Decimal::new(1050, 2)).is_ok());
        assert!(check_amount(Decimal::new(10500, 3)).is_ok());
        assert!(check_amount(Decimal::new(10, 0)).is_ok());
        assert!(matches!(
            check_amount(Decimal::new(10005, 3)),
            Err(GatewayError::InvalidAmount(ref m)) if m.starts_with("10.005")
        ));
        assert!(matches!(check_amount(Decimal::new(125, 3)), Err(GatewayError::InvalidAmount(_))));
    }

    #[test]
    fn test_amount_scale_does_not_change_digest() {
        let mut scaled = transaction();
        scaled.amount = Decimal::new(1000, 2);
        assert_eq!(signer().sign(&transaction()), signer().sign(&scaled));
    }

    #[test]
    fn test_currency_case_does_not_change_digest() {
        let mut lower = transaction();
        lower.currency = "sek".to_owned();
        assert_eq!(signer().sign(&transaction()), signer().sign(&lower));
    }

    #[test]
    fn test_empty_customer_ref_contributes_nothing() {
        let mut without = transaction();
        without.customer_ref = String::new();
        without.test = false;
        let expected = format!("{:x}", md5::compute(b"123order-110.00seksecret"));
        assert_eq!(signer().sign(&without), expected);
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("[FILTERED]"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_sign_is_deterministic(
            payment_ref in "[a-zA-Z0-9-]{1,32}",
            cents in 0i64..10_000_000,
            currency in "[a-z]{3}",
            test in any::<bool>(),
        ) {
            let tx = SignableTransaction {
                merchant_id: "42".to_owned(),
                payment_ref,
                customer_ref: String::new(),
                amount: Decimal::new(cents, 2),
                currency,
                test,
            };
            prop_assert_eq!(signer().sign(&tx), signer().sign(&tx.clone()));
        }

        #[test]
        fn test_changing_amount_changes_digest(
            cents in 0i64..10_000_000,
            delta in 1i64..1_000,
        ) {
            let mut tx = transaction();
            tx.amount = Decimal::new(cents, 2);
            let original = signer().sign(&tx);
            tx.amount = Decimal::new(cents + delta, 2);
            prop_assert_ne!(original, signer().sign(&tx));
        }

        #[test]
        fn test_changing_order_ref_changes_digest(
            first in "[a-z0-9]{1,16}",
            second in "[a-z0-9]{1,16}",
        ) {
            prop_assume!(first != second);
            let mut tx = transaction();
            tx.customer_ref = String::new();
            tx.payment_ref = first;
            let original = signer().sign(&tx);
            tx.payment_ref = second;
            prop_assert_ne!(original, signer().sign(&tx));
        }
    }

    #[test]
    fn test_changing_test_flag_changes_digest() {
        let mut tx = transaction();
        let original = signer().sign(&tx);
        tx.test = false;
        assert_ne!(original, signer().sign(&tx));
    }

    #[test]
    fn test_changing_currency_changes_digest() {
        let mut tx = transaction();
        let original = signer().sign(&tx);
        tx.currency = "EUR".to_owned();
        assert_ne!(original, signer().sign(&tx));
    }
}
