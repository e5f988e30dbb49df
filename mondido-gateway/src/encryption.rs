//! Field-level RSA encryption of sensitive request parameters.
//!
//! A request opts in by declaring a comma-separated list of field names in
//! its `encrypted` parameter. Each listed field that is present with a
//! non-blank text value is encrypted independently with RSA PKCS#1 v1.5 and
//! replaced by its base64 ciphertext. The declaration is then rewritten to
//! name only the fields that were actually encrypted, so the gateway never
//! tries to decrypt a value that was sent in the clear or not sent at all.

use base64::{Engine, engine::general_purpose::STANDARD};
use rsa::{
    Pkcs1v15Encrypt, RsaPublicKey, pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey,
    traits::PublicKeyParts,
};
use tracing::debug;

use crate::{
    error::{GatewayError, Result},
    request::{ENCRYPTED_FIELD, FieldValue, OutgoingRequest},
};

/// PKCS#1 v1.5 padding overhead in bytes.
const PKCS1_V15_OVERHEAD: usize = 11;

/// Encrypts declared request fields with the gateway's RSA public key.
#[derive(Debug, Clone)]
pub struct FieldEncryptor {
    key: RsaPublicKey,
}

impl FieldEncryptor {
    /// Parses an RSA public key from PEM.
    ///
    /// Accepts both SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) and PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) encodings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidKeyMaterial`] if the PEM is not an RSA public key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| GatewayError::InvalidKeyMaterial(format!("invalid RSA public key: {e}")))?;
        Ok(Self { key })
    }

    /// Largest plaintext, in bytes, a single field may have.
    #[must_use]
    pub fn max_plaintext_len(&self) -> usize {
        self.key.size().saturating_sub(PKCS1_V15_OVERHEAD)
    }

    /// Encrypts the fields declared in `encrypted` in place.
    ///
    /// Does nothing if the request declares no fields. Declared fields that
    /// are absent, blank or not plain text are dropped from the declaration;
    /// if none survive, the declaration is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CryptoError`] if a value is longer than
    /// [`max_plaintext_len`](Self::max_plaintext_len) or encryption fails.
    pub fn encrypt(&self, request: &mut OutgoingRequest) -> Result<()> {
        let declared = request.encrypted_fields();
        if declared.is_empty() {
            return Ok(());
        }

        let mut encrypted = Vec::with_capacity(declared.len());
        for name in declared {
            let Some(plaintext) = request.text(&name).map(str::to_owned) else {
                debug!(field = %name, "declared encrypted field absent, dropping from declaration");
                continue;
            };
            let ciphertext = self.encrypt_value(&name, &plaintext)?;
            request.insert(name.as_str(), FieldValue::Text(ciphertext));
            encrypted.push(name);
        }

        request.insert(ENCRYPTED_FIELD, encrypted.join(","));
        Ok(())
    }

    fn encrypt_value(&self, name: &str, plaintext: &str) -> Result<String> {
        let limit = self.max_plaintext_len();
        if plaintext.len() > limit {
            return Err(GatewayError::CryptoError(format!(
                "field {name} is {} bytes, key allows at most {limit}",
                plaintext.len()
            )));
        }

        let mut rng = rand::thread_rng();
        let ciphertext = self
            .key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .map_err(|e| GatewayError::CryptoError(format!("cannot encrypt {name}: {e}")))?;

        Ok(STANDARD.encode(ciphertext))
    }
}

#[cfg(test)]
mod tests {
    use rsa::{RsaPrivateKey, pkcs8::DecodePrivateKey};

    use super::*;

    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/field_public.pem");
    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/field_private.pem");

    fn encryptor() -> FieldEncryptor {
        FieldEncryptor::from_pem(PUBLIC_PEM).unwrap()
    }

    fn decrypt(ciphertext_b64: &str) -> String {
        let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_PEM).unwrap();
        let ciphertext = STANDARD.decode(ciphertext_b64).unwrap();
        String::from_utf8(key.decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap()).unwrap()
    }

    fn card_request() -> OutgoingRequest {
        let mut request = OutgoingRequest::new();
        request.insert("amount", "10.00");
        request.insert("card_number", "4111111111111111");
        request.insert("card_cvv", "200");
        request.insert(ENCRYPTED_FIELD, "card_number,card_cvv");
        request
    }

    #[test]
    fn test_round_trip_recovers_plaintext() {
        let mut request = card_request();
        encryptor().encrypt(&mut request).unwrap();

        let number = request.text("card_number").unwrap();
        assert_ne!(number, "4111111111111111");
        assert_eq!(decrypt(number), "4111111111111111");
        assert_eq!(decrypt(request.text("card_cvv").unwrap()), "200");
        assert_eq!(request.text("amount"), Some("10.00"));
        assert_eq!(request.text(ENCRYPTED_FIELD), Some("card_number,card_cvv"));
    }

    #[test]
    fn test_absent_and_blank_fields_are_dropped() {
        let mut request = OutgoingRequest::new();
        request.insert("card_number", "4111111111111111");
        request.insert("card_cvv", "");
        request.insert(ENCRYPTED_FIELD, "card_holder,card_number,card_cvv");

        encryptor().encrypt(&mut request).unwrap();

        assert_eq!(request.encrypted_fields(), vec!["card_number"]);
        assert_eq!(request.text("card_cvv"), None);
        assert!(request.get("card_holder").is_none());
    }

    #[test]
    fn test_no_survivors_clears_declaration() {
        let mut request = OutgoingRequest::new();
        request.insert(ENCRYPTED_FIELD, "card_cvv");

        encryptor().encrypt(&mut request).unwrap();

        assert!(request.encrypted_fields().is_empty());
        assert_eq!(request.encode(), "");
    }

    #[test]
    fn test_no_declaration_is_noop() {
        let mut request = OutgoingRequest::new();
        request.insert("card_number", "4111111111111111");
        let before = request.clone();

        encryptor().encrypt(&mut request).unwrap();
        assert_eq!(request, before);
    }

    #[test]
    fn test_each_field_encrypted_independently() {
        let mut request = OutgoingRequest::new();
        request.insert("a", "same");
        request.insert("b", "same");
        request.insert(ENCRYPTED_FIELD, "a,b");

        encryptor().encrypt(&mut request).unwrap();

        // PKCS#1 v1.5 padding is randomized
        assert_ne!(request.text("a"), request.text("b"));
        assert_eq!(decrypt(request.text("a").unwrap()), "same");
        assert_eq!(decrypt(request.text("b").unwrap()), "same");
    }

    #[test]
    fn test_oversized_value_is_crypto_error() {
        let encryptor = encryptor();
        assert_eq!(encryptor.max_plaintext_len(), 245);

        let mut request = OutgoingRequest::new();
        request.insert("note", "x".repeat(246));
        request.insert(ENCRYPTED_FIELD, "note");

        let result = encryptor.encrypt(&mut request);
        assert!(matches!(result, Err(GatewayError::CryptoError(_))));
    }

    #[test]
    fn test_malformed_key_fails_at_construction() {
        let result = FieldEncryptor::from_pem("-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----");
        assert!(matches!(result, Err(GatewayError::InvalidKeyMaterial(_))));

        let ec_key = include_str!("../tests/fixtures/ec_pubkey.pem");
        assert!(FieldEncryptor::from_pem(ec_key).is_err());
    }
}
