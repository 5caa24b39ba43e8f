//! Credential encryption at rest.
//!
//! Stock and pooled account secrets are encrypted with AES-256-GCM before
//! they touch the database. Each encryption draws a fresh random nonce; the
//! stored form is `base64(nonce || ciphertext)`. A decryption failure is a
//! typed error, never an empty credential: a rotated or corrupted key must
//! abort the delivery that needed the secret.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::errors::{Error, Result};

/// Nonce size for AES-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for credential secrets.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Builds a cipher from a 32-byte key.
    ///
    /// # Errors
    /// Returns a configuration error if the key is not exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::Config(
                "encryption key must be exactly 32 bytes (256 bits)".to_string(),
            ));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::Config(format!("failed to initialise cipher: {e}")))?;
        Ok(Self { cipher })
    }

    /// Encrypts a plaintext secret for storage.
    ///
    /// # Errors
    /// Returns an internal error if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypts a stored secret back to plaintext.
    ///
    /// # Errors
    /// Returns a delivery error on malformed input or authentication failure,
    /// so a corrupted secret can never produce a silent empty delivery.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|_| Error::Delivery("stored secret is not valid base64".to_string()))?;

        if combined.len() <= NONCE_LEN {
            return Err(Error::Delivery("stored secret is truncated".to_string()));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::clone_from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| Error::Delivery("credential decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Delivery("decrypted secret is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn test_cipher() -> CredentialCipher {
        CredentialCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = test_cipher();
        let stored = cipher.encrypt("hunter2").unwrap();
        assert_ne!(stored, "hunter2");
        assert_eq!(cipher.decrypt(&stored).unwrap(), "hunter2");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same secret").unwrap();
        let b = cipher.encrypt("same secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_short_key() {
        let result = CredentialCipher::new(&[0u8; 16]);
        assert!(matches!(result.unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = test_cipher();
        let stored = cipher.encrypt("hunter2").unwrap();
        let mut raw = BASE64.decode(&stored).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = BASE64.encode(raw);

        assert!(matches!(
            cipher.decrypt(&tampered).unwrap_err(),
            Error::Delivery(_)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let stored = test_cipher().encrypt("hunter2").unwrap();
        let other = CredentialCipher::new(&[8u8; 32]).unwrap();
        assert!(matches!(
            other.decrypt(&stored).unwrap_err(),
            Error::Delivery(_)
        ));
    }

    #[test]
    fn test_garbage_input_fails() {
        let cipher = test_cipher();
        assert!(cipher.decrypt("not base64 at all!!!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }
}
