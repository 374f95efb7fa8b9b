//! Authenticated encryption for tunnel payloads.
//!
//! Uses AES-256-GCM with a fresh random 96-bit nonce per message. Sealed
//! messages are framed as `nonce ∥ ciphertext ∥ tag` so each one is
//! self-contained; there are no counters and no rekeying.

use aes_gcm::{
    aead::{Aead as AeadCipher, KeyInit},
    Aes256Gcm, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{SecureRandom, KEY_SIZE, NONCE_SIZE};
use crate::error::{Error, Result};

/// A symmetric key for AEAD operations.
///
/// Automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Create a new AEAD key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// AES-256-GCM cipher bound to one tunnel key.
pub struct Aead {
    cipher: Aes256Gcm,
}

impl Aead {
    /// Create a new AEAD instance with the given key.
    pub fn new(key: &AeadKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Returns `nonce ∥ ciphertext ∥ tag`, ready to embed in a disguise
    /// packet. AAD is empty.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes: [u8; NONCE_SIZE] = SecureRandom::bytes();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::crypto("encryption failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a `nonce ∥ ciphertext ∥ tag` message.
    ///
    /// # Errors
    ///
    /// Returns an error for bodies shorter than a nonce and for any
    /// authentication failure (wrong key, tampered data). Callers on the
    /// ingest path drop such messages silently.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(Error::crypto("message shorter than nonce"));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::crypto("authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TAG_SIZE;

    fn test_key() -> AeadKey {
        AeadKey::from_bytes([0x42u8; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let aead = Aead::new(&test_key());

        let plaintext = b"Hello, tunnel!";
        let sealed = aead.seal(plaintext).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        let opened = aead.open(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let aead = Aead::new(&test_key());
        let sealed = aead.seal(b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(aead.open(&sealed).unwrap(), b"");
    }

    #[test]
    fn test_nonces_are_unique() {
        let aead = Aead::new(&test_key());
        let a = aead.seal(b"same plaintext").unwrap();
        let b = aead.seal(b"same plaintext").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = Aead::new(&test_key()).seal(b"secret data").unwrap();
        let other = Aead::new(&AeadKey::from_bytes([0x43u8; KEY_SIZE]));
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let aead = Aead::new(&test_key());
        let mut sealed = aead.seal(b"secret data").unwrap();
        sealed[NONCE_SIZE] ^= 0x01; // Flip one bit
        assert!(aead.open(&sealed).is_err());
    }

    #[test]
    fn test_nonce_short_body_fails() {
        let aead = Aead::new(&test_key());
        assert!(aead.open(&[0u8; NONCE_SIZE - 1]).is_err());
        assert!(aead.open(&[]).is_err());
    }
}
