//! Key and identifier derivation.
//!
//! Both the tunnel key and the login name are derived from the shared
//! secret with plain SHA-256. Clients run the same derivation, so knowledge
//! of the secret is the entire authentication scheme.

use sha2::{Digest, Sha256};

use crate::crypto::AeadKey;

/// Derive the 256-bit tunnel key: `SHA-256(secret)`.
pub fn tunnel_key(secret: &str) -> AeadKey {
    let digest = Sha256::digest(secret.as_bytes());
    AeadKey::from_bytes(digest.into())
}

/// Derive the login name a holder of `secret` will present:
/// `"Player"` followed by the first eight lowercase hex digits of
/// `SHA-256(secret)`. Always 14 ASCII characters.
pub fn player_id(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("Player{}", &hex::encode(digest)[..8])
}
