//! Cryptographic primitives for the tunnel.
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption for the disguised byte stream
//! - SHA-256 derivation of the tunnel key and the login identifier
//! - Secure random number generation
//!
//! Key material is zeroized on drop. There is no key exchange: the scheme is
//! symmetric and single-factor by design, authenticated by knowledge of the
//! shared secret alone.

mod aead;
mod kdf;
mod random;

pub use aead::{Aead, AeadKey};
pub use kdf::{player_id, tunnel_key};
pub use random::SecureRandom;

/// Size of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;
