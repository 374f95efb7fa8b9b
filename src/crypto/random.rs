//! Secure random number generation.
//!
//! All randomness in the server — nonces, fake UUIDs, and the motion
//! simulation — comes from the operating system's entropy source, so no
//! disguise parameter is predictable from a weak PRNG state.

use rand::RngCore;
use rand_core::OsRng;

/// Cryptographically secure random number generator.
///
/// Wraps the OS-provided entropy source (e.g., /dev/urandom on Unix,
/// BCryptGenRandom on Windows).
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer with cryptographically secure random bytes.
    pub fn fill(dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    /// Generate a fixed-size array of random bytes.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut buf = [0u8; N];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    /// Generate a random u64.
    pub fn u64() -> u64 {
        OsRng.next_u64()
    }

    /// Uniform float in `[0, 1)` with 53 bits of precision.
    pub fn f64() -> f64 {
        (Self::u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform float in `[lo, hi)`.
    pub fn range_f64(lo: f64, hi: f64) -> f64 {
        lo + Self::f64() * (hi - lo)
    }
}
