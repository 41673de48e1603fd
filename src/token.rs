//! Token generation.
//!
//! CoAP tokens only need to be unpredictable enough to stop an off-path
//! attacker from matching a spoofed response to a request; they are not a
//! security boundary. Rather than a lazily-initialized global PRNG shared
//! across every caller, each `TokenGenerator` carries its own explicitly
//! seeded state, so callers that need reproducibility (tests, simulators)
//! can seed one directly and callers on `std` can seed from the clock.

use alloc::vec::Vec;

use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

/// Generates CoAP request tokens.
///
/// Not cryptographically meaningful; this only needs to avoid collisions
/// between concurrently outstanding requests, not resist a determined
/// adversary.
pub struct TokenGenerator {
    rng: ChaCha8Rng,
}

impl TokenGenerator {
    /// Creates a generator from an explicit 64-bit seed.
    pub fn from_seed(seed: u64) -> TokenGenerator {
        TokenGenerator {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a generator seeded from the current system time.
    #[cfg(feature = "std")]
    pub fn new() -> TokenGenerator {
        use std::time::{SystemTime, UNIX_EPOCH};

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        TokenGenerator::from_seed(seed)
    }

    /// Generates a token of the given length (0..=8, the range a CoAP token
    /// length nibble can express).
    pub fn generate(&mut self, len: u8) -> Vec<u8> {
        let mut token = alloc::vec![0u8; len as usize];
        self.rng.fill_bytes(&mut token);
        token
    }
}
