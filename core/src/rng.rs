//! Referral-code generation.
//!
//! A small seeded PRNG wrapper so that code generation is reproducible
//! under a fixed seed in tests, while production engines seed from the
//! platform entropy source.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct CodeRng {
    inner: Pcg64Mcg,
}

impl CodeRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: Pcg64Mcg::from_entropy(),
        }
    }

    /// Mint a referral code of `len` characters from A-Z and digits.
    /// Uniqueness is enforced by the store's UNIQUE constraint; the
    /// caller retries on collision.
    pub fn referral_code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| {
                let idx = (self.inner.next_u64() % CODE_ALPHABET.len() as u64) as usize;
                CODE_ALPHABET[idx] as char
            })
            .collect()
    }
}
