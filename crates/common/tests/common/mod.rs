//! Shared fixtures for sealing integration tests
#![allow(dead_code)]

use std::sync::OnceLock;

use common::crypto::KeyPair;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A 2048-bit key pair, generated once per test binary
pub fn key_pair() -> &'static KeyPair {
    static PAIR: OnceLock<KeyPair> = OnceLock::new();
    PAIR.get_or_init(|| KeyPair::generate(2048, &mut rng(0xC0FFEE)).unwrap())
}

/// A second, unrelated key pair
pub fn other_key_pair() -> &'static KeyPair {
    static PAIR: OnceLock<KeyPair> = OnceLock::new();
    PAIR.get_or_init(|| KeyPair::generate(2048, &mut rng(0xBEEF)).unwrap())
}

pub fn rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Deterministic, non-repeating payload bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Flip a single bit of `data`
pub fn flip_bit(data: &mut [u8], bit: usize) {
    data[bit / 8] ^= 1 << (bit % 8);
}
