//! Seeded random number generation.
//!
//! Seeds are arbitrary strings. They are hashed with SHA-256 into the 32 byte seed of a ChaCha20 generator,
//! whose output stream is fixed across platforms and crate versions: the same seed always yields
//! the same shuffles and draws.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

pub type SeededRng = ChaCha20Rng;

pub fn seeded_rng(seed: &str) -> SeededRng {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    ChaCha20Rng::from_seed(bytes)
}
