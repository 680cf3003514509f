//! Salt sources for message bodies.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

/// Supplies the 64-bit salt mixed into every signed body.
pub trait SaltSource {
    fn next_salt(&mut self) -> i64;
}

impl<T: SaltSource + ?Sized> SaltSource for &mut T {
    fn next_salt(&mut self) -> i64 {
        (**self).next_salt()
    }
}

/// Operating-system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSalt;

impl SaltSource for OsSalt {
    fn next_salt(&mut self) -> i64 {
        OsRng.gen()
    }
}

/// Deterministic salts for tests and reproducible simulations.
#[derive(Debug, Clone)]
pub struct SeededSalt {
    rng: StdRng,
}

impl SeededSalt {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SaltSource for SeededSalt {
    fn next_salt(&mut self) -> i64 {
        self.rng.gen()
    }
}
