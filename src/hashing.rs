//! Hash families mapping 64-bit keys to 64-bit hashes.
//!
//! Filters in this crate are generic over a [`HashFamily`]. An instance is a
//! pure function: it draws its random parameters once at construction and
//! never mutates afterward, so two lookups of the same key always agree.

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A randomly seeded function from 64-bit keys to 64-bit hashes.
///
/// Implementations must be deterministic for the lifetime of the instance;
/// filters derive both the bucket index and the fingerprint of a key from a
/// single `hash` call.
pub trait HashFamily {
    /// Hashes a key.
    fn hash(&self, key: u64) -> u64;
}

/// Two-independent multiply-shift hashing over 128-bit arithmetic.
///
/// Holds two uniformly random 128-bit integers `multiply` and `add` and
/// computes `(add + multiply * key) >> 64`. See Dietzfelbinger, "Universal
/// hashing and k-wise independent random variables via integer arithmetic
/// without primes".
///
/// # Examples
///
/// ```
/// use amq_filters::{HashFamily, TwoIndependentMultiplyShift};
///
/// let hasher = TwoIndependentMultiplyShift::from_entropy();
/// assert_eq!(hasher.hash(42), hasher.hash(42));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct TwoIndependentMultiplyShift {
    multiply: u128,
    add: u128,
}

impl TwoIndependentMultiplyShift {
    /// Constructs a `TwoIndependentMultiplyShift` with parameters drawn from
    /// the thread-local entropy source.
    pub fn from_entropy() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_seeds(rng.gen(), rng.gen())
    }

    /// Constructs a `TwoIndependentMultiplyShift` from fixed parameters.
    ///
    /// Two instances built from the same seeds hash identically, which is
    /// what serialization and reproducible tests rely on.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::{HashFamily, TwoIndependentMultiplyShift};
    ///
    /// let a = TwoIndependentMultiplyShift::from_seeds(3, 7);
    /// let b = TwoIndependentMultiplyShift::from_seeds(3, 7);
    /// assert_eq!(a.hash(42), b.hash(42));
    /// ```
    pub fn from_seeds(multiply: u128, add: u128) -> Self {
        TwoIndependentMultiplyShift { multiply, add }
    }
}

impl HashFamily for TwoIndependentMultiplyShift {
    fn hash(&self, key: u64) -> u64 {
        (self.add.wrapping_add(self.multiply.wrapping_mul(u128::from(key))) >> 64) as u64
    }
}

const TABULATION_TABLES: usize = 8;
const TABULATION_ROW: usize = 1 << 8;

/// Simple tabulation hashing.
///
/// Holds eight tables of 256 uniformly random 64-bit entries and XORs one
/// entry per key byte. Slower to seed than multiply-shift (16 KiB of random
/// state) but three-independent. See Pătraşcu and Thorup, "The Power of
/// Simple Tabulation Hashing".
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SimpleTabulation {
    tables: Vec<u64>,
}

impl SimpleTabulation {
    /// Constructs a `SimpleTabulation` with tables drawn from the
    /// thread-local entropy source.
    pub fn from_entropy() -> Self {
        let mut rng = rand::thread_rng();
        SimpleTabulation {
            tables: (0..TABULATION_TABLES * TABULATION_ROW)
                .map(|_| rng.gen())
                .collect(),
        }
    }

    /// Constructs a `SimpleTabulation` with tables derived from `seed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::{HashFamily, SimpleTabulation};
    ///
    /// let a = SimpleTabulation::from_seed(99);
    /// let b = SimpleTabulation::from_seed(99);
    /// assert_eq!(a.hash(42), b.hash(42));
    /// ```
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        SimpleTabulation {
            tables: (0..TABULATION_TABLES * TABULATION_ROW)
                .map(|_| rng.gen())
                .collect(),
        }
    }
}

impl HashFamily for SimpleTabulation {
    fn hash(&self, key: u64) -> u64 {
        let mut result = 0;
        for i in 0..TABULATION_TABLES {
            let byte = (key >> (8 * i)) & 0xff;
            result ^= self.tables[(i << 8) | byte as usize];
        }
        result
    }
}
