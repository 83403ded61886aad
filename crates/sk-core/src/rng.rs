//! Random number generation for battle decisions.
//!
//! Wraps the xorshift64* generator from `sk-rng` with the inclusive-range
//! helpers the behavior code wants. The full generator state serializes, so
//! a battle restored from a save continues the exact same stream.

use serde::{Deserialize, Serialize};
use sk_rng::Xorshift64;

/// Battle random number generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRng {
    rng: Xorshift64,
    seed: u64,
}

impl BattleRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xorshift64::new(seed),
            seed,
        }
    }

    /// The seed used to create this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw in `min..=max`. Returns `min` if the range is inverted.
    pub fn generate(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max - min) as u64 + 1;
        min + self.rng.below(span) as i32
    }

    /// Returns true with probability `percent`/100.
    pub fn percent(&mut self, percent: i32) -> bool {
        if percent <= 0 {
            return false;
        }
        self.generate(0, 99) < percent
    }

    /// Returns true with probability 1/n.
    pub fn one_in(&mut self, n: i32) -> bool {
        n > 0 && self.generate(0, n - 1) == 0
    }

    /// Choose a random element from a slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.generate(0, items.len() as i32 - 1) as usize])
        }
    }

    /// Shuffle a slice in place (Fisher-Yates).
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.generate(0, i as i32) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for BattleRng {
    fn default() -> Self {
        Self::new(0x5EED)
    }
}
