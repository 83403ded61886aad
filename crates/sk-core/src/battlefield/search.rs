//! The shuffled tile-search pattern used by cover and fire-point searches.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::map::BattleMap;
use crate::consts::SEARCH_SPAN;

/// Lazily rebuilt cache of the 11x11 offset sweep, shuffled once per map.
///
/// The shuffle is keyed on the map generation token so the pattern is stable
/// for a given map regardless of how many battle-RNG draws happened, and is
/// rebuilt automatically when the terrain changes shape. Staleness can only
/// degrade search quality, never correctness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileSearchPattern {
    generation: u64,
    offsets: Vec<(i32, i32)>,
}

impl TileSearchPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shuffled offsets for this map, rebuilding if the map changed.
    pub fn offsets(&mut self, map: &BattleMap) -> &[(i32, i32)] {
        if self.offsets.is_empty() || self.generation != map.generation() {
            self.rebuild(map.generation());
        }
        &self.offsets
    }

    fn rebuild(&mut self, generation: u64) {
        self.generation = generation;
        self.offsets.clear();
        for dy in -SEARCH_SPAN..=SEARCH_SPAN {
            for dx in -SEARCH_SPAN..=SEARCH_SPAN {
                self.offsets.push((dx, dy));
            }
        }
        let mut rng = ChaCha8Rng::seed_from_u64(generation);
        self.offsets.shuffle(&mut rng);
    }
}
