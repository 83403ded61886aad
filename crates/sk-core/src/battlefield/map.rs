//! The battlefield tile grid.

use serde::{Deserialize, Serialize};

use super::pos::Position;
use super::tile::{Tile, TileFlags};

/// Dense index of a tile within the map's backing store.
pub type TileIndex = usize;

/// A 3D grid of tiles.
///
/// The `generation` token changes whenever the terrain changes shape; caches
/// derived from the map (like the shuffled tile-search pattern) key on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleMap {
    width: i32,
    height: i32,
    depth: i32,
    tiles: Vec<Tile>,
    generation: u64,
}

impl BattleMap {
    /// Create a map of open floor tiles.
    pub fn new(width: i32, height: i32, depth: i32) -> Self {
        assert!(width > 0 && height > 0 && depth > 0);
        Self {
            width,
            height,
            depth,
            tiles: vec![Tile::open(); (width * height * depth) as usize],
            generation: 1,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.x < self.width
            && pos.y >= 0
            && pos.y < self.height
            && pos.z >= 0
            && pos.z < self.depth
    }

    /// Dense index of a position, or `None` when off the map.
    pub fn tile_index(&self, pos: Position) -> Option<TileIndex> {
        if !self.contains(pos) {
            return None;
        }
        Some(((pos.z * self.height + pos.y) * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: Position) -> Option<&Tile> {
        self.tile_index(pos).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.tile_index(pos).map(move |i| &mut self.tiles[i])
    }

    /// Replace a tile wholesale, bumping the generation token when the
    /// terrain shape changes.
    pub fn set_tile(&mut self, pos: Position, tile: Tile) {
        if let Some(i) = self.tile_index(pos) {
            let shape_changed = self.tiles[i].flags != tile.flags;
            self.tiles[i] = tile;
            if shape_changed {
                self.generation += 1;
            }
        }
    }

    /// Add flags to a tile (convenience for map setup).
    pub fn add_flags(&mut self, pos: Position, flags: TileFlags) {
        if let Some(i) = self.tile_index(pos) {
            self.tiles[i].flags |= flags;
            self.generation += 1;
        }
    }

    /// Set a tile burning for `turns` turns.
    pub fn ignite(&mut self, pos: Position, turns: u8) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.fire = turns;
        }
    }

    /// Burn down fires by one turn.
    pub fn age_fires(&mut self) {
        for tile in &mut self.tiles {
            tile.fire = tile.fire.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let map = BattleMap::new(10, 8, 2);
        assert!(map.contains(Position::new(0, 0, 0)));
        assert!(map.contains(Position::new(9, 7, 1)));
        assert!(!map.contains(Position::new(10, 0, 0)));
        assert!(!map.contains(Position::new(0, -1, 0)));
        assert!(!map.contains(Position::new(0, 0, 2)));
    }

    #[test]
    fn test_tile_index_unique() {
        let map = BattleMap::new(4, 3, 2);
        let mut seen = std::collections::HashSet::new();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    let idx = map.tile_index(Position::new(x, y, z)).unwrap();
                    assert!(seen.insert(idx));
                }
            }
        }
        assert_eq!(seen.len(), 24);
    }

    #[test]
    fn test_generation_bumps_on_shape_change() {
        let mut map = BattleMap::new(4, 4, 1);
        let before = map.generation();
        map.set_tile(Position::new(1, 1, 0), Tile::wall());
        assert!(map.generation() > before);

        // fire does not reshape the terrain
        let before = map.generation();
        map.ignite(Position::new(2, 2, 0), 3);
        assert_eq!(map.generation(), before);
    }
}
