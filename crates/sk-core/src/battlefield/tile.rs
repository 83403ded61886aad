//! Battlefield tiles.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Static tile properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TileFlags: u8 {
        /// Solid terrain: blocks movement and sight.
        const WALL = 0x01;
        /// Blocks sight but not movement (dense foliage, curtains).
        const BLOCKS_SIGHT = 0x02;
        /// No floor at this level; only flyers may occupy it.
        const NO_FLOOR = 0x04;
        /// Climbable link to the level above.
        const LADDER = 0x08;
        /// Marked as a likely blast zone this turn.
        const DANGEROUS = 0x10;
    }
}

/// One tile of the battlefield grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub flags: TileFlags,
    /// Turns of fire remaining on this tile.
    pub fire: u8,
    /// Smoke density, attenuates sight lines through it.
    pub smoke: u8,
}

impl Tile {
    /// An open, walkable floor tile.
    pub fn open() -> Self {
        Self::default()
    }

    /// A solid wall tile.
    pub fn wall() -> Self {
        Self {
            flags: TileFlags::WALL,
            ..Self::default()
        }
    }

    pub fn blocks_sight(&self) -> bool {
        self.flags
            .intersects(TileFlags::WALL | TileFlags::BLOCKS_SIGHT)
    }

    pub fn blocks_movement(&self) -> bool {
        self.flags.contains(TileFlags::WALL)
    }

    pub fn has_floor(&self) -> bool {
        !self.flags.contains(TileFlags::NO_FLOOR)
    }

    pub fn on_fire(&self) -> bool {
        self.fire > 0
    }

    pub fn dangerous(&self) -> bool {
        self.flags.contains(TileFlags::DANGEROUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_tile_defaults() {
        let tile = Tile::open();
        assert!(!tile.blocks_sight());
        assert!(!tile.blocks_movement());
        assert!(tile.has_floor());
        assert!(!tile.on_fire());
    }

    #[test]
    fn test_wall_blocks_both() {
        let tile = Tile::wall();
        assert!(tile.blocks_sight());
        assert!(tile.blocks_movement());
    }

    #[test]
    fn test_smoke_screen_blocks_sight_only() {
        let tile = Tile {
            flags: TileFlags::BLOCKS_SIGHT,
            ..Tile::default()
        };
        assert!(tile.blocks_sight());
        assert!(!tile.blocks_movement());
    }
}
