//! Tile-grid positions and distance math.

use core::ops::{Add, AddAssign, Sub};
use serde::{Deserialize, Serialize};

/// A position on the battlefield, in whole tiles. The `Ord` impl is the
/// plain lexicographic one, for use in ordered containers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Horizontal distance, rounded up. Elevation is ignored: a unit one
    /// floor up is tactically "here", not "far".
    pub fn distance(self, other: Position) -> i32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt().ceil() as i32
    }

    /// Squared distance including elevation, for cheap comparisons.
    pub fn distance_sq(self, other: Position) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// True when the two positions touch, including diagonals, on one level.
    pub fn adjacent(self, other: Position) -> bool {
        self.z == other.z
            && self != other
            && (self.x - other.x).abs() <= 1
            && (self.y - other.y).abs() <= 1
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}
