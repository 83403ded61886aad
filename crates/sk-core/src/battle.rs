//! The battle session: map, unit arena, node graph and RNG.

use serde::{Deserialize, Serialize};

use crate::battlefield::{BattleMap, NodeGraph, Position, TileSearchPattern};
use crate::rng::BattleRng;
use crate::unit::{Unit, UnitId};

/// Everything the behavior engine consults and mutates during a turn.
///
/// Units live in an arena and are addressed by [`UnitId`]; every lookup is
/// validated, so a stale id is an ordinary "not found", never a dangling
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub map: BattleMap,
    pub nodes: NodeGraph,
    pub rng: BattleRng,
    pub(crate) units: Vec<Unit>,
    pub(crate) tile_search: TileSearchPattern,
    pub turn: u32,
}

impl Battle {
    pub fn new(map: BattleMap, nodes: NodeGraph, seed: u64) -> Self {
        Self {
            map,
            nodes,
            rng: BattleRng::new(seed),
            units: Vec::new(),
            tile_search: TileSearchPattern::new(),
            turn: 1,
        }
    }

    /// Add a unit to the arena, assigning its id.
    pub fn add_unit(&mut self, mut unit: Unit) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        unit.id = id;
        self.units.push(unit);
        id
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.0 as usize)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id.0 as usize)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// The standing unit on `pos`, if any.
    pub fn unit_at(&self, pos: Position) -> Option<&Unit> {
        self.units.iter().find(|u| u.pos == pos && !u.is_out())
    }

    /// The shuffled tile-search offsets for the current map.
    ///
    /// Returned by value so callers can keep drawing from the RNG while
    /// iterating; the list is 121 entries, the copy is cheap.
    pub fn search_offsets(&mut self) -> Vec<(i32, i32)> {
        self.tile_search.offsets(&self.map).to_vec()
    }

    /// Begin a new turn: refresh TU budgets, age spotted counters and burn
    /// down fires.
    pub fn advance_turn(&mut self) {
        self.turn += 1;
        for unit in &mut self.units {
            unit.start_turn();
        }
        self.map.age_fires();
    }
}
