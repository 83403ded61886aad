//! Route and reachability queries over the tile grid.
//!
//! All queries are pure functions over the map and unit arena; a [`Route`]
//! is a value, produced fresh per call. Unreachability is an ordinary
//! result, signalled by [`NO_DIRECTION`], never an error.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::battlefield::{BattleMap, Position, TileIndex};
use crate::unit::{Unit, UnitId};

/// Start-direction sentinel: no route exists.
pub const NO_DIRECTION: i32 = -1;

/// TU cost of a straight horizontal step.
const STRAIGHT_COST: i32 = 4;
/// TU cost of a diagonal step.
const DIAGONAL_COST: i32 = 6;
/// TU cost of a vertical step.
const VERTICAL_COST: i32 = 8;

/// The eight compass directions, clockwise from north, then up and down.
const DIRECTIONS: [(i32, i32, i32); 10] = [
    (0, -1, 0),
    (1, -1, 0),
    (1, 0, 0),
    (1, 1, 0),
    (0, 1, 0),
    (-1, 1, 0),
    (-1, 0, 0),
    (-1, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// A computed route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Direction code of the first step, or [`NO_DIRECTION`].
    pub start_direction: i32,
    /// Total TU cost of walking the route.
    pub total_tu: i32,
    /// Every tile on the route, excluding the start.
    pub steps: Vec<Position>,
}

impl Route {
    pub fn unreachable() -> Self {
        Self {
            start_direction: NO_DIRECTION,
            total_tu: 0,
            steps: Vec::new(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.start_direction != NO_DIRECTION
    }
}

/// Direction code for a single-step move, mirroring [`DIRECTIONS`].
fn direction_of(from: Position, to: Position) -> i32 {
    let delta = (to.x - from.x, to.y - from.y, to.z - from.z);
    DIRECTIONS
        .iter()
        .position(|&d| d == delta)
        .map_or(NO_DIRECTION, |i| i as i32)
}

/// Is `pos` blocked by a standing unit other than `mover` (and `through`)?
fn occupied(units: &[Unit], pos: Position, mover: UnitId, through: Option<UnitId>) -> bool {
    units.iter().any(|u| {
        u.pos == pos && !u.is_out() && u.id != mover && Some(u.id) != through
    })
}

/// TU cost of stepping from `from` to an adjacent `to`, or `None` if the
/// step is impossible for this unit.
fn step_cost(map: &BattleMap, unit: &Unit, from: Position, to: Position) -> Option<i32> {
    let to_tile = map.tile(to)?;
    if to_tile.blocks_movement() {
        return None;
    }
    if to.z != from.z {
        // vertical movement: flyers go anywhere, walkers need a ladder link
        let lower = if to.z > from.z { from } else { to };
        let has_ladder = map
            .tile(lower)
            .is_some_and(|t| t.flags.contains(crate::battlefield::TileFlags::LADDER));
        if !unit.flying && !has_ladder {
            return None;
        }
        return Some(VERTICAL_COST);
    }
    if !unit.flying && !to_tile.has_floor() {
        return None;
    }
    if to.x != from.x && to.y != from.y {
        Some(DIAGONAL_COST)
    } else {
        Some(STRAIGHT_COST)
    }
}

/// Every tile index this unit can reach within `tu_budget`.
///
/// The result is sorted so membership checks can binary-search it.
pub fn find_reachable(
    map: &BattleMap,
    units: &[Unit],
    unit: &Unit,
    tu_budget: i32,
) -> Vec<TileIndex> {
    let Some(start) = map.tile_index(unit.pos) else {
        return Vec::new();
    };
    let total = (map.width() * map.height() * map.depth()) as usize;
    let mut cost = vec![i32::MAX; total];
    cost[start] = 0;
    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0, unit.pos)));

    while let Some(Reverse((c, pos))) = heap.pop() {
        let idx = map.tile_index(pos).expect("visited positions are in bounds");
        if c > cost[idx] {
            continue;
        }
        for &(dx, dy, dz) in &DIRECTIONS {
            let next = pos + Position::new(dx, dy, dz);
            let Some(step) = step_cost(map, unit, pos, next) else {
                continue;
            };
            if occupied(units, next, unit.id, None) {
                continue;
            }
            let next_cost = c + step;
            if next_cost > tu_budget {
                continue;
            }
            let next_idx = map.tile_index(next).expect("step stayed in bounds");
            if next_cost < cost[next_idx] {
                cost[next_idx] = next_cost;
                heap.push(Reverse((next_cost, next)));
            }
        }
    }

    let mut reachable: Vec<TileIndex> = cost
        .iter()
        .enumerate()
        .filter(|(_, &c)| c != i32::MAX)
        .map(|(i, _)| i)
        .collect();
    reachable.sort_unstable();
    reachable
}

/// Membership check against a sorted reachable set.
pub fn reachable_contains(reachable: &[TileIndex], idx: TileIndex) -> bool {
    reachable.binary_search(&idx).is_ok()
}

/// Compute a route from the unit's position to `target`.
///
/// `through` names a unit the route may pass through (a melee target, say).
/// `tu_budget` caps the route cost when given; otherwise the whole map is
/// fair game. A route to the unit's own tile is empty and reports
/// [`NO_DIRECTION`], which callers treat as "already there".
pub fn calculate(
    map: &BattleMap,
    units: &[Unit],
    unit: &Unit,
    target: Position,
    through: Option<UnitId>,
    tu_budget: Option<i32>,
) -> Route {
    if !map.contains(target) || target == unit.pos {
        return Route::unreachable();
    }
    let budget = tu_budget.unwrap_or(i32::MAX / 2);
    let total = (map.width() * map.height() * map.depth()) as usize;
    let start = match map.tile_index(unit.pos) {
        Some(i) => i,
        None => return Route::unreachable(),
    };
    let goal = match map.tile_index(target) {
        Some(i) => i,
        None => return Route::unreachable(),
    };

    let mut cost = vec![i32::MAX; total];
    let mut prev: Vec<Option<Position>> = vec![None; total];
    cost[start] = 0;
    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0, unit.pos)));

    while let Some(Reverse((c, pos))) = heap.pop() {
        let idx = map.tile_index(pos).expect("visited positions are in bounds");
        if idx == goal {
            break;
        }
        if c > cost[idx] {
            continue;
        }
        for &(dx, dy, dz) in &DIRECTIONS {
            let next = pos + Position::new(dx, dy, dz);
            let Some(step) = step_cost(map, unit, pos, next) else {
                continue;
            };
            if occupied(units, next, unit.id, through) {
                continue;
            }
            let next_cost = c + step;
            if next_cost > budget {
                continue;
            }
            let next_idx = map.tile_index(next).expect("step stayed in bounds");
            if next_cost < cost[next_idx] {
                cost[next_idx] = next_cost;
                prev[next_idx] = Some(pos);
                heap.push(Reverse((next_cost, next)));
            }
        }
    }

    if cost[goal] == i32::MAX {
        return Route::unreachable();
    }

    let mut steps = Vec::new();
    let mut cursor = target;
    while cursor != unit.pos {
        steps.push(cursor);
        let idx = map.tile_index(cursor).expect("route stays in bounds");
        cursor = prev[idx].expect("every routed tile has a predecessor");
    }
    steps.reverse();

    Route {
        start_direction: direction_of(unit.pos, steps[0]),
        total_tu: cost[goal],
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::{Tile, TileFlags};
    use crate::unit::{Faction, UnitStats};

    fn walker(pos: Position) -> Unit {
        Unit::new(UnitId(0), Faction::Hostile, pos, UnitStats::rank_and_file())
    }

    #[test]
    fn test_straight_route_cost() {
        let map = BattleMap::new(10, 10, 1);
        let unit = walker(Position::new(1, 1, 0));
        let route = calculate(&map, &[], &unit, Position::new(4, 1, 0), None, None);
        assert!(route.is_reachable());
        assert_eq!(route.total_tu, 3 * STRAIGHT_COST);
        assert_eq!(route.steps.len(), 3);
        // due east is direction 2
        assert_eq!(route.start_direction, 2);
    }

    #[test]
    fn test_route_to_self_is_empty() {
        let map = BattleMap::new(10, 10, 1);
        let unit = walker(Position::new(1, 1, 0));
        let route = calculate(&map, &[], &unit, Position::new(1, 1, 0), None, None);
        assert!(!route.is_reachable());
        assert!(route.steps.is_empty());
    }

    #[test]
    fn test_wall_forces_detour() {
        let mut map = BattleMap::new(5, 3, 1);
        // wall across the middle column except the top row
        map.set_tile(Position::new(2, 1, 0), Tile::wall());
        map.set_tile(Position::new(2, 2, 0), Tile::wall());
        let unit = walker(Position::new(0, 1, 0));
        let route = calculate(&map, &[], &unit, Position::new(4, 1, 0), None, None);
        assert!(route.is_reachable());
        assert!(route.total_tu > 4 * STRAIGHT_COST);
    }

    #[test]
    fn test_sealed_target_unreachable() {
        let mut map = BattleMap::new(5, 5, 1);
        for y in 0..5 {
            map.set_tile(Position::new(2, y, 0), Tile::wall());
        }
        let unit = walker(Position::new(0, 2, 0));
        let route = calculate(&map, &[], &unit, Position::new(4, 2, 0), None, None);
        assert!(!route.is_reachable());
    }

    #[test]
    fn test_units_block_routes() {
        let map = BattleMap::new(3, 1, 1);
        let unit = walker(Position::new(0, 0, 0));
        let mut blocker = walker(Position::new(1, 0, 0));
        blocker.id = UnitId(1);
        let route = calculate(
            &map,
            std::slice::from_ref(&blocker),
            &unit,
            Position::new(2, 0, 0),
            None,
            None,
        );
        assert!(!route.is_reachable());
        // unless we're told to path through them
        let route = calculate(
            &map,
            std::slice::from_ref(&blocker),
            &unit,
            Position::new(2, 0, 0),
            Some(UnitId(1)),
            None,
        );
        assert!(route.is_reachable());
    }

    #[test]
    fn test_budget_caps_route() {
        let map = BattleMap::new(10, 1, 1);
        let unit = walker(Position::new(0, 0, 0));
        let route = calculate(&map, &[], &unit, Position::new(5, 0, 0), None, Some(8));
        assert!(!route.is_reachable());
        let route = calculate(&map, &[], &unit, Position::new(2, 0, 0), None, Some(8));
        assert!(route.is_reachable());
    }

    #[test]
    fn test_find_reachable_respects_budget() {
        let map = BattleMap::new(9, 9, 1);
        let unit = walker(Position::new(4, 4, 0));
        let reachable = find_reachable(&map, &[], &unit, STRAIGHT_COST);
        // one straight step in each of four directions, four diagonals are
        // too expensive, plus the start tile
        assert_eq!(reachable.len(), 5);
        let own = map.tile_index(unit.pos).unwrap();
        assert!(reachable_contains(&reachable, own));
    }

    #[test]
    fn test_walkers_need_ladders_flyers_do_not() {
        let mut map = BattleMap::new(3, 3, 2);
        let unit = walker(Position::new(1, 1, 0));
        let above = Position::new(1, 1, 1);
        let route = calculate(&map, &[], &unit, above, None, None);
        assert!(!route.is_reachable());

        let mut flyer = walker(Position::new(1, 1, 0));
        flyer.flying = true;
        let route = calculate(&map, &[], &flyer, above, None, None);
        assert!(route.is_reachable());
        assert_eq!(route.total_tu, VERTICAL_COST);

        map.add_flags(Position::new(1, 1, 0), TileFlags::LADDER);
        let route = calculate(&map, &[], &unit, above, None, None);
        assert!(route.is_reachable());
    }
}
