//! Line-of-sight and line-of-fire queries.
//!
//! Sight is computed at tile granularity with a 3D line walk: walls block
//! outright, smoke accumulates along the line until it blots the target
//! out, and everything is capped at [`MAX_VIEW_DISTANCE`].

use crate::battlefield::{BattleMap, Position};
use crate::consts::{MAX_VIEW_DISTANCE, SMOKE_SIGHT_BUDGET};
use crate::unit::{Unit, UnitId};

/// Where a unit's eyes are. Kept as a function so a later body-height model
/// only touches this one seam.
pub fn sight_origin(unit: &Unit) -> Position {
    unit.pos
}

/// Every tile on the line from `from` to `to`, endpoints excluded.
///
/// Integer DDA along the dominant axis; minor axes advance by rounded
/// interpolation, which keeps the walk symmetric in both directions.
fn line_tiles(from: Position, to: Position) -> Vec<Position> {
    let delta = to - from;
    let steps = delta.x.abs().max(delta.y.abs()).max(delta.z.abs()) as i64;
    let mut tiles = Vec::new();
    if steps <= 1 {
        return tiles;
    }
    let lerp = |a: i32, d: i32, i: i64| -> i32 {
        let num = d as i64 * i * 2 + steps * d.signum() as i64;
        a + (num / (steps * 2)) as i32
    };
    for i in 1..steps {
        let cursor = Position::new(
            lerp(from.x, delta.x, i),
            lerp(from.y, delta.y, i),
            lerp(from.z, delta.z, i),
        );
        if cursor != from && cursor != to {
            tiles.push(cursor);
        }
    }
    tiles
}

/// Can `observer` see the tile at `target`?
pub fn visible(map: &BattleMap, observer: &Unit, target: Position) -> bool {
    if !map.contains(target) {
        return false;
    }
    let origin = sight_origin(observer);
    if origin.distance(target) > MAX_VIEW_DISTANCE {
        return false;
    }
    let mut smoke: i32 = 0;
    for pos in line_tiles(origin, target) {
        match map.tile(pos) {
            Some(tile) => {
                if tile.blocks_sight() {
                    return false;
                }
                smoke += tile.smoke as i32;
                if smoke > SMOKE_SIGHT_BUDGET {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Is there a clear line of fire from `origin` to the tile at `target`?
///
/// Standing units on intermediate tiles block the shot, except the
/// attacker itself and `exclude` (used for "would I be exposed if I stood
/// over there" checks). A unit on the target tile is the target, not an
/// obstruction.
pub fn can_target(
    map: &BattleMap,
    units: &[Unit],
    origin: Position,
    target: Position,
    attacker: UnitId,
    exclude: Option<UnitId>,
) -> bool {
    if !map.contains(target) || origin.distance(target) > MAX_VIEW_DISTANCE {
        return false;
    }
    for pos in line_tiles(origin, target) {
        match map.tile(pos) {
            Some(tile) if !tile.blocks_sight() => {}
            _ => return false,
        }
        let blocked = units.iter().any(|u| {
            u.pos == pos && !u.is_out() && u.id != attacker && Some(u.id) != exclude
        });
        if blocked {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::Tile;
    use crate::unit::{Faction, UnitStats};

    fn observer(pos: Position) -> Unit {
        Unit::new(UnitId(0), Faction::Hostile, pos, UnitStats::rank_and_file())
    }

    #[test]
    fn test_open_ground_is_visible() {
        let map = BattleMap::new(20, 20, 1);
        let unit = observer(Position::new(0, 0, 0));
        assert!(visible(&map, &unit, Position::new(10, 0, 0)));
        assert!(visible(&map, &unit, Position::new(7, 9, 0)));
    }

    #[test]
    fn test_view_distance_cap() {
        let map = BattleMap::new(40, 4, 1);
        let unit = observer(Position::new(0, 0, 0));
        assert!(visible(&map, &unit, Position::new(20, 0, 0)));
        assert!(!visible(&map, &unit, Position::new(21, 0, 0)));
    }

    #[test]
    fn test_wall_blocks_sight() {
        let mut map = BattleMap::new(10, 3, 1);
        map.set_tile(Position::new(4, 1, 0), Tile::wall());
        let unit = observer(Position::new(0, 1, 0));
        assert!(!visible(&map, &unit, Position::new(8, 1, 0)));
        assert!(visible(&map, &unit, Position::new(3, 1, 0)));
    }

    #[test]
    fn test_smoke_accumulates() {
        let mut map = BattleMap::new(12, 1, 1);
        for x in 2..8 {
            map.tile_mut(Position::new(x, 0, 0)).unwrap().smoke = 3;
        }
        let unit = observer(Position::new(0, 0, 0));
        // a couple of smoky tiles are see-through, a bank of them is not
        assert!(visible(&map, &unit, Position::new(4, 0, 0)));
        assert!(!visible(&map, &unit, Position::new(10, 0, 0)));
    }

    #[test]
    fn test_units_block_fire_but_not_target_tile() {
        let map = BattleMap::new(10, 1, 1);
        let shooter = observer(Position::new(0, 0, 0));
        let mut screen = observer(Position::new(3, 0, 0));
        screen.id = UnitId(1);
        let units = vec![screen];
        // shot through the screening unit is blocked
        assert!(!can_target(
            &map,
            &units,
            shooter.pos,
            Position::new(6, 0, 0),
            shooter.id,
            None,
        ));
        // the screening unit itself is a fair target
        assert!(can_target(
            &map,
            &units,
            shooter.pos,
            Position::new(3, 0, 0),
            shooter.id,
            None,
        ));
        // excluding the screen reopens the lane
        assert!(can_target(
            &map,
            &units,
            shooter.pos,
            Position::new(6, 0, 0),
            shooter.id,
            Some(UnitId(1)),
        ));
    }
}
