//! Cover search: find somewhere safer to stand, within half a turn's TUs.

use tracing::{debug, trace};

use super::{spotting_units, ActionKind};
use crate::battle::Battle;
use crate::battlefield::Position;
use crate::consts::{
    BASE_DESPERATE_SCORE, BASE_SYSTEMATIC_SCORE, DISTANCE_WEIGHT, ESCAPE_FAST_PASS,
    ESCAPE_SEARCH_CAP, EXPOSURE_PENALTY, FIRE_PENALTY, SCORE_SENTINEL, STAY_PUT_BONUS,
    SYSTEMATIC_TRIES,
};
use crate::pathfind::{self, reachable_contains};
use crate::unit::{Faction, Unit};

/// Result of a cover search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapePlan {
    pub kind: ActionKind,
    pub target: Position,
    /// True TU cost of walking there; 0 when staying put.
    pub tus: i32,
    /// Score of the winning candidate, for diagnostics and tests.
    pub score: i32,
}

/// Score candidate tiles and pick the best reachable one.
///
/// Phase one sweeps the shuffled search pattern around the unit; phase two
/// gives up on method and flings bounded random offsets, including a level
/// up or down. Moving away from the threat is rewarded, extra spotters and
/// burning tiles are penalized, and tiles outside the map score below the
/// sentinel so they can never win. `stride` widens the sweep steps for
/// units that should not spend much thought on this (civilians).
pub fn setup_escape(
    battle: &mut Battle,
    me: &Unit,
    threat: Option<Position>,
    spotting_enemies: i32,
    spotter_faction: Faction,
    known_cap: Option<i32>,
    stride: usize,
) -> EscapePlan {
    let tu_budget = me.tu / 2;
    let reachable = pathfind::find_reachable(&battle.map, &battle.units, me, tu_budget);
    let offsets = battle.search_offsets();
    let units_spotting_me = spotting_units(battle, me, me.pos, spotter_faction, known_cap);
    let base_dist = threat.map_or(0, |t| t.distance(me.pos));

    let mut best_score = SCORE_SENTINEL;
    let mut best_target = me.pos;
    let mut best_tus = 0;
    let mut cover_found = false;

    let mut tries = 0usize;
    while tries < ESCAPE_SEARCH_CAP && !cover_found {
        let mut candidate = me.pos;
        let mut score;

        if tries < SYSTEMATIC_TRIES {
            let (dx, dy) = offsets[tries];
            candidate.x += dx;
            candidate.y += dy;
            score = BASE_SYSTEMATIC_SCORE;
            if candidate == me.pos {
                if units_spotting_me > 0 {
                    // standing still under observation is asking for it
                    candidate.x += battle.rng.generate(-20, 20);
                    candidate.y += battle.rng.generate(-20, 20);
                } else {
                    score += STAY_PUT_BONUS;
                }
            }
        } else {
            // past method now, run anywhere
            score = BASE_DESPERATE_SCORE;
            candidate.x += battle.rng.generate(-10, 10);
            candidate.y += battle.rng.generate(-10, 10);
            candidate.z += battle.rng.generate(-1, 1);
            if candidate.z < 0 {
                candidate.z = 0;
            } else if candidate.z >= battle.map.depth() {
                candidate.z = me.pos.z;
            }
        }
        tries += stride;

        let dist_from_threat = threat.map_or(0, |t| t.distance(candidate));
        score += (dist_from_threat - base_dist) * DISTANCE_WEIGHT;

        let in_bounds = battle.map.contains(candidate);
        if !in_bounds {
            // no fleeing off the edge of the battlefield
            score = SCORE_SENTINEL - 1;
        } else {
            let Some(idx) = battle.map.tile_index(candidate) else {
                continue;
            };
            if !reachable_contains(&reachable, idx) {
                continue;
            }
            let spotters = spotting_units(battle, me, candidate, spotter_faction, known_cap);
            if spotting_enemies > 0 || spotters > 0 {
                if spotting_enemies <= spotters {
                    // giving away our position costs extra
                    score -= (1 + spotters - spotting_enemies) * EXPOSURE_PENALTY;
                } else {
                    score += (spotting_enemies - spotters) * EXPOSURE_PENALTY;
                }
            }
            let tile = battle.map.tile(candidate).expect("candidate is in bounds");
            if tile.on_fire() {
                score -= FIRE_PENALTY;
            }
            if tile.dangerous() {
                score -= BASE_SYSTEMATIC_SCORE;
            }
            trace!(
                unit = me.id.0,
                %candidate,
                score,
                spotters,
                "cover candidate"
            );
        }

        if in_bounds && score > best_score {
            let route = pathfind::calculate(
                &battle.map,
                &battle.units,
                me,
                candidate,
                None,
                Some(tu_budget),
            );
            if candidate == me.pos || route.is_reachable() {
                best_score = score;
                best_target = candidate;
                best_tus = if candidate == me.pos { 0 } else { route.total_tu };
            }
            if best_score > ESCAPE_FAST_PASS {
                // good enough, go
                cover_found = true;
            }
        }
    }

    if best_score <= SCORE_SENTINEL {
        debug!(unit = me.id.0, "cover search failed");
        return EscapePlan {
            kind: ActionKind::Rethink,
            target: me.pos,
            tus: 0,
            score: best_score,
        };
    }
    debug!(
        unit = me.id.0,
        target = %best_target,
        score = best_score,
        tus = best_tus,
        "cover found"
    );
    EscapePlan {
        kind: ActionKind::Walk,
        target: best_target,
        tus: best_tus,
        score: best_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::{BattleMap, NodeGraph, Tile};
    use crate::unit::{UnitId, UnitStats};

    fn arena(width: i32, height: i32) -> Battle {
        Battle::new(BattleMap::new(width, height, 1), NodeGraph::default(), 3)
    }

    fn hostile(battle: &mut Battle, pos: Position) -> Unit {
        let id = battle.add_unit(Unit::new(
            UnitId(0),
            Faction::Hostile,
            pos,
            UnitStats::rank_and_file(),
        ));
        battle.unit(id).unwrap().clone()
    }

    #[test]
    fn test_runs_away_from_threat() {
        let mut battle = arena(24, 9);
        let me = hostile(&mut battle, Position::new(12, 4, 0));
        let threat = Position::new(20, 4, 0);

        let plan = setup_escape(&mut battle, &me, Some(threat), 0, Faction::Player, None, 1);
        assert_eq!(plan.kind, ActionKind::Walk);
        assert!(
            plan.target.distance(threat) >= me.pos.distance(threat),
            "fled toward the threat: {} -> {}",
            me.pos,
            plan.target
        );
    }

    #[test]
    fn test_cornered_and_watched_unit_fails_cleanly() {
        use crate::battlefield::TileFlags;

        let mut battle = arena(12, 7);
        // box the unit in; the eastern gap has no floor, so sight passes
        // through it but walking does not
        for x in 2..=4 {
            for y in 2..=4 {
                if x != 3 || y != 3 {
                    battle.map.set_tile(Position::new(x, y, 0), Tile::wall());
                }
            }
        }
        battle.map.set_tile(Position::new(4, 3, 0), Tile::open());
        battle.map.add_flags(Position::new(4, 3, 0), TileFlags::NO_FLOOR);
        let me = hostile(&mut battle, Position::new(3, 3, 0));
        let watcher = battle.add_unit(Unit::new(
            UnitId(0),
            Faction::Player,
            Position::new(8, 3, 0),
            UnitStats::veteran(),
        ));
        let threat = battle.unit(watcher).unwrap().pos;

        // watched, so the stay-put candidate is nudged away; everything the
        // nudge lands on is unreachable, so the usual outcome is Rethink.
        // failure must never surface as a sentinel-scored walk.
        for _ in 0..10 {
            let plan = setup_escape(&mut battle, &me, Some(threat), 1, Faction::Player, None, 1);
            if plan.kind == ActionKind::Walk {
                assert!(plan.score > SCORE_SENTINEL);
                assert_eq!(plan.target, me.pos);
            } else {
                assert_eq!(plan.kind, ActionKind::Rethink);
            }
        }
    }

    #[test]
    fn test_never_reports_walk_at_sentinel_score() {
        let mut battle = arena(5, 5);
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        for _ in 0..20 {
            let plan = setup_escape(&mut battle, &me, None, 0, Faction::Player, None, 1);
            if plan.kind == ActionKind::Walk {
                assert!(plan.score > SCORE_SENTINEL);
            }
        }
    }

    #[test]
    fn test_fire_tiles_are_penalized() {
        let mut battle = arena(9, 3);
        // everything east of the unit burns; west is clear
        for x in 5..9 {
            for y in 0..3 {
                battle.map.ignite(Position::new(x, y, 0), 3);
            }
        }
        let me = hostile(&mut battle, Position::new(4, 1, 0));
        let threat = Position::new(0, 1, 0);

        // fleeing the threat points east into the fire; the penalty should
        // still leave an unburned pick if one scores comparably
        let plan = setup_escape(&mut battle, &me, Some(threat), 0, Faction::Player, None, 1);
        assert_eq!(plan.kind, ActionKind::Walk);
        let tile = battle.map.tile(plan.target).unwrap();
        if tile.on_fire() {
            // if it still chose fire, the distance gain must have paid for it
            assert!(plan.score >= BASE_SYSTEMATIC_SCORE);
        }
    }

    #[test]
    fn test_civilian_stride_caps_evaluations() {
        let mut battle = arena(9, 9);
        let me = hostile(&mut battle, Position::new(4, 4, 0));
        // stride 10 must terminate well inside the cap and still decide
        let plan = setup_escape(&mut battle, &me, None, 0, Faction::Hostile, None, 10);
        assert!(plan.kind == ActionKind::Walk || plan.kind == ActionKind::Rethink);
    }
}
