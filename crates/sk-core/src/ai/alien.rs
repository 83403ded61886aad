//! Hostile-unit behavior: target acquisition, fire selection, grenades,
//! ambushes, charges and cover, arbitrated by the mode machine.

use tracing::debug;

use super::escape::setup_escape;
use super::mode::{self, AiMode, ModeContext};
use super::patrol::{setup_patrol, PatrolState};
use super::snapshot::{AiKind, AiSnapshot};
use super::{spotting_units, ActionKind, BattleAction, Objective, UnitAi, WeaponSlot};
use crate::battle::Battle;
use crate::battlefield::{NodeGraph, NodeId, Position, TileIndex};
use crate::consts::{
    AIMED_FIRE_RANGE, AMBUSH_FAST_PASS, AMBUSH_RADIUS, AUTO_FIRE_RANGE, BASE_SYSTEMATIC_SCORE,
    BLAST_HEIGHT, CHARGE_RANGE, COVER_BONUS, EXPOSURE_PENALTY, FIRE_POINT_FAST_PASS,
    FIRE_POINT_MIN_SCORE, GRENADE_HANDLING_TU, GUIDED_WAYPOINT_CAP, IDLE_REEVALUATE_PERCENT,
    MAX_THROW_DISTANCE, MAX_VIEW_DISTANCE, SNAP_FIRE_CEILING, SPOTTER_ALARM,
};
use crate::pathfind::{self, reachable_contains};
use crate::sight;
use crate::unit::{Faction, Unit, UnitId, Weapon, WeaponClass};

/// Behavior state for one hostile unit.
#[derive(Debug)]
pub struct AlienAi {
    unit: UnitId,
    mode: AiMode,
    patrol: PatrolState,
    aggro_target: Option<UnitId>,
    known_enemies: i32,
    visible_enemies: i32,
    spotting_enemies: i32,
    closest_dist: i32,
    /// Cached cost of the current escape plan; `None` means "no plan".
    escape_tus: Option<i32>,
    ambush_tus: i32,
    escape: Objective,
    ambush: Objective,
    attack: Objective,
    patrol_obj: Objective,
    rifle: bool,
    melee: bool,
    blaster: bool,
    reachable: Vec<TileIndex>,
    reachable_attack: Vec<TileIndex>,
    intelligence: i32,
    target_faction: Faction,
}

impl AlienAi {
    pub fn new(unit: &Unit, from_node: Option<NodeId>) -> Self {
        Self {
            unit: unit.id,
            mode: AiMode::Patrol,
            patrol: PatrolState::new(from_node),
            aggro_target: None,
            known_enemies: 0,
            visible_enemies: 0,
            spotting_enemies: 0,
            closest_dist: 100,
            escape_tus: None,
            ambush_tus: 0,
            escape: Objective::rethink(),
            ambush: Objective::rethink(),
            attack: Objective::rethink(),
            patrol_obj: Objective::rethink(),
            rifle: false,
            melee: false,
            blaster: false,
            reachable: Vec::new(),
            reachable_attack: Vec::new(),
            intelligence: unit.stats.intelligence,
            target_faction: unit.faction.target(),
        }
    }

    pub fn mode(&self) -> AiMode {
        self.mode
    }

    pub fn aggro_target(&self) -> Option<UnitId> {
        self.aggro_target
    }

    /// Is `unit` someone we would like to kill right now?
    fn valid_target(
        &self,
        battle: &Battle,
        me: &Unit,
        unit: &Unit,
        assess_danger: bool,
        include_civs: bool,
    ) -> bool {
        if unit.is_out()
            // they must be someone we know about
            || unit.turns_since_spotted > self.intelligence
            // and not on a tile about to blow up
            || (assess_danger
                && battle.map.tile(unit.pos).is_some_and(|t| t.dangerous()))
            || unit.faction == me.faction
        {
            return false;
        }
        if include_civs {
            return true;
        }
        unit.faction == self.target_faction
    }

    /// Count every enemy known to us, visible or not.
    fn count_known_targets(&self, battle: &Battle, me: &Unit) -> i32 {
        battle
            .units()
            .iter()
            .filter(|u| self.valid_target(battle, me, u, true, true))
            .count() as i32
    }

    /// Pick the closest visible enemy we could actually hit, and return how
    /// many viable targets were in view.
    fn select_nearest_target(&mut self, battle: &Battle, me: &Unit) -> i32 {
        let mut tally = 0;
        self.closest_dist = 100;
        self.aggro_target = None;
        for u in battle.units() {
            if !self.valid_target(battle, me, u, true, true)
                || !sight::visible(&battle.map, me, u.pos)
            {
                continue;
            }
            tally += 1;
            let dist = me.pos.distance(u.pos);
            if dist < self.closest_dist {
                let valid = if self.rifle || !self.melee {
                    sight::can_target(
                        &battle.map,
                        battle.units(),
                        sight::sight_origin(me),
                        u.pos,
                        me.id,
                        None,
                    )
                } else {
                    me.pos.adjacent(u.pos)
                        || self.select_point_near_target(battle, me, u, me.tu).is_some()
                };
                if valid {
                    self.closest_dist = dist;
                    self.aggro_target = Some(u.id);
                }
            }
        }
        if self.aggro_target.is_some() {
            tally
        } else {
            0
        }
    }

    /// Pick the closest known enemy, seen or not. Used for ambush and
    /// fire-point estimation.
    fn select_closest_known_enemy(&mut self, battle: &Battle, me: &Unit) -> bool {
        self.aggro_target = None;
        let mut min_dist = 255;
        for u in battle.units() {
            if !self.valid_target(battle, me, u, true, false) {
                continue;
            }
            let dist = me.pos.distance(u.pos);
            if dist < min_dist {
                min_dist = dist;
                self.aggro_target = Some(u.id);
            }
        }
        self.aggro_target.is_some()
    }

    /// Pick a random known target, with a mild preference for close ones.
    fn select_random_target(&mut self, battle: &mut Battle, me: &Unit) -> bool {
        let mut farthest = -100;
        self.aggro_target = None;
        let candidates: Vec<(UnitId, Position)> = battle
            .units()
            .iter()
            .filter(|u| self.valid_target(battle, me, u, true, true))
            .map(|u| (u.id, u.pos))
            .collect();
        for (id, pos) in candidates {
            let noise = battle.rng.generate(0, 20) - me.pos.distance(pos);
            if noise > farthest {
                farthest = noise;
                self.aggro_target = Some(id);
            }
        }
        self.aggro_target.is_some()
    }

    /// Find a reachable tile beside `target` to strike from.
    fn select_point_near_target(
        &self,
        battle: &Battle,
        me: &Unit,
        target: &Unit,
        max_tu: i32,
    ) -> Option<Position> {
        let mut best: Option<Position> = None;
        let mut shortest = usize::MAX;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let check = target.pos + Position::new(dx, dy, 0);
                let Some(idx) = battle.map.tile_index(check) else {
                    continue;
                };
                if !reachable_contains(&self.reachable, idx)
                    || battle.map.tile(check).is_some_and(|t| t.dangerous())
                {
                    continue;
                }
                if battle.unit_at(check).is_some_and(|u| u.id != me.id) {
                    continue;
                }
                let route = pathfind::calculate(
                    &battle.map,
                    &battle.units,
                    me,
                    check,
                    None,
                    Some(max_tu),
                );
                if route.is_reachable() && route.steps.len() < shortest {
                    shortest = route.steps.len();
                    best = Some(check);
                }
            }
        }
        best
    }

    /// Refresh the cover plan.
    fn plan_escape(&mut self, battle: &mut Battle, me: &Unit) {
        self.select_nearest_target(battle, me);
        let threat = self
            .aggro_target
            .and_then(|id| battle.unit(id))
            .map(|u| u.pos);
        let plan = setup_escape(
            battle,
            me,
            threat,
            self.spotting_enemies,
            self.target_faction,
            Some(self.intelligence),
            1,
        );
        self.escape = Objective {
            kind: plan.kind,
            target: plan.target,
            weapon: None,
            tu: plan.tus,
        };
        self.escape_tus = (plan.kind == ActionKind::Walk).then_some(plan.tus);
    }

    /// Scout the node graph for a tile the target can walk past but cannot
    /// see, and lie in wait there.
    fn setup_ambush(&mut self, battle: &mut Battle, me: &Unit) {
        self.ambush = Objective::rethink();
        self.ambush_tus = 0;
        if !self.select_closest_known_enemy(battle, me) {
            debug!(unit = me.id.0, "ambush estimation failed: no known enemy");
            return;
        }
        let Some(aggro) = self.aggro_target.and_then(|id| battle.unit(id)).cloned() else {
            return;
        };
        let origin = sight::sight_origin(&aggro);

        let mut best_score = 0;
        let mut best: Option<(Position, i32)> = None;
        for node in battle.nodes.nodes() {
            let pos = node.pos;
            if me.pos.distance(pos) > AMBUSH_RADIUS || pos.z != me.pos.z {
                continue;
            }
            let Some(idx) = battle.map.tile_index(pos) else {
                continue;
            };
            if battle.map.tile(pos).is_some_and(|t| t.dangerous())
                || !reachable_contains(&self.reachable_attack, idx)
            {
                continue;
            }
            // the spot is only an ambush if nobody can see us there
            if sight::can_target(&battle.map, battle.units(), origin, pos, aggro.id, Some(me.id))
                || spotting_units(battle, me, pos, self.target_faction, Some(self.intelligence))
                    > 0
            {
                continue;
            }
            let route =
                pathfind::calculate(&battle.map, &battle.units, me, pos, None, None);
            if !route.is_reachable() && pos != me.pos {
                continue;
            }
            // and the mark has to be able to wander past it
            let enemy_route =
                pathfind::calculate(&battle.map, &battle.units, &aggro, pos, Some(me.id), None);
            if !enemy_route.is_reachable() {
                continue;
            }
            let mut score = BASE_SYSTEMATIC_SCORE - route.total_tu;
            if adjoins_cover(battle, pos) {
                score += COVER_BONUS;
            }
            if score > best_score {
                best_score = score;
                best = Some((pos, if pos == me.pos { 1 } else { route.total_tu }));
                if score > AMBUSH_FAST_PASS {
                    break;
                }
            }
        }

        if let Some((pos, tus)) = best {
            self.ambush_tus = tus;
            self.ambush = Objective {
                kind: ActionKind::Walk,
                target: pos,
                weapon: None,
                tu: 0,
            };
            debug!(unit = me.id.0, target = %pos, score = best_score, "ambush prepared");
        } else {
            debug!(unit = me.id.0, "ambush estimation failed");
        }
    }

    /// Build the best attack available this turn, if any.
    fn setup_attack(&mut self, battle: &mut Battle, me: &Unit) {
        self.attack = Objective::rethink();

        // known but unseen enemies can still be reached by guided fire
        if self.known_enemies > 0 && self.blaster {
            self.way_point_action(battle, me);
        }

        if self.select_nearest_target(battle, me) > 0 {
            if self.melee && self.rifle {
                self.select_melee_or_ranged(battle, me);
            }
            if me.grenade.is_some() {
                self.grenade_action(battle, me);
            }
            if self.melee {
                self.melee_action(battle, me);
            }
            if self.rifle {
                self.projectile_action(battle, me);
            }
        }

        if self.attack.kind != ActionKind::Rethink {
            debug!(
                unit = me.id.0,
                kind = %self.attack.kind,
                target = %self.attack.target,
                "attack prepared"
            );
            return;
        }
        // nobody in our sights; the bold (or the exposed) move to find one
        if (self.spotting_enemies > 0 || me.stats.aggression < battle.rng.generate(0, 3))
            && !self.find_fire_point(battle, me)
        {
            debug!(unit = me.id.0, "attack estimation failed");
        }
    }

    /// Close with a visible enemy and strike, or commit to a charge.
    fn melee_action(&mut self, battle: &mut Battle, me: &Unit) {
        // a dedicated melee arm, or a main weapon that happens to be one
        let (weapon, slot) = if let Some(w) = me.melee_weapon.clone() {
            (w, WeaponSlot::MeleeArm)
        } else if let Some(w) = me
            .main_weapon
            .clone()
            .filter(|w| w.class == WeaponClass::Melee)
        {
            (w, WeaponSlot::Main)
        } else {
            return;
        };
        let attack_cost = me.action_tu(ActionKind::Melee, &weapon);
        if me.tu < attack_cost {
            // no TUs to swing with; some other behaviour will have to do
            return;
        }
        if let Some(target) = self.aggro_target.and_then(|id| battle.unit(id)) {
            if !target.is_out() && me.pos.adjacent(target.pos) {
                self.attack = Objective {
                    kind: ActionKind::Melee,
                    target: target.pos,
                    weapon: Some(slot),
                    tu: attack_cost,
                };
                return;
            }
        }
        let charge_reserve = me.tu - attack_cost;
        let mut distance = charge_reserve / 4 + 1;
        self.aggro_target = None;
        let mut charge: Option<(UnitId, Position, Position)> = None;
        for u in battle.units() {
            let new_dist = me.pos.distance(u.pos);
            if new_dist > CHARGE_RANGE || !self.valid_target(battle, me, u, true, true) {
                continue;
            }
            // closest living enemy we can actually move next to
            if new_dist < distance || new_dist == 1 {
                if me.pos.adjacent(u.pos) {
                    charge = Some((u.id, me.pos, u.pos));
                    distance = new_dist;
                } else if let Some(point) =
                    self.select_point_near_target(battle, me, u, charge_reserve)
                {
                    charge = Some((u.id, point, u.pos));
                    distance = new_dist;
                }
            }
        }
        if let Some((target_id, point, target_pos)) = charge {
            self.aggro_target = Some(target_id);
            if let Some(unit) = battle.unit_mut(self.unit) {
                unit.charging = Some(target_id);
            }
            if me.pos.adjacent(target_pos) {
                self.attack = Objective {
                    kind: ActionKind::Melee,
                    target: target_pos,
                    weapon: Some(slot),
                    tu: attack_cost,
                };
            } else {
                self.attack = Objective {
                    kind: ActionKind::Walk,
                    target: point,
                    weapon: None,
                    tu: 0,
                };
            }
            debug!(unit = me.id.0, target = target_id.0, "charge!");
        }
    }

    /// Fire a guided projectile at an enemy someone on our side knows
    /// about, steering it around cover if a clean string of waypoints
    /// exists.
    fn way_point_action(&mut self, battle: &mut Battle, me: &Unit) {
        let Some(weapon) = me.main_weapon.clone() else {
            return;
        };
        let cost = me.action_tu(ActionKind::AimedShot, &weapon);
        if me.tu < cost {
            return;
        }
        self.aggro_target = None;
        let radius = weapon.power / 20 + 1;
        let mut route = None;
        for u in battle.units() {
            if !self.valid_target(battle, me, u, true, true) {
                continue;
            }
            let r = pathfind::calculate(&battle.map, &battle.units, me, u.pos, Some(u.id), None);
            if r.is_reachable() && self.explosive_efficacy(battle, me, u.pos, radius, false) {
                self.aggro_target = Some(u.id);
                route = Some(r);
                break;
            }
        }
        let (Some(target_id), Some(route)) = (self.aggro_target, route) else {
            return;
        };
        let Some(target_pos) = battle.unit(target_id).map(|u| u.pos) else {
            return;
        };

        // string waypoints along the walking route; every leg needs a clear
        // flight line from the previous one
        let mut waypoints = 0usize;
        let mut last_wp = me.pos;
        let mut prev = me.pos;
        let mut steerable = true;
        for &step in &route.steps {
            if !sight::can_target(&battle.map, battle.units(), last_wp, step, me.id, Some(target_id))
            {
                if prev == last_wp {
                    steerable = false;
                    break;
                }
                waypoints += 1;
                last_wp = prev;
                if waypoints > GUIDED_WAYPOINT_CAP {
                    steerable = false;
                    break;
                }
            }
            prev = step;
        }
        if steerable
            && sight::can_target(
                &battle.map,
                battle.units(),
                last_wp,
                target_pos,
                me.id,
                Some(target_id),
            )
        {
            self.attack = Objective {
                kind: ActionKind::AimedShot,
                target: target_pos,
                weapon: Some(WeaponSlot::Main),
                tu: cost,
            };
        }
    }

    /// Shoot at the aggro target, unless the shot would cost us more than
    /// it costs them.
    fn projectile_action(&mut self, battle: &Battle, me: &Unit) {
        let Some(target_pos) = self.aggro_target.and_then(|id| battle.unit(id)).map(|u| u.pos)
        else {
            return;
        };
        let Some(weapon) = me.main_weapon.clone() else {
            return;
        };
        if !weapon.is_explosive()
            || self.explosive_efficacy(battle, me, target_pos, weapon.blast_radius, false)
        {
            self.select_fire_method(me, &weapon, target_pos);
        }
    }

    /// Pick snap, auto or aimed fire by range and remaining TUs.
    fn select_fire_method(&mut self, me: &Unit, weapon: &Weapon, target: Position) {
        let distance = me.pos.distance(target);
        let mut kind = ActionKind::Rethink;

        let affordable = |k: ActionKind| me.tu >= me.action_tu(k, weapon);

        if distance < AUTO_FIRE_RANGE {
            if weapon.has_auto() && affordable(ActionKind::AutoShot) {
                kind = ActionKind::AutoShot;
            } else if !weapon.has_snap() || !affordable(ActionKind::SnapShot) {
                if weapon.has_aimed() && affordable(ActionKind::AimedShot) {
                    kind = ActionKind::AimedShot;
                }
            } else {
                kind = ActionKind::SnapShot;
            }
        } else if distance > AIMED_FIRE_RANGE
            && weapon.has_aimed()
            && affordable(ActionKind::AimedShot)
        {
            kind = ActionKind::AimedShot;
        } else if distance > AIMED_FIRE_RANGE
            && distance < SNAP_FIRE_CEILING
            && weapon.has_snap()
            && affordable(ActionKind::SnapShot)
        {
            kind = ActionKind::SnapShot;
        } else if weapon.has_snap() && affordable(ActionKind::SnapShot) {
            kind = ActionKind::SnapShot;
        } else if weapon.has_aimed() && affordable(ActionKind::AimedShot) {
            kind = ActionKind::AimedShot;
        } else if weapon.has_auto() && affordable(ActionKind::AutoShot) {
            kind = ActionKind::AutoShot;
        }

        if kind != ActionKind::Rethink {
            self.attack = Objective {
                kind,
                target,
                weapon: Some(WeaponSlot::Main),
                tu: me.action_tu(kind, weapon),
            };
        }
    }

    /// Throw a grenade at the aggro target, or at the node where a blast
    /// would catch the most enemies.
    fn grenade_action(&mut self, battle: &Battle, me: &Unit) {
        let Some(grenade) = me.grenade.clone() else {
            return;
        };
        let cost =
            GRENADE_HANDLING_TU + me.prime_tu(&grenade) + me.action_tu(ActionKind::Throw, &grenade);
        if cost > me.tu {
            return;
        }
        let Some(aggro_pos) = self.aggro_target.and_then(|id| battle.unit(id)).map(|u| u.pos)
        else {
            return;
        };
        let target = if self.explosive_efficacy(battle, me, aggro_pos, grenade.blast_radius, true) {
            aggro_pos
        } else if let Some(pos) = self.node_of_best_efficacy(battle, me, &grenade) {
            pos
        } else {
            return;
        };
        if me.pos.distance(target) > MAX_THROW_DISTANCE || !battle.map.contains(target) {
            return;
        }
        self.attack = Objective {
            kind: ActionKind::Throw,
            target,
            weapon: Some(WeaponSlot::Grenade),
            tu: cost,
        };
        // the grenade is the plan now
        self.rifle = false;
        self.melee = false;
    }

    /// Is a blast at `target_pos` worth it, weighing hoped-for enemy
    /// casualties against friendly fire and our own hide?
    fn explosive_efficacy(
        &self,
        battle: &Battle,
        me: &Unit,
        target_pos: Position,
        radius: i32,
        grenade: bool,
    ) -> bool {
        let Some(target_tile) = battle.map.tile(target_pos) else {
            return false;
        };
        // grenades roll off tiles with no floor under them
        if grenade && target_pos.z > 0 && !target_tile.has_floor() {
            return false;
        }
        let distance = me.pos.distance(target_pos);
        let injury = me.stats.health - me.health;
        let mut desperation = (100 - me.morale) / 10;
        if injury > 2 * me.stats.health / 3 {
            desperation += 3;
        }
        let mut efficacy = desperation;

        // standing inside our own blast is only for the doomed
        if (me.pos.z - target_pos.z).abs() <= BLAST_HEIGHT && distance <= radius {
            efficacy -= 4;
        }

        let mut enemies_affected = 0;
        let target_unit_id = battle.unit_at(target_pos).map(|u| u.id);
        if target_unit_id.is_some() && !target_tile.dangerous() {
            enemies_affected += 1;
            efficacy += 1;
        }

        for u in battle.units() {
            if u.is_out() || u.id == me.id || Some(u.id) == target_unit_id {
                continue;
            }
            if (u.pos.z - target_pos.z).abs() > BLAST_HEIGHT
                || u.pos.distance(target_pos) > radius
            {
                continue;
            }
            // already-grenaded tiles and enemies we don't know about don't count
            if battle.map.tile(u.pos).is_some_and(|t| t.dangerous())
                || (u.faction == self.target_faction
                    && u.turns_since_spotted > self.intelligence)
            {
                continue;
            }
            if sight::can_target(&battle.map, battle.units(), target_pos, u.pos, me.id, None) {
                if u.faction == self.target_faction {
                    enemies_affected += 1;
                    efficacy += 1;
                } else if u.faction == me.faction
                    || (me.faction == Faction::Neutral && u.faction == Faction::Player)
                {
                    // friendlies count double
                    efficacy -= 2;
                }
            }
        }
        // don't waste grenades on singletons unless things are dire
        if grenade && desperation < 6 && enemies_affected < 2 {
            return false;
        }
        efficacy > 0 || enemies_affected >= 10
    }

    /// The graph node whose blast would catch the most known enemies.
    fn node_of_best_efficacy(
        &self,
        battle: &Battle,
        me: &Unit,
        weapon: &Weapon,
    ) -> Option<Position> {
        let origin = sight::sight_origin(me);
        let mut best_score = 2;
        let mut best = None;
        for node in battle.nodes.nodes() {
            let dist = me.pos.distance(node.pos);
            if dist > MAX_VIEW_DISTANCE
                || dist <= weapon.blast_radius
                || !sight::can_target(&battle.map, battle.units(), origin, node.pos, me.id, None)
            {
                continue;
            }
            let mut points = 0;
            for u in battle.units() {
                if u.is_out() || u.pos.distance(node.pos) >= weapon.blast_radius {
                    continue;
                }
                if !sight::can_target(
                    &battle.map,
                    battle.units(),
                    sight::sight_origin(u),
                    node.pos,
                    u.id,
                    None,
                ) {
                    continue;
                }
                if u.faction == self.target_faction {
                    if u.turns_since_spotted <= self.intelligence {
                        points += 1;
                    }
                } else {
                    points -= 2;
                }
            }
            if points > best_score {
                best_score = points;
                best = Some(node.pos);
            }
        }
        best
    }

    /// Search the pattern for a reachable tile with a firing line to the
    /// closest known enemy, and move there.
    fn find_fire_point(&mut self, battle: &mut Battle, me: &Unit) -> bool {
        if !self.select_closest_known_enemy(battle, me) {
            return false;
        }
        let Some(aggro_pos) = self.aggro_target.and_then(|id| battle.unit(id)).map(|u| u.pos)
        else {
            return false;
        };
        let offsets = battle.search_offsets();
        let mut best_score = 0;
        let mut best: Option<Position> = None;
        for (dx, dy) in offsets {
            let pos = me.pos + Position::new(dx, dy, 0);
            let Some(idx) = battle.map.tile_index(pos) else {
                continue;
            };
            if !reachable_contains(&self.reachable_attack, idx)
                || !sight::can_target(&battle.map, battle.units(), pos, aggro_pos, me.id, None)
            {
                continue;
            }
            let route = pathfind::calculate(&battle.map, &battle.units, me, pos, None, None);
            if !route.is_reachable() && pos != me.pos {
                continue;
            }
            let mut score = BASE_SYSTEMATIC_SCORE
                - spotting_units(battle, me, pos, self.target_faction, Some(self.intelligence))
                    * EXPOSURE_PENALTY;
            score += me.tu - route.total_tu;
            if score > best_score {
                best_score = score;
                best = Some(pos);
                if score > FIRE_POINT_FAST_PASS {
                    break;
                }
            }
        }
        if best_score > FIRE_POINT_MIN_SCORE {
            if let Some(pos) = best {
                self.attack = Objective {
                    kind: ActionKind::Walk,
                    target: pos,
                    weapon: None,
                    tu: 0,
                };
                debug!(unit = me.id.0, target = %pos, score = best_score, "fire point found");
                return true;
            }
        }
        debug!(unit = me.id.0, score = best_score, "fire point failed");
        false
    }

    /// We carry both a blade and a gun; decide which gets used this turn.
    fn select_melee_or_ranged(&mut self, battle: &mut Battle, me: &Unit) {
        let Some(melee_weapon) = me.melee_weapon.clone() else {
            self.melee = false;
            return;
        };
        if me.main_weapon.is_none() {
            self.rifle = false;
            return;
        }
        let mut melee_odds = 10;
        if melee_weapon.power > 50 {
            melee_odds += (melee_weapon.power - 50) / 2;
        }
        if self.visible_enemies > 1 {
            melee_odds -= 20 * (self.visible_enemies - 1);
        }
        if melee_odds > 0 && me.health >= 2 * me.stats.health / 3 {
            if me.stats.aggression == 0 {
                melee_odds -= 20;
            } else if me.stats.aggression > 1 {
                melee_odds += 10 * me.stats.aggression;
            }
            if battle.rng.percent(melee_odds) {
                self.rifle = false;
                let reserve = me.tu - me.action_tu(ActionKind::Melee, &melee_weapon);
                self.reachable_attack =
                    pathfind::find_reachable(&battle.map, &battle.units, me, reserve.max(0));
                return;
            }
        }
        self.melee = false;
    }

    /// Re-evaluate which mode governs this unit.
    ///
    /// The weighted draw only ever yields Patrol or Escape; Combat and
    /// Ambush are earned by having a prepared objective, and a drawn mode
    /// that lacks its objective falls through to the next one down.
    fn evaluate_mode(&mut self, battle: &mut Battle, me: &Unit) {
        if me.charging.is_some() && self.attack.kind != ActionKind::Rethink {
            self.mode = AiMode::Combat;
            return;
        }
        if self.spotting_enemies > 0 && self.escape_tus.is_none() {
            self.plan_escape(battle, me);
        }
        let ctx = ModeContext {
            current: self.mode,
            visible_enemies: self.visible_enemies,
            spotting_enemies: self.spotting_enemies,
            health: me.health,
            max_health: me.stats.health,
            aggression: me.stats.aggression,
        };
        let mut mode = mode::evaluate_patrol_escape(&ctx, &mut battle.rng);

        if mode == AiMode::Patrol {
            if self.attack.kind != ActionKind::Rethink {
                mode = AiMode::Combat;
            } else if self.patrol.to_node().is_none() {
                // nowhere to walk; hunt, lurk or run, in that order
                if self.select_random_target(battle, me) && self.find_fire_point(battle, me) {
                    mode = AiMode::Combat;
                } else if self.ambush_tus != 0 {
                    mode = AiMode::Ambush;
                } else {
                    mode = AiMode::Escape;
                }
            }
        }
        if me.charging.is_some() {
            mode = AiMode::Combat;
        }
        self.mode = mode;
    }
}

/// Does any neighboring tile offer hard cover?
fn adjoins_cover(battle: &Battle, pos: Position) -> bool {
    for dx in -1..=1 {
        for dy in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let neighbor = pos + Position::new(dx, dy, 0);
            if battle
                .map
                .tile(neighbor)
                .is_some_and(|t| t.blocks_movement())
            {
                return true;
            }
        }
    }
    false
}

impl UnitAi for AlienAi {
    fn exit(&mut self, battle: &mut Battle) {
        self.patrol.release_destination(&mut battle.nodes);
    }

    fn think(&mut self, battle: &mut Battle) -> BattleAction {
        let mut action = BattleAction::rethink(self.unit);
        let Some(mut me) = battle.unit(self.unit).cloned() else {
            return action;
        };
        if me.is_out() {
            return action;
        }

        // a charge against a downed target is over
        if let Some(charged) = me.charging {
            if battle.unit(charged).is_none_or(|u| u.is_out()) {
                me.charging = None;
                if let Some(unit) = battle.unit_mut(self.unit) {
                    unit.charging = None;
                }
            }
        }

        self.known_enemies = self.count_known_targets(battle, &me);
        self.visible_enemies = self.select_nearest_target(battle, &me);
        self.spotting_enemies =
            spotting_units(battle, &me, me.pos, self.target_faction, Some(self.intelligence));
        self.melee = me.melee_weapon.is_some();
        self.rifle = false;
        self.blaster = false;
        self.reachable = pathfind::find_reachable(&battle.map, &battle.units, &me, me.tu);
        debug!(
            unit = me.id.0,
            visible = self.visible_enemies,
            known = self.known_enemies,
            spotting = self.spotting_enemies,
            mode = %self.mode,
            "thinking"
        );

        let mut weapon_slot = None;
        if let Some(weapon) = me.main_weapon.clone() {
            match weapon.class {
                WeaponClass::Firearm => {
                    weapon_slot = Some(WeaponSlot::Main);
                    let (reserve_kind, is_guided) = if weapon.guided {
                        (ActionKind::AimedShot, true)
                    } else {
                        (ActionKind::SnapShot, false)
                    };
                    self.blaster = is_guided;
                    self.rifle = !is_guided;
                    let reserve = me.tu - me.action_tu(reserve_kind, &weapon);
                    self.reachable_attack =
                        pathfind::find_reachable(&battle.map, &battle.units, &me, reserve.max(0));
                }
                WeaponClass::Melee => {
                    self.melee = true;
                    let reserve = me.tu - me.action_tu(ActionKind::Melee, &weapon);
                    self.reachable_attack =
                        pathfind::find_reachable(&battle.map, &battle.units, &me, reserve.max(0));
                }
                WeaponClass::Grenade => {}
            }
        } else if let Some(weapon) = me.melee_weapon.clone() {
            let reserve = me.tu - me.action_tu(ActionKind::Melee, &weapon);
            self.reachable_attack =
                pathfind::find_reachable(&battle.map, &battle.units, &me, reserve.max(0));
        }

        if self.spotting_enemies > 0 && self.escape_tus.is_none() {
            self.plan_escape(battle, &me);
        }
        if self.known_enemies > 0 && !self.melee && self.ambush_tus == 0 {
            self.setup_ambush(battle, &me);
        }
        self.setup_attack(battle, &me);
        self.patrol_obj = setup_patrol(battle, &me, &mut self.patrol);

        let mut evaluate = match self.mode {
            AiMode::Patrol => {
                self.spotting_enemies > 0
                    || self.visible_enemies > 0
                    || self.known_enemies > 0
                    || battle.rng.percent(IDLE_REEVALUATE_PERCENT)
            }
            AiMode::Ambush => !self.rifle || self.ambush_tus == 0 || self.visible_enemies > 0,
            AiMode::Combat => self.attack.kind == ActionKind::Rethink,
            AiMode::Escape => self.spotting_enemies == 0 || self.known_enemies == 0,
        };
        let aggro_stale = self
            .aggro_target
            .and_then(|id| battle.unit(id))
            .is_some_and(|t| t.turns_since_spotted > self.intelligence);
        if self.spotting_enemies > SPOTTER_ALARM
            || me.health < 2 * me.stats.health / 3
            || aggro_stale
        {
            evaluate = true;
        }
        if evaluate {
            self.evaluate_mode(battle, &me);
            debug!(unit = me.id.0, mode = %self.mode, "re-evaluated");
        }

        match self.mode {
            AiMode::Escape => {
                if let Some(unit) = battle.unit_mut(self.unit) {
                    unit.charging = None;
                }
                action.kind = self.escape.kind;
                action.target = self.escape.target;
                action.tu = self.escape.tu;
                // end this unit's turn and ignore new targets on the way
                action.final_action = true;
                action.desperate = true;
            }
            AiMode::Patrol => {
                if let Some(unit) = battle.unit_mut(self.unit) {
                    unit.charging = None;
                }
                if me
                    .main_weapon
                    .as_ref()
                    .is_some_and(|w| w.class == WeaponClass::Firearm)
                {
                    action.reserve = match me.stats.aggression {
                        0 => Some(ActionKind::AimedShot),
                        1 => Some(ActionKind::AutoShot),
                        2 => Some(ActionKind::SnapShot),
                        _ => None,
                    };
                }
                action.kind = self.patrol_obj.kind;
                action.target = self.patrol_obj.target;
            }
            AiMode::Combat => {
                action.kind = self.attack.kind;
                action.target = self.attack.target;
                action.weapon = self.attack.weapon.or(weapon_slot);
                action.tu = self.attack.tu;
                if action.kind == ActionKind::Throw {
                    // readying and priming happen on the way to the throw
                    if let Some(grenade) = me.grenade.clone() {
                        let prep = GRENADE_HANDLING_TU + me.prime_tu(&grenade);
                        if let Some(unit) = battle.unit_mut(self.unit) {
                            unit.spend_tu(prep);
                        }
                        action.tu -= prep;
                    }
                }
            }
            AiMode::Ambush => {
                if let Some(unit) = battle.unit_mut(self.unit) {
                    unit.charging = None;
                }
                action.kind = self.ambush.kind;
                action.target = self.ambush.target;
                // settle in and hold fire until something walks past
                action.final_action = true;
            }
        }

        if action.kind == ActionKind::Walk {
            if action.target != me.pos {
                // moving invalidates the plans we priced from this tile
                self.escape_tus = None;
                self.ambush_tus = 0;
            } else {
                action.kind = ActionKind::None;
            }
        }
        action
    }

    fn snapshot(&self) -> AiSnapshot {
        AiSnapshot {
            kind: AiKind::Alien,
            from_node: self.patrol.from_node.map_or(-1, |n| n.0 as i32),
            to_node: self.patrol.to_node().map_or(-1, |n| n.0 as i32),
            mode: self.mode as u8,
            escape_tus: self.escape_tus.unwrap_or(0),
        }
    }

    fn restore(&mut self, snapshot: &AiSnapshot, nodes: &mut NodeGraph) {
        self.patrol
            .restore(snapshot.from_node, snapshot.to_node, nodes);
        self.mode = AiMode::from_raw(snapshot.mode);
        self.escape_tus = (snapshot.escape_tus > 0).then_some(snapshot.escape_tus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battlefield::{BattleMap, NodeGraph};
    use crate::unit::UnitStats;

    fn arena() -> Battle {
        Battle::new(BattleMap::new(24, 24, 1), NodeGraph::default(), 13)
    }

    fn hostile(battle: &mut Battle, pos: Position) -> Unit {
        let id = battle.add_unit(Unit::new(
            UnitId(0),
            Faction::Hostile,
            pos,
            UnitStats::veteran(),
        ));
        battle.unit(id).unwrap().clone()
    }

    fn soldier(battle: &mut Battle, pos: Position) -> Unit {
        let id = battle.add_unit(Unit::new(
            UnitId(0),
            Faction::Player,
            pos,
            UnitStats::veteran(),
        ));
        battle.unit_mut(id).unwrap().turns_since_spotted = 0;
        battle.unit(id).unwrap().clone()
    }

    #[test]
    fn test_fire_method_prefers_auto_up_close() {
        let mut battle = arena();
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let mut ai = AlienAi::new(&me, None);
        let rifle = Weapon::rifle();

        ai.select_fire_method(&me, &rifle, Position::new(4, 2, 0));
        assert_eq!(ai.attack.kind, ActionKind::AutoShot);
    }

    #[test]
    fn test_fire_method_prefers_aimed_at_range() {
        let mut battle = arena();
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let mut ai = AlienAi::new(&me, None);
        let rifle = Weapon::rifle();

        ai.select_fire_method(&me, &rifle, Position::new(17, 2, 0));
        assert_eq!(ai.attack.kind, ActionKind::AimedShot);
    }

    #[test]
    fn test_fire_method_falls_back_when_tu_short() {
        let mut battle = arena();
        let mut me = hostile(&mut battle, Position::new(2, 2, 0));
        let mut ai = AlienAi::new(&me, None);
        let rifle = Weapon::rifle();

        // aimed costs 80% of base TU; with a sliver left only snap fits
        me.tu = me.action_tu(ActionKind::SnapShot, &rifle);
        ai.select_fire_method(&me, &rifle, Position::new(17, 2, 0));
        assert_eq!(ai.attack.kind, ActionKind::SnapShot);

        me.tu = 0;
        ai.attack = Objective::rethink();
        ai.select_fire_method(&me, &rifle, Position::new(17, 2, 0));
        assert_eq!(ai.attack.kind, ActionKind::Rethink);
    }

    #[test]
    fn test_grenade_needs_a_second_victim() {
        let mut battle = arena();
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let ai = AlienAi::new(&me, None);
        let target = soldier(&mut battle, Position::new(10, 10, 0));

        // one target, healthy thrower: not worth a grenade
        assert!(!ai.explosive_efficacy(&battle, &me, target.pos, 3, true));

        // a second soldier inside the blast makes it pay
        soldier(&mut battle, Position::new(11, 10, 0));
        assert!(ai.explosive_efficacy(&battle, &me, target.pos, 3, true));
    }

    #[test]
    fn test_friendlies_spoil_a_blast() {
        let mut battle = arena();
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let ai = AlienAi::new(&me, None);
        let target = soldier(&mut battle, Position::new(10, 10, 0));
        soldier(&mut battle, Position::new(11, 10, 0));
        assert!(ai.explosive_efficacy(&battle, &me, target.pos, 3, true));

        // two of ours in the blast radius flip the ledger
        hostile(&mut battle, Position::new(9, 10, 0));
        hostile(&mut battle, Position::new(10, 11, 0));
        assert!(!ai.explosive_efficacy(&battle, &me, target.pos, 3, true));
    }

    #[test]
    fn test_fire_point_stays_in_reach_with_a_firing_line() {
        use crate::battlefield::Tile;

        let mut battle = arena();
        // wall between us and the known target, one gap at y=6
        for y in 0..24 {
            if y != 6 {
                battle.map.set_tile(Position::new(6, y, 0), Tile::wall());
            }
        }
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let target = soldier(&mut battle, Position::new(10, 2, 0));
        let mut ai = AlienAi::new(&me, None);
        ai.reachable_attack = pathfind::find_reachable(&battle.map, &battle.units, &me, me.tu);

        if ai.find_fire_point(&mut battle, &me) {
            assert_eq!(ai.attack.kind, ActionKind::Walk);
            let idx = battle.map.tile_index(ai.attack.target).unwrap();
            assert!(reachable_contains(&ai.reachable_attack, idx));
            assert!(sight::can_target(
                &battle.map,
                battle.units(),
                ai.attack.target,
                target.pos,
                me.id,
                None,
            ));
        }
    }

    #[test]
    fn test_valid_target_filters() {
        let mut battle = arena();
        let me = hostile(&mut battle, Position::new(2, 2, 0));
        let ai = AlienAi::new(&me, None);

        let seen = soldier(&mut battle, Position::new(8, 2, 0));
        assert!(ai.valid_target(&battle, &me, &seen, true, false));

        // an enemy we never spotted is not a target
        let mut unseen = soldier(&mut battle, Position::new(9, 2, 0));
        unseen.turns_since_spotted = 255;
        assert!(!ai.valid_target(&battle, &me, &unseen, true, false));

        // our own kind never is
        let friend = hostile(&mut battle, Position::new(3, 2, 0));
        assert!(!ai.valid_target(&battle, &me, &friend, true, true));

        // civilians only count when asked for
        let civ_id = battle.add_unit(Unit::new(
            UnitId(0),
            Faction::Neutral,
            Position::new(5, 5, 0),
            UnitStats::civilian(),
        ));
        battle.unit_mut(civ_id).unwrap().turns_since_spotted = 0;
        let civ = battle.unit(civ_id).unwrap().clone();
        assert!(ai.valid_target(&battle, &me, &civ, true, true));
        assert!(!ai.valid_target(&battle, &me, &civ, true, false));
    }
}
