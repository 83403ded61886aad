//! Civilian behavior: keep wandering, and run when the shooting starts.

use tracing::debug;

use super::escape::setup_escape;
use super::mode::{self, AiMode, ModeContext};
use super::patrol::{setup_patrol, PatrolState};
use super::snapshot::{AiKind, AiSnapshot};
use super::{spotting_units, ActionKind, BattleAction, Objective, UnitAi};
use crate::battle::Battle;
use crate::battlefield::{NodeGraph, NodeId};
use crate::consts::{IDLE_REEVALUATE_PERCENT, SPOTTER_ALARM};
use crate::sight;
use crate::unit::{Faction, Unit, UnitId};

/// Civilians search coarsely: every tenth candidate is plenty of tactical
/// sense for someone whose plan is "be elsewhere".
const CIVILIAN_SEARCH_STRIDE: usize = 10;

/// Behavior state for one neutral unit.
#[derive(Debug)]
pub struct CivilianAi {
    unit: UnitId,
    mode: AiMode,
    patrol: PatrolState,
    aggro_target: Option<UnitId>,
    visible_enemies: i32,
    spotting_enemies: i32,
    /// Cached cost of the current escape plan; `None` means "no plan".
    escape_tus: Option<i32>,
    escape: Objective,
}

impl CivilianAi {
    pub fn new(unit: &Unit, from_node: Option<NodeId>) -> Self {
        Self {
            unit: unit.id,
            mode: AiMode::Patrol,
            patrol: PatrolState::new(from_node),
            aggro_target: None,
            visible_enemies: 0,
            spotting_enemies: 0,
            escape_tus: None,
            escape: Objective::rethink(),
        }
    }

    pub fn mode(&self) -> AiMode {
        self.mode
    }

    /// Closest visible hostile we could be hit by; returns how many are in
    /// view.
    fn select_nearest_threat(&mut self, battle: &Battle, me: &Unit) -> i32 {
        let mut tally = 0;
        let mut closest = 100;
        self.aggro_target = None;
        let origin = sight::sight_origin(me);
        for u in battle.units() {
            if u.is_out() || u.faction != Faction::Hostile {
                continue;
            }
            if !sight::visible(&battle.map, me, u.pos) {
                continue;
            }
            tally += 1;
            let dist = me.pos.distance(u.pos);
            if dist < closest
                && sight::can_target(&battle.map, battle.units(), origin, u.pos, me.id, None)
            {
                closest = dist;
                self.aggro_target = Some(u.id);
            }
        }
        if self.aggro_target.is_some() {
            tally
        } else {
            0
        }
    }

    fn plan_escape(&mut self, battle: &mut Battle, me: &Unit) {
        self.select_nearest_threat(battle, me);
        let threat = self
            .aggro_target
            .and_then(|id| battle.unit(id))
            .map(|u| u.pos);
        let plan = setup_escape(
            battle,
            me,
            threat,
            self.spotting_enemies,
            Faction::Hostile,
            None,
            CIVILIAN_SEARCH_STRIDE,
        );
        self.escape = Objective {
            kind: plan.kind,
            target: plan.target,
            weapon: None,
            tu: plan.tus,
        };
        self.escape_tus = (plan.kind == ActionKind::Walk).then_some(plan.tus);
    }

    fn evaluate_mode(&mut self, battle: &mut Battle, me: &Unit) {
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
        // patrolling needs somewhere to go
        if mode == AiMode::Patrol && self.patrol.to_node().is_none() {
            mode = AiMode::Escape;
        }
        self.mode = mode;
    }
}

impl UnitAi for CivilianAi {
    fn exit(&mut self, battle: &mut Battle) {
        self.patrol.release_destination(&mut battle.nodes);
    }

    fn think(&mut self, battle: &mut Battle) -> BattleAction {
        let mut action = BattleAction::rethink(self.unit);
        let Some(me) = battle.unit(self.unit).cloned() else {
            return action;
        };
        if me.is_out() {
            return action;
        }

        self.visible_enemies = self.select_nearest_threat(battle, &me);
        self.spotting_enemies = spotting_units(battle, &me, me.pos, Faction::Hostile, None);
        debug!(
            unit = me.id.0,
            visible = self.visible_enemies,
            spotting = self.spotting_enemies,
            mode = %self.mode,
            "civilian thinking"
        );

        if self.spotting_enemies > 0 && self.escape_tus.is_none() {
            self.plan_escape(battle, &me);
        }
        let patrol_obj = setup_patrol(battle, &me, &mut self.patrol);

        let mut evaluate = match self.mode {
            AiMode::Escape => self.spotting_enemies == 0,
            _ => {
                self.spotting_enemies > 0
                    || self.visible_enemies > 0
                    || battle.rng.percent(IDLE_REEVALUATE_PERCENT)
            }
        };
        if self.spotting_enemies > SPOTTER_ALARM || me.health < 2 * me.stats.health / 3 {
            evaluate = true;
        }
        if evaluate {
            self.evaluate_mode(battle, &me);
            debug!(unit = me.id.0, mode = %self.mode, "civilian re-evaluated");
        }

        match self.mode {
            AiMode::Escape => {
                action.kind = self.escape.kind;
                action.target = self.escape.target;
                action.tu = self.escape.tu;
                action.desperate = true;
                action.final_action = true;
            }
            _ => {
                action.kind = patrol_obj.kind;
                action.target = patrol_obj.target;
            }
        }

        if action.kind == ActionKind::Walk {
            if action.target != me.pos {
                self.escape_tus = None;
            } else {
                action.kind = ActionKind::None;
            }
        }
        action
    }

    fn snapshot(&self) -> AiSnapshot {
        AiSnapshot {
            kind: AiKind::Civilian,
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
        // civilians only patrol or flee
        if self.mode != AiMode::Escape {
            self.mode = AiMode::Patrol;
        }
        self.escape_tus = (snapshot.escape_tus > 0).then_some(snapshot.escape_tus);
    }
}
