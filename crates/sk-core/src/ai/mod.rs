//! The unit-behavior engine.
//!
//! Once per AI turn the driver calls [`AiState::think`] for each autonomous
//! unit; the behavior queries sight and pathfinding, updates its own state,
//! and hands back exactly one [`BattleAction`]. Inability to decide is the
//! explicit [`ActionKind::Rethink`], never an ambiguous action.

mod action;
mod alien;
mod civilian;
mod escape;
mod mode;
mod patrol;
mod snapshot;

pub use action::{ActionKind, BattleAction, WeaponSlot};
pub use alien::AlienAi;
pub use civilian::CivilianAi;
pub use escape::{setup_escape, EscapePlan};
pub use mode::{escape_odds, evaluate_patrol_escape, patrol_odds, AiMode, ModeContext};
pub use snapshot::{
    decode_registry, encode_registry, AiKind, AiSnapshot, SnapshotError, SnapshotRegistry,
};

use crate::battle::Battle;
use crate::battlefield::{NodeGraph, NodeId, Position};
use crate::consts::MAX_VIEW_DISTANCE;
use crate::sight;
use crate::unit::{Faction, Unit};

/// A prepared objective: what one of the planning routines would have the
/// unit do, before the mode machine picks among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Objective {
    pub kind: ActionKind,
    pub target: Position,
    pub weapon: Option<WeaponSlot>,
    pub tu: i32,
}

impl Objective {
    pub fn rethink() -> Self {
        Self {
            kind: ActionKind::Rethink,
            target: Position::default(),
            weapon: None,
            tu: 0,
        }
    }
}

/// Common contract every behavior variant implements.
pub trait UnitAi {
    /// Called when the unit enters this behavior. No-op unless overridden.
    fn enter(&mut self, _battle: &mut Battle) {}

    /// Called when the behavior is torn down; must release any node claim.
    fn exit(&mut self, battle: &mut Battle);

    /// Decide this unit's action for the turn.
    fn think(&mut self, battle: &mut Battle) -> BattleAction;

    /// Capture the persistable slice of this behavior.
    fn snapshot(&self) -> AiSnapshot;

    /// Restore from a snapshot, resolving ids against the node graph.
    fn restore(&mut self, snapshot: &AiSnapshot, nodes: &mut NodeGraph);
}

/// Behavior state for one autonomous unit: one variant per archetype, with
/// the variant's data carried in the payload.
#[derive(Debug)]
pub enum AiState {
    Alien(AlienAi),
    Civilian(CivilianAi),
}

impl AiState {
    /// Build the right behavior variant for a unit's faction.
    pub fn for_unit(unit: &Unit, from_node: Option<NodeId>) -> AiState {
        match unit.faction {
            Faction::Neutral => AiState::Civilian(CivilianAi::new(unit, from_node)),
            _ => AiState::Alien(AlienAi::new(unit, from_node)),
        }
    }

    pub fn kind(&self) -> AiKind {
        match self {
            AiState::Alien(_) => AiKind::Alien,
            AiState::Civilian(_) => AiKind::Civilian,
        }
    }

    pub fn mode(&self) -> AiMode {
        match self {
            AiState::Alien(ai) => ai.mode(),
            AiState::Civilian(ai) => ai.mode(),
        }
    }

    /// Restore from a snapshot, refusing one taken from the other variant.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &AiSnapshot,
        nodes: &mut NodeGraph,
    ) -> Result<(), SnapshotError> {
        if snapshot.kind != self.kind() {
            return Err(SnapshotError::KindMismatch {
                expected: self.kind(),
                found: snapshot.kind,
            });
        }
        self.restore(snapshot, nodes);
        Ok(())
    }
}

impl UnitAi for AiState {
    fn enter(&mut self, battle: &mut Battle) {
        match self {
            AiState::Alien(ai) => ai.enter(battle),
            AiState::Civilian(ai) => ai.enter(battle),
        }
    }

    fn exit(&mut self, battle: &mut Battle) {
        match self {
            AiState::Alien(ai) => ai.exit(battle),
            AiState::Civilian(ai) => ai.exit(battle),
        }
    }

    fn think(&mut self, battle: &mut Battle) -> BattleAction {
        match self {
            AiState::Alien(ai) => ai.think(battle),
            AiState::Civilian(ai) => ai.think(battle),
        }
    }

    fn snapshot(&self) -> AiSnapshot {
        match self {
            AiState::Alien(ai) => ai.snapshot(),
            AiState::Civilian(ai) => ai.snapshot(),
        }
    }

    fn restore(&mut self, snapshot: &AiSnapshot, nodes: &mut NodeGraph) {
        match self {
            AiState::Alien(ai) => ai.restore(snapshot, nodes),
            AiState::Civilian(ai) => ai.restore(snapshot, nodes),
        }
    }
}

/// How many units of `spotter_faction` could see (and hit) `pos`.
///
/// When `pos` is not where the unit stands, the check pretends the unit
/// moved there by excluding it from its own firing lines. `known_cap`
/// limits the count to spotters the asking unit knows about.
pub(crate) fn spotting_units(
    battle: &Battle,
    me: &Unit,
    pos: Position,
    spotter_faction: Faction,
    known_cap: Option<i32>,
) -> i32 {
    let checking = pos != me.pos;
    let mut tally = 0;
    for u in battle.units() {
        if u.is_out() || u.faction != spotter_faction {
            continue;
        }
        if let Some(cap) = known_cap {
            if u.turns_since_spotted > cap {
                continue;
            }
        }
        if pos.distance(u.pos) > MAX_VIEW_DISTANCE {
            continue;
        }
        let origin = sight::sight_origin(u);
        let exclude = if checking { Some(me.id) } else { None };
        if sight::can_target(&battle.map, battle.units(), origin, pos, u.id, exclude) {
            tally += 1;
        }
    }
    tally
}
