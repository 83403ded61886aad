//! The action value object handed back to the driver.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::battlefield::Position;
use crate::unit::UnitId;

/// What a unit decided to do with its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ActionKind {
    /// Deliberately do nothing (hold position, reserve TUs).
    None,
    Walk,
    SnapShot,
    AutoShot,
    AimedShot,
    Throw,
    Melee,
    /// No usable decision this call; the driver applies its default.
    Rethink,
}

/// Which equipped weapon an action uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum WeaponSlot {
    Main,
    MeleeArm,
    Grenade,
}

/// One decision, produced fresh by every `think` call and consumed
/// immediately by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleAction {
    pub kind: ActionKind,
    pub actor: UnitId,
    pub target: Position,
    pub weapon: Option<WeaponSlot>,
    /// TU cost the driver should charge for this action.
    pub tu: i32,
    /// Set while fleeing: the driver should ignore new targets en route.
    pub desperate: bool,
    /// Set when the unit is done for this turn after the action resolves.
    pub final_action: bool,
    /// Fire mode to reserve TUs for while patrolling, if any.
    pub reserve: Option<ActionKind>,
}

impl BattleAction {
    /// The explicit null action.
    pub fn rethink(actor: UnitId) -> Self {
        Self {
            kind: ActionKind::Rethink,
            actor,
            target: Position::default(),
            weapon: None,
            tu: 0,
            desperate: false,
            final_action: false,
            reserve: None,
        }
    }
}
