//! Battlefield units.

mod weapon;

pub use weapon::{Weapon, WeaponClass};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::ai::ActionKind;
use crate::battlefield::Position;

/// Unique identifier for a unit; doubles as its index in the battle arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Which side a unit fights for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Faction {
    Player,
    #[default]
    Hostile,
    Neutral,
}

impl Faction {
    /// The faction this one hunts. Neutrals only ever fear hostiles.
    pub fn target(self) -> Faction {
        match self {
            Faction::Hostile => Faction::Player,
            _ => Faction::Hostile,
        }
    }
}

/// Immutable base stats a unit spawns with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Time units per turn.
    pub tu: i32,
    pub health: i32,
    /// 0 = timid, 1 = steady, 2+ = bold.
    pub aggression: i32,
    /// How many turns an enemy stays "known" after being spotted.
    pub intelligence: i32,
}

impl UnitStats {
    pub fn rank_and_file() -> Self {
        Self {
            tu: 54,
            health: 30,
            aggression: 1,
            intelligence: 3,
        }
    }

    pub fn veteran() -> Self {
        Self {
            tu: 60,
            health: 40,
            aggression: 2,
            intelligence: 5,
        }
    }

    pub fn civilian() -> Self {
        Self {
            tu: 40,
            health: 20,
            aggression: 0,
            intelligence: 1,
        }
    }
}

/// One unit in the battle arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub faction: Faction,
    pub pos: Position,
    pub tu: i32,
    pub health: i32,
    /// 0..=100; low morale makes explosives look more attractive.
    pub morale: i32,
    pub stats: UnitStats,
    /// Footprint in tiles per side (1 or 2).
    pub size: i32,
    pub flying: bool,
    pub conscious: bool,
    pub main_weapon: Option<Weapon>,
    pub melee_weapon: Option<Weapon>,
    pub grenade: Option<Weapon>,
    /// Turns since an enemy last saw this unit; 255 = never seen.
    pub turns_since_spotted: i32,
    /// Unit currently being charged for a melee attack, if any.
    pub charging: Option<UnitId>,
}

impl Unit {
    pub fn new(id: UnitId, faction: Faction, pos: Position, stats: UnitStats) -> Self {
        Self {
            id,
            faction,
            pos,
            tu: stats.tu,
            health: stats.health,
            morale: 100,
            stats,
            size: 1,
            flying: false,
            conscious: true,
            main_weapon: None,
            melee_weapon: None,
            grenade: None,
            turns_since_spotted: 255,
            charging: None,
        }
    }

    /// Dead or unconscious units take no part in the battle.
    pub fn is_out(&self) -> bool {
        self.health <= 0 || !self.conscious
    }

    /// TU cost of performing `kind` with `weapon`.
    ///
    /// Fire-mode costs are percentages of the base TU stat; melee and throw
    /// costs work the same way. A cost of 0 marks the mode unavailable.
    pub fn action_tu(&self, kind: ActionKind, weapon: &Weapon) -> i32 {
        let pct = match kind {
            ActionKind::SnapShot => weapon.tu_snap,
            ActionKind::AutoShot => weapon.tu_auto,
            ActionKind::AimedShot => weapon.tu_aimed,
            ActionKind::Melee => weapon.tu_melee,
            ActionKind::Throw => weapon.tu_throw,
            _ => 0,
        };
        self.stats.tu * pct / 100
    }

    /// TU cost of priming a grenade.
    pub fn prime_tu(&self, weapon: &Weapon) -> i32 {
        self.stats.tu * weapon.tu_prime / 100
    }

    /// Spend TU; returns false (and spends nothing) when short.
    pub fn spend_tu(&mut self, tu: i32) -> bool {
        if tu > self.tu {
            return false;
        }
        self.tu -= tu;
        true
    }

    /// Refresh per-turn budgets and age the spotted counter.
    pub fn start_turn(&mut self) {
        self.tu = self.stats.tu;
        if self.turns_since_spotted < 255 {
            self.turns_since_spotted += 1;
        }
    }
}
