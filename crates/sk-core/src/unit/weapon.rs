//! Weapons and fire modes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Broad weapon classes the behavior code distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum WeaponClass {
    Firearm,
    Melee,
    Grenade,
}

/// An equipped weapon.
///
/// Fire-mode TU costs are percentages of the wielder's base TU stat; a cost
/// of 0 means the mode does not exist on this weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub class: WeaponClass,
    pub power: i32,
    pub accuracy_snap: i32,
    pub accuracy_auto: i32,
    pub accuracy_aimed: i32,
    pub tu_snap: i32,
    pub tu_auto: i32,
    pub tu_aimed: i32,
    pub tu_melee: i32,
    pub tu_prime: i32,
    pub tu_throw: i32,
    /// Blast radius in tiles; 0 for non-explosive weapons.
    pub blast_radius: i32,
    /// Guided projectiles can be steered around cover via waypoints.
    pub guided: bool,
}

impl Weapon {
    /// A basic ranged weapon with all three fire modes.
    pub fn rifle() -> Self {
        Self {
            name: "rifle".into(),
            class: WeaponClass::Firearm,
            power: 30,
            accuracy_snap: 60,
            accuracy_auto: 35,
            accuracy_aimed: 110,
            tu_snap: 25,
            tu_auto: 35,
            tu_aimed: 80,
            tu_melee: 0,
            tu_prime: 0,
            tu_throw: 0,
            blast_radius: 0,
            guided: false,
        }
    }

    /// A heavy plasma analogue: no auto mode, hits hard.
    pub fn heavy_gun() -> Self {
        Self {
            name: "heavy gun".into(),
            class: WeaponClass::Firearm,
            power: 85,
            accuracy_snap: 75,
            accuracy_auto: 0,
            accuracy_aimed: 100,
            tu_snap: 30,
            tu_auto: 0,
            tu_aimed: 60,
            tu_melee: 0,
            tu_prime: 0,
            tu_throw: 0,
            blast_radius: 0,
            guided: false,
        }
    }

    /// A guided launcher firing a steerable explosive projectile.
    pub fn guided_launcher() -> Self {
        Self {
            name: "guided launcher".into(),
            class: WeaponClass::Firearm,
            power: 120,
            accuracy_snap: 0,
            accuracy_auto: 0,
            accuracy_aimed: 115,
            tu_snap: 0,
            tu_auto: 0,
            tu_aimed: 55,
            tu_melee: 0,
            tu_prime: 0,
            tu_throw: 0,
            blast_radius: 5,
            guided: true,
        }
    }

    /// Natural melee attack (claws, mandibles).
    pub fn claws() -> Self {
        Self {
            name: "claws".into(),
            class: WeaponClass::Melee,
            power: 45,
            accuracy_snap: 0,
            accuracy_auto: 0,
            accuracy_aimed: 0,
            tu_snap: 0,
            tu_auto: 0,
            tu_aimed: 0,
            tu_melee: 20,
            tu_prime: 0,
            tu_throw: 0,
            blast_radius: 0,
            guided: false,
        }
    }

    /// A thrown explosive.
    pub fn grenade() -> Self {
        Self {
            name: "grenade".into(),
            class: WeaponClass::Grenade,
            power: 50,
            accuracy_snap: 0,
            accuracy_auto: 0,
            accuracy_aimed: 0,
            tu_snap: 0,
            tu_auto: 0,
            tu_aimed: 0,
            tu_melee: 0,
            tu_prime: 20,
            tu_throw: 25,
            blast_radius: 3,
            guided: false,
        }
    }

    pub fn has_snap(&self) -> bool {
        self.tu_snap > 0
    }

    pub fn has_auto(&self) -> bool {
        self.tu_auto > 0
    }

    pub fn has_aimed(&self) -> bool {
        self.tu_aimed > 0
    }

    pub fn is_explosive(&self) -> bool {
        self.blast_radius > 0
    }
}
