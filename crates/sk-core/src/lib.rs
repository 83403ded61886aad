//! sk-core: battle logic for the Skirmish tactical engine.
//!
//! This crate contains the turn-based unit-behavior engine and the
//! battlefield services it consumes (pathfinding, sight, the patrol-node
//! graph), with no I/O dependencies. It is designed to be pure and
//! testable: the driver owns the loop, this crate owns the decisions.

pub mod ai;
pub mod battle;
pub mod battlefield;
pub mod pathfind;
pub mod sight;
pub mod unit;

mod consts;
mod rng;

pub use battle::Battle;
pub use consts::*;
pub use rng::BattleRng;
