//! Behavioral modes and the weighted patrol-or-flee arbiter.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::rng::BattleRng;

/// Which sub-behavior governs a unit's turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[repr(u8)]
pub enum AiMode {
    #[default]
    Patrol = 0,
    Ambush = 1,
    Combat = 2,
    Escape = 3,
}

impl AiMode {
    /// Decode a persisted mode; out-of-range values degrade to Patrol.
    pub fn from_raw(raw: u8) -> AiMode {
        match raw {
            1 => AiMode::Ambush,
            2 => AiMode::Combat,
            3 => AiMode::Escape,
            _ => AiMode::Patrol,
        }
    }
}

/// Inputs to the patrol-or-flee draw.
#[derive(Debug, Clone, Copy)]
pub struct ModeContext {
    pub current: AiMode,
    pub visible_enemies: i32,
    pub spotting_enemies: i32,
    pub health: i32,
    pub max_health: i32,
    /// 0 = timid, 1 = steady, 2+ = bold.
    pub aggression: i32,
}

/// Weighted odds of choosing to keep patrolling.
pub fn patrol_odds(ctx: &ModeContext) -> f32 {
    // seeing the enemy makes wandering less appealing
    let mut odds = if ctx.visible_enemies > 0 { 15.0 } else { 30.0 };
    if ctx.current == AiMode::Patrol {
        odds *= 1.1;
    }
    odds
}

/// Weighted odds of choosing to run for cover.
///
/// Zero unless someone can actually see the unit; scaled up as health drops
/// and down with the unit's boldness; rescaled by the spotter count.
pub fn escape_odds(ctx: &ModeContext) -> f32 {
    let mut odds = if ctx.spotting_enemies > 0 { 15.0 } else { 0.0 };
    if ctx.current == AiMode::Escape {
        odds *= 1.1;
    }
    if ctx.health < ctx.max_health / 3 {
        odds *= 1.7;
    } else if ctx.health < 2 * (ctx.max_health / 3) {
        odds *= 1.4;
    } else if ctx.health < ctx.max_health {
        odds *= 1.1;
    }
    match ctx.aggression {
        0 => odds *= 1.4,
        1 => {}
        _ => odds *= 0.7,
    }
    if ctx.spotting_enemies > 0 {
        odds = 10.0 * odds * (ctx.spotting_enemies as f32 + 10.0) / 100.0;
    } else {
        odds /= 2.0;
    }
    odds
}

/// Draw between Patrol and Escape.
///
/// A uniform integer in `[1, patrol+escape]` decides: values above the
/// escape odds patrol, the rest flee. Always terminates and always returns
/// one of the two modes; with both odds at zero the unit patrols.
pub fn evaluate_patrol_escape(ctx: &ModeContext, rng: &mut BattleRng) -> AiMode {
    let patrol = patrol_odds(ctx).round() as i32;
    let escape = escape_odds(ctx).round() as i32;
    let decision = rng.generate(1, (patrol + escape).max(1));
    if decision > escape {
        AiMode::Patrol
    } else {
        AiMode::Escape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(current: AiMode, visible: i32, spotting: i32) -> ModeContext {
        ModeContext {
            current,
            visible_enemies: visible,
            spotting_enemies: spotting,
            health: 30,
            max_health: 30,
            aggression: 1,
        }
    }

    #[test]
    fn test_unseen_unit_never_flees() {
        let ctx = healthy(AiMode::Patrol, 0, 0);
        assert_eq!(escape_odds(&ctx), 0.0);
        let mut rng = BattleRng::new(5);
        for _ in 0..100 {
            assert_eq!(evaluate_patrol_escape(&ctx, &mut rng), AiMode::Patrol);
        }
    }

    #[test]
    fn test_spotters_raise_escape_odds() {
        let unseen = healthy(AiMode::Patrol, 0, 0);
        let spotted = healthy(AiMode::Patrol, 0, 3);
        assert!(escape_odds(&unseen) < escape_odds(&spotted));
    }

    #[test]
    fn test_contact_dampens_patrolling() {
        let quiet = healthy(AiMode::Combat, 0, 0);
        let contact = healthy(AiMode::Combat, 2, 0);
        assert!(patrol_odds(&contact) < patrol_odds(&quiet));
    }

    #[test]
    fn test_health_and_timidity_multipliers() {
        // hurt, timid, spotted by two: both the x1.7 health band and the
        // x1.4 timid-aggression factor must be in the final odds
        let wounded = ModeContext {
            current: AiMode::Patrol,
            visible_enemies: 1,
            spotting_enemies: 2,
            health: 6,
            max_health: 30,
            aggression: 0,
        };
        let baseline = healthy(AiMode::Patrol, 1, 2);
        let ratio = escape_odds(&wounded) / escape_odds(&baseline);
        assert!(ratio >= 2.3, "ratio was {ratio}");
        assert!((ratio - 1.7 * 1.4).abs() < 1e-3);
    }

    #[test]
    fn test_stickiness() {
        let patrolling = healthy(AiMode::Patrol, 0, 0);
        let idle = healthy(AiMode::Combat, 0, 0);
        assert!(patrol_odds(&patrolling) > patrol_odds(&idle));

        let fleeing = healthy(AiMode::Escape, 0, 2);
        let cornered = healthy(AiMode::Combat, 0, 2);
        assert!(escape_odds(&fleeing) > escape_odds(&cornered));
    }

    #[test]
    fn test_draw_terminates_with_zero_odds() {
        // escape-mode unit that nobody sees: both odds can collapse to zero
        let ctx = ModeContext {
            current: AiMode::Escape,
            visible_enemies: 1,
            spotting_enemies: 1,
            health: 30,
            max_health: 30,
            aggression: 2,
        };
        let mut rng = BattleRng::new(9);
        for _ in 0..100 {
            let mode = evaluate_patrol_escape(&ctx, &mut rng);
            assert!(mode == AiMode::Patrol || mode == AiMode::Escape);
        }
    }

    #[test]
    fn test_mode_from_raw_degrades() {
        assert_eq!(AiMode::from_raw(2), AiMode::Combat);
        assert_eq!(AiMode::from_raw(42), AiMode::Patrol);
    }
}
