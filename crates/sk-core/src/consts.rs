//! Behavior-engine tuning constants.
//!
//! Every scoring weight, cap and threshold used by the decision code lives
//! here so balancing changes and tests can refer to them by name.

/// Base score for a cover candidate found by the systematic sweep.
pub const BASE_SYSTEMATIC_SCORE: i32 = 100;

/// Base score for a desperate (random-offset) cover candidate.
pub const BASE_DESPERATE_SCORE: i32 = 110;

/// Bonus for staying on the current tile when nobody is watching.
pub const STAY_PUT_BONUS: i32 = 15;

/// Score per tile of distance gained from (or lost toward) the threat.
pub const DISTANCE_WEIGHT: i32 = 10;

/// Score per spotter gained or shed by moving to a candidate tile.
pub const EXPOSURE_PENALTY: i32 = 10;

/// Flat penalty for a candidate tile that is burning.
pub const FIRE_PENALTY: i32 = 40;

/// Bonus for an ambush spot that adjoins cover.
pub const COVER_BONUS: i32 = 25;

/// A cover score good enough to stop searching early.
pub const ESCAPE_FAST_PASS: i32 = 100;

/// An ambush score good enough to stop searching early.
pub const AMBUSH_FAST_PASS: i32 = 80;

/// A fire-point score good enough to stop searching early.
pub const FIRE_POINT_FAST_PASS: i32 = 125;

/// Minimum fire-point score worth walking to at all.
pub const FIRE_POINT_MIN_SCORE: i32 = 70;

/// Sentinel marking "no usable candidate found".
pub const SCORE_SENTINEL: i32 = -100_000;

/// Hard cap on cover-search candidate evaluations per call.
pub const ESCAPE_SEARCH_CAP: usize = 150;

/// Candidates below this index come from the shuffled search pattern;
/// the rest are desperate random offsets.
pub const SYSTEMATIC_TRIES: usize = 121;

/// Half-width of the square tile-search pattern (11x11).
pub const SEARCH_SPAN: i32 = 5;

/// Node-selection attempts before a patrol gives up for the turn.
pub const PATROL_RETRIES: u32 = 5;

/// Maximum distance at which units see or spot each other.
pub const MAX_VIEW_DISTANCE: i32 = 20;

/// Maximum grenade throw distance.
pub const MAX_THROW_DISTANCE: i32 = 18;

/// Radius around the unit scanned for ambush spots.
pub const AMBUSH_RADIUS: i32 = 10;

/// Maximum distance a melee unit will consider charging.
pub const CHARGE_RANGE: i32 = 20;

/// Flat TU cost of readying a grenade from the belt.
pub const GRENADE_HANDLING_TU: i32 = 4;

/// Waypoints a guided projectile may string together.
pub const GUIDED_WAYPOINT_CAP: usize = 6;

/// Inside this range auto fire is preferred.
pub const AUTO_FIRE_RANGE: i32 = 4;

/// Beyond this range aimed fire is preferred.
pub const AIMED_FIRE_RANGE: i32 = 12;

/// Beyond this range snap shots are no longer worth the ammo.
pub const SNAP_FIRE_CEILING: i32 = 20;

/// Accumulated smoke along a sight line that blocks vision.
pub const SMOKE_SIGHT_BUDGET: i32 = 12;

/// Spotter count above which a unit re-evaluates its mode.
pub const SPOTTER_ALARM: i32 = 2;

/// Chance per turn of an idle patrol re-evaluating anyway.
pub const IDLE_REEVALUATE_PERCENT: i32 = 10;

/// Blast reaches targets within this many levels of the detonation.
pub const BLAST_HEIGHT: i32 = 1;
