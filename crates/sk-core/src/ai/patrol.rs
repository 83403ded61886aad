//! Patrol planning: walking the node graph, one waypoint at a time.

use tracing::debug;

use super::{ActionKind, Objective};
use crate::battle::Battle;
use crate::battlefield::{NodeClaim, NodeGraph, NodeId};
use crate::consts::PATROL_RETRIES;
use crate::pathfind;
use crate::unit::Unit;

/// Where a patrolling unit came from and where it is headed.
///
/// The destination is held as a [`NodeClaim`], so committing to a node
/// reserves it and no other unit will pick it until we arrive (or give up).
#[derive(Debug, Default)]
pub struct PatrolState {
    pub from_node: Option<NodeId>,
    to_claim: Option<NodeClaim>,
}

impl PatrolState {
    pub fn new(from_node: Option<NodeId>) -> Self {
        Self {
            from_node,
            to_claim: None,
        }
    }

    /// The node currently being walked to, if any.
    pub fn to_node(&self) -> Option<NodeId> {
        self.to_claim.as_ref().map(|c| c.id())
    }

    /// Release the destination claim, if held.
    pub fn release_destination(&mut self, nodes: &mut NodeGraph) {
        if let Some(claim) = self.to_claim.take() {
            nodes.release(claim);
        }
    }

    /// Restore from persisted ids. Bad ids degrade to none; a destination
    /// another unit holds is silently dropped rather than double-booked.
    pub fn restore(&mut self, from_raw: i32, to_raw: i32, nodes: &mut NodeGraph) {
        self.release_destination(nodes);
        self.from_node = nodes.resolve(from_raw);
        self.to_claim = nodes.resolve(to_raw).and_then(|id| nodes.allocate(id));
    }
}

/// Plan the next patrol leg.
///
/// On arrival the destination is promoted to the new origin and released.
/// With no origin, the nearest same-level node the unit fits is adopted.
/// Node selection prefers settled (linked, weighted) stops and falls back
/// to roaming; each pick is validated against the pathfinder before the
/// node is claimed. After a handful of failed picks the unit reports
/// Rethink and tries again next turn.
pub(crate) fn setup_patrol(battle: &mut Battle, me: &Unit, state: &mut PatrolState) -> Objective {
    if let Some(to) = state.to_node() {
        let arrived = battle.nodes.node(to).is_some_and(|n| n.pos == me.pos);
        if arrived {
            debug!(unit = me.id.0, node = to.0, "patrol destination reached");
            state.from_node = Some(to);
            state.release_destination(&mut battle.nodes);
        }
    }

    if state.from_node.is_none() {
        // adopt the closest node on this level that the unit actually fits,
        // or patrols get stuck bouncing off oversized doorways
        let mut closest = i32::MAX;
        for node in battle.nodes.nodes() {
            if node.pos.z != me.pos.z || !node.fits(me) {
                continue;
            }
            let d = me.pos.distance_sq(node.pos);
            if d < closest {
                closest = d;
                state.from_node = Some(node.id);
            }
        }
    }

    let mut tries_left = PATROL_RETRIES;
    while state.to_node().is_none() && tries_left > 0 {
        tries_left -= 1;

        let picked = battle
            .nodes
            .patrol_node(false, me, state.from_node, &battle.map, &mut battle.rng)
            .or_else(|| {
                battle
                    .nodes
                    .patrol_node(true, me, state.from_node, &battle.map, &mut battle.rng)
            });

        let Some(id) = picked else { continue };
        let Some(target) = battle.nodes.node(id).map(|n| n.pos) else {
            continue;
        };
        let route = pathfind::calculate(&battle.map, &battle.units, me, target, None, None);
        if route.is_reachable() {
            state.to_claim = battle.nodes.allocate(id);
        }
    }

    match state.to_node().and_then(|id| battle.nodes.node(id)) {
        Some(node) => Objective {
            kind: ActionKind::Walk,
            target: node.pos,
            weapon: None,
            tu: 0,
        },
        None => {
            debug!(unit = me.id.0, "no reachable patrol node");
            Objective::rethink()
        }
    }
}
