//! The static patrol-node graph.
//!
//! Nodes are waypoints authored into the map: each has a spawn rank, a
//! capability bitmask, a patrol desirability weight and links to up to five
//! neighbors. At most one unit may hold a node at a time; holding is
//! represented by a [`NodeClaim`] token that only the graph can mint and
//! only the graph can consume, so every acquire has exactly one release.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::map::BattleMap;
use super::pos::Position;
use crate::rng::BattleRng;
use crate::unit::Unit;

/// Identifier of a node; doubles as its index in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

bitflags! {
    /// Node capability requirements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct NodeFlags: u8 {
        /// Only flying units may use this node.
        const FLYING = 0x01;
        /// Only one-tile units fit here.
        const SMALL = 0x02;
        /// A unit died here recently; avoid it.
        const DANGEROUS = 0x04;
    }
}

/// A patrol waypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub pos: Position,
    /// Spawn class; rank 0 nodes are scout/civilian stops.
    pub rank: u8,
    pub flags: NodeFlags,
    /// Patrol desirability; non-scouts only visit weighted nodes.
    pub weight: u8,
    /// Neighboring node ids, up to five.
    pub links: Vec<NodeId>,
    /// Runtime-only: allocation is rebuilt from behavior snapshots on load.
    #[serde(skip)]
    allocated: bool,
}

impl Node {
    pub fn new(id: u32, pos: Position) -> Self {
        Self {
            id: NodeId(id),
            pos,
            rank: 0,
            flags: NodeFlags::empty(),
            weight: 1,
            links: Vec::new(),
            allocated: false,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Whether this unit satisfies the node's capability bits.
    pub fn fits(&self, unit: &Unit) -> bool {
        (!self.flags.contains(NodeFlags::SMALL) || unit.size == 1)
            && (!self.flags.contains(NodeFlags::FLYING) || unit.flying)
    }
}

/// Proof of exclusive ownership of a node.
///
/// There is no way to duplicate a claim; dropping one without handing it
/// back to [`NodeGraph::release`] leaks the node for the rest of the battle,
/// so behaviors route every claim through their `exit` path.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a node claim must be released back to the graph"]
pub struct NodeClaim {
    id: NodeId,
}

impl NodeClaim {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// The per-map waypoint graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGraph {
    nodes: Vec<Node>,
}

impl NodeGraph {
    /// Build a graph; node ids must match their index.
    pub fn new(nodes: Vec<Node>) -> Self {
        debug_assert!(nodes
            .iter()
            .enumerate()
            .all(|(i, n)| n.id.0 as usize == i));
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Resolve a persisted id; out-of-range values degrade to `None`.
    pub fn resolve(&self, raw: i32) -> Option<NodeId> {
        if raw < 0 || raw as usize >= self.nodes.len() {
            return None;
        }
        Some(NodeId(raw as u32))
    }

    /// Acquire exclusive ownership of a node. Returns `None` when the node
    /// does not exist or someone else already holds it.
    pub fn allocate(&mut self, id: NodeId) -> Option<NodeClaim> {
        let node = self.nodes.get_mut(id.0 as usize)?;
        if node.allocated {
            return None;
        }
        node.allocated = true;
        Some(NodeClaim { id })
    }

    /// Hand a claim back, freeing the node for other units.
    pub fn release(&mut self, claim: NodeClaim) {
        if let Some(node) = self.nodes.get_mut(claim.id.0 as usize) {
            node.allocated = false;
        }
    }

    /// Pick the next patrol destination for a unit.
    ///
    /// Scouts roam the whole graph; everyone else shuffles between nodes
    /// linked from their current one, and only visits desirable ones.
    /// Capability bits, allocation, danger marks and burning tiles all
    /// disqualify a candidate. The pick is random among the compliant
    /// nodes, with a coin-flip upgrade to the most desirable one.
    pub fn patrol_node(
        &self,
        scout: bool,
        unit: &Unit,
        from: Option<NodeId>,
        map: &BattleMap,
        rng: &mut BattleRng,
    ) -> Option<NodeId> {
        let candidates: Vec<NodeId> = if scout {
            self.nodes.iter().map(|n| n.id).collect()
        } else {
            let from_node = self.node(from?)?;
            from_node.links.clone()
        };

        let mut compliant: Vec<&Node> = Vec::new();
        let mut preferred: Option<&Node> = None;
        for id in candidates {
            let Some(node) = self.node(id) else { continue };
            if node.allocated
                || !node.fits(unit)
                || node.flags.contains(NodeFlags::DANGEROUS)
                || (!scout && node.weight == 0 && node.rank == 0)
                || (scout && Some(node.id) == from)
            {
                continue;
            }
            match map.tile(node.pos) {
                Some(tile) if !tile.on_fire() && !tile.dangerous() => {}
                _ => continue,
            }
            if preferred.is_none_or(|p| p.weight < node.weight) {
                preferred = Some(node);
            }
            compliant.push(node);
        }

        if compliant.is_empty() {
            // big guards that can't find a linked stop get to roam instead
            if unit.size > 1 && !scout {
                return self.patrol_node(true, unit, from, map, rng);
            }
            return None;
        }

        let picked = compliant[rng.generate(0, compliant.len() as i32 - 1) as usize];
        let preferred = preferred.expect("compliant list is non-empty");
        if picked.id != preferred.id && picked.rank > 0 && rng.percent(50) {
            return Some(preferred.id);
        }
        Some(picked.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Faction, Unit, UnitId, UnitStats};

    fn test_unit() -> Unit {
        Unit::new(
            UnitId(0),
            Faction::Hostile,
            Position::new(0, 0, 0),
            UnitStats::rank_and_file(),
        )
    }

    fn small_graph() -> NodeGraph {
        let mut a = Node::new(0, Position::new(1, 1, 0));
        a.links = vec![NodeId(1)];
        let mut b = Node::new(1, Position::new(4, 1, 0));
        b.rank = 1;
        b.links = vec![NodeId(0)];
        NodeGraph::new(vec![a, b])
    }

    #[test]
    fn test_allocation_is_exclusive() {
        let mut graph = small_graph();
        let claim = graph.allocate(NodeId(0)).expect("node free");
        assert!(graph.allocate(NodeId(0)).is_none());
        graph.release(claim);
        let again = graph.allocate(NodeId(0)).expect("released");
        graph.release(again);
    }

    #[test]
    fn test_allocate_missing_node() {
        let mut graph = small_graph();
        assert!(graph.allocate(NodeId(99)).is_none());
    }

    #[test]
    fn test_resolve_degrades_bad_ids() {
        let graph = small_graph();
        assert_eq!(graph.resolve(-1), None);
        assert_eq!(graph.resolve(2), None);
        assert_eq!(graph.resolve(1), Some(NodeId(1)));
    }

    #[test]
    fn test_patrol_node_follows_links() {
        let graph = small_graph();
        let map = BattleMap::new(8, 8, 1);
        let mut rng = BattleRng::new(1);
        let unit = test_unit();
        let next = graph.patrol_node(false, &unit, Some(NodeId(0)), &map, &mut rng);
        assert_eq!(next, Some(NodeId(1)));
    }

    #[test]
    fn test_patrol_node_skips_allocated() {
        let mut graph = small_graph();
        let claim = graph.allocate(NodeId(1)).unwrap();
        let map = BattleMap::new(8, 8, 1);
        let mut rng = BattleRng::new(1);
        let unit = test_unit();
        assert_eq!(
            graph.patrol_node(false, &unit, Some(NodeId(0)), &map, &mut rng),
            None
        );
        graph.release(claim);
    }

    #[test]
    fn test_patrol_node_respects_capability_bits() {
        let mut graph = small_graph();
        graph.nodes[1].flags = NodeFlags::FLYING;
        let map = BattleMap::new(8, 8, 1);
        let mut rng = BattleRng::new(1);
        let walker = test_unit();
        assert_eq!(
            graph.patrol_node(false, &walker, Some(NodeId(0)), &map, &mut rng),
            None
        );
        let mut flyer = test_unit();
        flyer.flying = true;
        assert_eq!(
            graph.patrol_node(false, &flyer, Some(NodeId(0)), &map, &mut rng),
            Some(NodeId(1))
        );
    }

    #[test]
    fn test_patrol_node_avoids_fire() {
        let graph = small_graph();
        let mut map = BattleMap::new(8, 8, 1);
        map.ignite(Position::new(4, 1, 0), 2);
        let mut rng = BattleRng::new(1);
        let unit = test_unit();
        assert_eq!(
            graph.patrol_node(false, &unit, Some(NodeId(0)), &map, &mut rng),
            None
        );
    }
}
