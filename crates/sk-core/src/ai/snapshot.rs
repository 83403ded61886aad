//! Persistence of behavior state across save/load boundaries.
//!
//! Only small integers and ids cross the boundary: node ids with a -1
//! sentinel, the mode as a raw byte, and the cached escape cost. Ids are
//! resolved against the node graph at load time and degrade to "none"
//! rather than failing the load.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which behavior variant a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiKind {
    Alien,
    Civilian,
}

/// Per-unit behavior state, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSnapshot {
    pub kind: AiKind,
    /// Node id, -1 for none.
    pub from_node: i32,
    /// Node id, -1 for none.
    pub to_node: i32,
    /// Raw [`crate::ai::AiMode`] value.
    pub mode: u8,
    /// Cached escape cost; 0 when no plan was held.
    pub escape_tus: i32,
}

/// Snapshots for every autonomous unit, keyed by unit id.
pub type SnapshotRegistry = HashMap<u32, AiSnapshot>;

/// Errors surfaced by snapshot encoding and decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot registry: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot of kind {found:?} cannot restore a {expected:?} behavior")]
    KindMismatch { expected: AiKind, found: AiKind },
}

/// Serialize a registry to JSON.
pub fn encode_registry(registry: &SnapshotRegistry) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(registry)?)
}

/// Deserialize a registry from JSON.
pub fn decode_registry(json: &str) -> Result<SnapshotRegistry, SnapshotError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        let mut registry = SnapshotRegistry::new();
        registry.insert(
            0,
            AiSnapshot {
                kind: AiKind::Alien,
                from_node: 2,
                to_node: -1,
                mode: 2,
                escape_tus: 12,
            },
        );
        registry.insert(
            3,
            AiSnapshot {
                kind: AiKind::Civilian,
                from_node: -1,
                to_node: 0,
                mode: 3,
                escape_tus: 0,
            },
        );
        let json = encode_registry(&registry).unwrap();
        let restored = decode_registry(&json).unwrap();
        assert_eq!(restored, registry);
    }

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        assert!(decode_registry("{not json").is_err());
        assert!(decode_registry("[1,2,3]").is_err());
    }
}
