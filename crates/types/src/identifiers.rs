//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker thread (virtual process) index within one rank.
pub type ThreadId = usize;

/// Index of a registered synapse type.
pub type SynIndex = u8;

/// Compute rank (process) index.
pub type Rank = usize;

/// Receptor port on a connection.
pub type Port = usize;

/// Synapse index reserved to mean "no synapse type".
pub const INVALID_SYNINDEX: SynIndex = SynIndex::MAX;

/// Global node identifier.
///
/// Ids are assigned network-wide; the identity service maps them to an
/// owning rank and a thread-local index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Largest id a `Source` entry can hold (62 bits).
    pub const MAX_SOURCE: Self = NodeId((1 << 62) - 1);

    /// Largest id that can be packed together with a synapse index (56 bits).
    pub const MAX_PACKABLE: Self = NodeId((1 << 56) - 1);

    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

/// Pack an origin id and synapse type into a single map key.
///
/// The synapse index fits in the low 8 bits, so shifting the id by 8 keeps
/// every (id, synapse type) pair unique.
///
/// # Panics
///
/// Panics if `gid` needs more than 56 bits or `syn_id` is the invalid index.
pub fn pack_source_gid_and_syn_id(gid: NodeId, syn_id: SynIndex) -> u64 {
    assert!(
        gid <= NodeId::MAX_PACKABLE,
        "{gid} does not fit into a packed source key"
    );
    assert!(syn_id != INVALID_SYNINDEX, "cannot pack invalid synapse index");
    (gid.0 << 8) | u64::from(syn_id)
}

/// Inverse of [`pack_source_gid_and_syn_id`].
pub fn unpack_source_gid_and_syn_id(key: u64) -> (NodeId, SynIndex) {
    (NodeId(key >> 8), (key & 0xff) as SynIndex)
}
