//! Compact origin record stored in the source table.

use crate::NodeId;
use std::fmt;

const GID_MASK: u64 = (1 << 62) - 1;
const PRIMARY_BIT: u64 = 1 << 62;
const DISABLED_BIT: u64 = 1 << 63;

/// Origin of one locally delivered connection.
///
/// Packed into a single 64-bit word: the low 62 bits hold the origin's
/// global id, bit 62 marks connections of a primary synapse type and bit 63
/// marks connections that were removed but not yet erased.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Source(u64);

// Compaction and cache-dense storage depend on this.
const _: () = assert!(std::mem::size_of::<Source>() == 8);

impl Source {
    /// Create an enabled source for `gid`.
    ///
    /// # Panics
    ///
    /// Panics if `gid` does not fit into 62 bits.
    pub fn new(gid: NodeId, is_primary: bool) -> Self {
        assert!(gid <= NodeId::MAX_SOURCE, "{gid} does not fit into a source entry");
        let mut bits = gid.0;
        if is_primary {
            bits |= PRIMARY_BIT;
        }
        Self(bits)
    }

    /// Global id of the origin.
    pub fn gid(&self) -> NodeId {
        NodeId(self.0 & GID_MASK)
    }

    /// Whether the connection belongs to a primary synapse type.
    pub fn is_primary(&self) -> bool {
        self.0 & PRIMARY_BIT != 0
    }

    /// Whether the connection has been logically removed.
    pub fn is_disabled(&self) -> bool {
        self.0 & DISABLED_BIT != 0
    }

    /// Mark the connection as removed.
    pub fn disable(&mut self) {
        self.0 |= DISABLED_BIT;
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("gid", &self.gid().0)
            .field("primary", &self.is_primary())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
