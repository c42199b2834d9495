//! Positions in the distributed source table.

use crate::{SynIndex, ThreadId};
use std::fmt;

/// A position in the source table: owning thread, synapse type, local index.
///
/// Ordered lexicographically. Readers walk the table from the highest
/// position downward, so every entry strictly above a checkpointed position
/// has been consumed. "No position" is expressed as `Option::None`, which
/// orders below every `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePosition {
    /// Thread owning the shard.
    pub tid: ThreadId,
    /// Synapse type slot within the shard.
    pub syn_id: SynIndex,
    /// Index within the slot.
    pub lcid: usize,
}

impl SourcePosition {
    /// Create a new position.
    pub fn new(tid: ThreadId, syn_id: SynIndex, lcid: usize) -> Self {
        Self { tid, syn_id, lcid }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.tid, self.syn_id, self.lcid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_order() {
        let a = SourcePosition::new(0, 5, 100);
        let b = SourcePosition::new(1, 0, 0);
        let c = SourcePosition::new(1, 0, 1);
        let d = SourcePosition::new(1, 1, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
    }

    #[test]
    fn test_no_position_is_minimum() {
        let none: Option<SourcePosition> = None;
        assert!(none < Some(SourcePosition::new(0, 0, 0)));
        assert_eq!(
            [None, Some(SourcePosition::new(0, 1, 0)), None]
                .into_iter()
                .max()
                .flatten(),
            Some(SourcePosition::new(0, 1, 0))
        );
    }
}
