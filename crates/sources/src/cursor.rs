//! Read cursors walking the source table during delivery.
//!
//! Every worker walks the whole table, all shards included, from the
//! highest position downward. Its live cursor records how far it got; a
//! checkpoint of that cursor bounds what compaction may erase.

use crate::SourceShard;
use axon_core::NodeIdentity;
use axon_types::{Rank, Source, SourcePosition, SynIndex, ThreadId};
use std::ops::Range;

/// Per-worker reading state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCursor {
    /// Next position to read; `None` once the table is exhausted.
    current: Option<SourcePosition>,
    /// Last position handed out, which may still be rejected.
    last_read: Option<SourcePosition>,
    /// Checkpointed position.
    saved: Option<SourcePosition>,
    saved_entry_point: bool,
}

impl ReadCursor {
    /// Next position to be read.
    pub fn current(&self) -> Option<SourcePosition> {
        self.current
    }

    /// Checkpointed position.
    pub fn saved(&self) -> Option<SourcePosition> {
        self.saved
    }

    /// Whether a checkpoint has been taken since the last restore.
    pub fn has_saved_entry_point(&self) -> bool {
        self.saved_entry_point
    }

    /// Checkpoint the cursor, unless a checkpoint is already pending.
    ///
    /// The last handed-out entry counts as unconsumed, since the caller may
    /// still reject it.
    pub fn save(&mut self) {
        if !self.saved_entry_point {
            self.saved = self.last_read.or(self.current);
            self.saved_entry_point = true;
        }
    }

    /// Rewind the live cursor to the checkpoint.
    pub fn restore(&mut self) {
        self.current = self.saved;
        self.last_read = None;
        self.saved_entry_point = false;
    }

    /// Point both cursor and checkpoint at the top of the table.
    pub(crate) fn reset(&mut self, shards: &[SourceShard]) {
        let top = highest_position(shards);
        self.current = top;
        self.saved = top;
        self.last_read = None;
        self.saved_entry_point = false;
    }

    /// Pull every position down to the highest entry still at or below it.
    ///
    /// Needed after entries were erased underneath the cursor, so no
    /// position points past the end of a slot.
    pub(crate) fn clamp(&mut self, shards: &[SourceShard]) {
        let clamp = |pos: Option<SourcePosition>| pos.and_then(|p| highest_at_or_below(shards, p));
        self.current = clamp(self.current);
        self.last_read = clamp(self.last_read);
        self.saved = clamp(self.saved);
    }

    /// Put the last handed-out entry back, to be read again.
    pub fn reject_last(&mut self) {
        if let Some(last) = self.last_read.take() {
            self.current = Some(last);
        }
    }
}

/// One worker's read access to the whole table.
///
/// Shards are shared read-only; only the worker's own cursor is mutable.
#[derive(Debug)]
pub struct SourceReader<'a> {
    tid: ThreadId,
    shards: &'a [SourceShard],
    cursor: &'a mut ReadCursor,
}

impl<'a> SourceReader<'a> {
    pub(crate) fn new(tid: ThreadId, shards: &'a [SourceShard], cursor: &'a mut ReadCursor) -> Self {
        Self {
            tid,
            shards,
            cursor,
        }
    }

    /// Worker this reader belongs to.
    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    /// The worker's cursor.
    pub fn cursor(&self) -> &ReadCursor {
        self.cursor
    }

    /// Checkpoint this worker's cursor.
    pub fn save_entry_point(&mut self) {
        self.cursor.save();
    }

    /// Rewind this worker's cursor to its checkpoint.
    pub fn restore_entry_point(&mut self) {
        self.cursor.restore();
    }

    /// Put the last returned source back.
    pub fn reject_last(&mut self) {
        self.cursor.reject_last();
    }

    /// Next enabled source whose origin lives on a rank in `ranks`.
    ///
    /// Walks downward from the cursor. Absent slots, disabled sources and
    /// origins outside `ranks` are stepped over, as are positions whose
    /// entries were erased since the cursor was placed.
    pub fn next_source(
        &mut self,
        ranks: Range<Rank>,
        identity: &dyn NodeIdentity,
    ) -> Option<(SourcePosition, Source)> {
        while let Some(pos) = self
            .cursor
            .current
            .and_then(|p| highest_at_or_below(self.shards, p))
        {
            let source = self.shards[pos.tid].get(pos.syn_id, pos.lcid);
            self.cursor.current = position_below(self.shards, pos);
            if source.is_disabled() || !ranks.contains(&identity.process_of(source.gid())) {
                continue;
            }
            self.cursor.last_read = Some(pos);
            return Some((pos, source));
        }
        self.cursor.current = None;
        None
    }
}

/// Highest existing entry in the table.
pub(crate) fn highest_position(shards: &[SourceShard]) -> Option<SourcePosition> {
    let tid = shards.len().checked_sub(1)?;
    highest_at_or_below(shards, SourcePosition::new(tid, SynIndex::MAX, usize::MAX))
}

/// Highest existing entry strictly below `pos`.
fn position_below(shards: &[SourceShard], pos: SourcePosition) -> Option<SourcePosition> {
    let bound = if pos.lcid > 0 {
        SourcePosition::new(pos.tid, pos.syn_id, pos.lcid - 1)
    } else if pos.syn_id > 0 {
        SourcePosition::new(pos.tid, pos.syn_id - 1, usize::MAX)
    } else if pos.tid > 0 {
        SourcePosition::new(pos.tid - 1, SynIndex::MAX, usize::MAX)
    } else {
        return None;
    };
    highest_at_or_below(shards, bound)
}

/// Highest existing entry at or below `bound`.
pub(crate) fn highest_at_or_below(shards: &[SourceShard], bound: SourcePosition) -> Option<SourcePosition> {
    let top_tid = bound.tid.min(shards.len().checked_sub(1)?);
    for tid in (0..=top_tid).rev() {
        let shard = &shards[tid];
        let Some(last_syn) = shard.num_slots().checked_sub(1) else {
            continue;
        };
        let top_syn = if tid == bound.tid {
            last_syn.min(usize::from(bound.syn_id))
        } else {
            last_syn
        };
        for syn_id in (0..=top_syn).rev() {
            let syn_id = syn_id as SynIndex;
            let Some(last_lcid) = shard.slot(syn_id).and_then(|s| s.len().checked_sub(1)) else {
                continue;
            };
            let lcid = if tid == bound.tid && syn_id == bound.syn_id {
                last_lcid.min(bound.lcid)
            } else {
                last_lcid
            };
            return Some(SourcePosition::new(tid, syn_id, lcid));
        }
    }
    None
}
