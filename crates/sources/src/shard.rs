//! One worker thread's portion of the source table.

use axon_types::{NodeId, Source, SourcePosition, SynIndex, ThreadId};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use tracing::{debug, trace};

/// Sources owned by one worker thread, one slot per synapse type.
///
/// Only the owning worker mutates a shard. Slots are `None` once compaction
/// or [`clear`](Self::clear) released them; [`resize`](Self::resize)
/// allocates them again.
#[derive(Debug, Default)]
pub struct SourceShard {
    slots: Vec<Option<Vec<Source>>>,
    is_cleared: bool,
}

impl SourceShard {
    /// Create a shard with an empty slot for each of `num_synapse_types`.
    pub fn new(num_synapse_types: usize) -> Self {
        let mut shard = Self::default();
        shard.resize(num_synapse_types);
        shard
    }

    /// Grow to `num_synapse_types` slots and allocate every absent slot.
    ///
    /// Idempotent. Never shrinks. A cleared shard that gets a slot allocated
    /// is no longer cleared.
    pub fn resize(&mut self, num_synapse_types: usize) {
        if self.slots.len() < num_synapse_types {
            self.slots.resize_with(num_synapse_types, || None);
        }
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(Vec::new());
                self.is_cleared = false;
            }
        }
    }

    /// Number of synapse-type slots.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Sources of a synapse type, or `None` if the slot is absent.
    ///
    /// # Panics
    ///
    /// Panics if `syn_id` is out of range.
    pub fn slot(&self, syn_id: SynIndex) -> Option<&[Source]> {
        self.slots[usize::from(syn_id)].as_deref()
    }

    /// Iterate over present slots with their synapse type.
    pub fn slots(&self) -> impl Iterator<Item = (SynIndex, &[Source])> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(syn_id, slot)| slot.as_deref().map(|s| (syn_id as SynIndex, s)))
    }

    /// Allocated capacity of a slot; zero if absent.
    pub fn capacity(&self, syn_id: SynIndex) -> usize {
        self.slots[usize::from(syn_id)]
            .as_ref()
            .map_or(0, Vec::capacity)
    }

    /// Total number of entries over all slots.
    pub fn len(&self) -> usize {
        self.slots().map(|(_, s)| s.len()).sum()
    }

    /// Whether every slot is absent or empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`clear`](Self::clear) released this shard.
    pub fn is_cleared(&self) -> bool {
        self.is_cleared
    }

    fn slot_mut(&mut self, syn_id: SynIndex) -> &mut Vec<Source> {
        let num_slots = self.slots.len();
        match self.slots.get_mut(usize::from(syn_id)) {
            Some(Some(sources)) => sources,
            Some(None) => panic!("slot for synapse type {syn_id} is absent"),
            None => panic!("synapse type {syn_id} out of range ({num_slots} slots)"),
        }
    }

    /// Append a source. Amortized O(1).
    ///
    /// # Panics
    ///
    /// Panics if the slot is absent or out of range.
    pub fn append(&mut self, syn_id: SynIndex, source: Source) {
        self.slot_mut(syn_id).push(source);
    }

    /// Reserve room for `count` more sources.
    pub fn reserve(&mut self, syn_id: SynIndex, count: usize) {
        self.slot_mut(syn_id).reserve(count);
    }

    /// Source at `lcid`.
    pub fn get(&self, syn_id: SynIndex, lcid: usize) -> Source {
        match self.slot(syn_id) {
            Some(sources) => sources[lcid],
            None => panic!("slot for synapse type {syn_id} is absent"),
        }
    }

    /// Mark the source at `lcid` as disabled.
    ///
    /// # Panics
    ///
    /// Panics if the source is already disabled.
    pub fn disable(&mut self, syn_id: SynIndex, lcid: usize) {
        let source = &mut self.slot_mut(syn_id)[lcid];
        assert!(
            !source.is_disabled(),
            "source {lcid} of synapse type {syn_id} is already disabled"
        );
        source.disable();
    }

    /// Erase the trailing run of disabled sources.
    ///
    /// Returns the index where the erased run started, or `None` when
    /// nothing was erased (absent slot, empty slot or no disabled tail).
    pub fn remove_disabled_suffix(&mut self, syn_id: SynIndex) -> Option<usize> {
        let sources = self.slots[usize::from(syn_id)].as_mut()?;
        let keep = sources
            .iter()
            .rposition(|s| !s.is_disabled())
            .map_or(0, |last_enabled| last_enabled + 1);
        if keep == sources.len() {
            return None;
        }

        let erased = sources.len() - keep;
        sources.truncate(keep);
        debug!(syn_id, erased, start = keep, "Removed disabled sources");
        Some(keep)
    }

    /// Number of runs of equal consecutive origin ids in a slot.
    ///
    /// Equal to the number of distinct origins once the slot is sorted.
    pub fn num_unique_sources(&self, syn_id: SynIndex) -> usize {
        let Some(sources) = self.slot(syn_id) else {
            return 0;
        };
        let mut last: Option<NodeId> = None;
        let mut count = 0;
        for source in sources {
            if last != Some(source.gid()) {
                last = Some(source.gid());
                count += 1;
            }
        }
        count
    }

    /// Release every slot and mark the shard cleared.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.is_cleared = true;
    }

    /// Erase everything this shard holds above `frontier`.
    ///
    /// Readers walk positions downward, so all entries strictly above the
    /// global frontier are consumed. Returns the number of erased entries.
    ///
    /// - frontier on this thread: slots above the frontier's synapse type
    ///   are released; the frontier's slot is cut after `frontier.lcid`
    /// - frontier on a lower thread (or no frontier): the whole shard is
    ///   consumed and released
    /// - frontier on a higher thread: nothing is touched
    pub fn compact(
        &mut self,
        tid: ThreadId,
        frontier: Option<SourcePosition>,
        min_deleted_elements: usize,
    ) -> usize {
        let erased = match frontier {
            Some(frontier) if frontier.tid == tid => {
                let mut erased = 0;
                let frontier_syn = usize::from(frontier.syn_id);
                for (syn_id, slot) in self.slots.iter_mut().enumerate().skip(frontier_syn) {
                    let Some(sources) = slot.as_mut() else {
                        continue;
                    };
                    if syn_id == frontier_syn {
                        let keep = frontier.lcid + 1;
                        if keep < sources.len() {
                            let deleted = sources.len() - keep;
                            sources.truncate(keep);
                            if deleted > min_deleted_elements {
                                sources.shrink_to_fit();
                                trace!(tid, syn_id, deleted, "Released slot capacity");
                            }
                            erased += deleted;
                        }
                    } else {
                        erased += sources.len();
                        *slot = None;
                    }
                }
                erased
            }
            Some(frontier) if frontier.tid > tid => 0,
            _ => {
                let erased = self.len();
                for slot in &mut self.slots {
                    *slot = None;
                }
                erased
            }
        };

        debug!(tid, ?frontier, erased, "Compacted source shard");
        erased
    }

    /// Insert every distinct (origin, synapse type) pair of the selected
    /// slots into `keys`. Disabled sources are skipped.
    pub(crate) fn collect_keys(
        &self,
        mut include: impl FnMut(SynIndex) -> bool,
        keys: &mut BTreeSet<(NodeId, SynIndex)>,
    ) {
        for (syn_id, sources) in self.slots() {
            if !include(syn_id) {
                continue;
            }
            keys.extend(
                sources
                    .iter()
                    .filter(|s| !s.is_disabled())
                    .map(|s| (s.gid(), syn_id)),
            );
        }
    }

    /// Human-readable listing of a slot, one line per origin id.
    pub fn dump(&self, syn_id: SynIndex) -> String {
        let mut out = String::new();
        let Some(sources) = self.slots.get(usize::from(syn_id)).and_then(|s| s.as_deref()) else {
            return out;
        };
        let mut last: Option<NodeId> = None;
        for source in sources {
            if last.is_some() && last != Some(source.gid()) {
                out.push('\n');
            }
            last = Some(source.gid());
            let _ = write!(out, "({}, {})", source.gid().0, u8::from(source.is_disabled()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard_with(gids: &[u64]) -> SourceShard {
        let mut shard = SourceShard::new(2);
        for &gid in gids {
            shard.append(0, Source::new(NodeId(gid), true));
        }
        shard
    }

    fn gids(shard: &SourceShard, syn_id: SynIndex) -> Vec<u64> {
        shard
            .slot(syn_id)
            .map(|s| s.iter().map(|s| s.gid().0).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_resize_is_idempotent() {
        let mut shard = SourceShard::new(2);
        shard.append(1, Source::new(NodeId(5), true));

        shard.resize(2);
        shard.resize(4);
        shard.resize(4);
        shard.resize(3);

        assert_eq!(shard.num_slots(), 4);
        assert_eq!(gids(&shard, 1), vec![5]);
        assert!(shard.slot(3).is_some());
    }

    #[test]
    fn test_resize_reallocates_released_slots() {
        let mut shard = shard_with(&[1, 2]);
        shard.compact(0, None, 0);
        assert!(shard.slot(0).is_none());

        shard.resize(2);
        assert_eq!(shard.slot(0), Some(&[][..]));
    }

    #[test]
    fn test_resize_after_clear_resets_cleared_flag() {
        let mut shard = shard_with(&[1, 2]);
        shard.clear();
        assert!(shard.is_cleared());

        shard.resize(2);
        assert!(!shard.is_cleared());
        shard.append(0, Source::new(NodeId(3), true));
        assert_eq!(gids(&shard, 0), vec![3]);

        // Nothing to allocate: the flag stays as it is.
        shard.resize(2);
        assert!(!shard.is_cleared());
    }

    #[test]
    fn test_remove_disabled_suffix() {
        let mut shard = shard_with(&[1, 2, 3]);
        shard.disable(0, 1);
        shard.disable(0, 2);

        assert_eq!(shard.remove_disabled_suffix(0), Some(1));
        assert_eq!(gids(&shard, 0), vec![1]);
    }

    #[test]
    fn test_remove_disabled_suffix_twice_erases_nothing() {
        let mut shard = shard_with(&[1, 2, 3]);
        shard.disable(0, 2);

        assert_eq!(shard.remove_disabled_suffix(0), Some(2));
        assert_eq!(shard.remove_disabled_suffix(0), None);
        assert_eq!(gids(&shard, 0), vec![1, 2]);
    }

    #[test]
    fn test_remove_disabled_suffix_all_disabled() {
        let mut shard = shard_with(&[1, 2, 3]);
        for lcid in 0..3 {
            shard.disable(0, lcid);
        }

        assert_eq!(shard.remove_disabled_suffix(0), Some(0));
        assert!(gids(&shard, 0).is_empty());
        assert_eq!(shard.remove_disabled_suffix(0), None);
    }

    #[test]
    fn test_remove_disabled_suffix_keeps_interior_disabled() {
        let mut shard = shard_with(&[1, 2, 3]);
        shard.disable(0, 0);

        assert_eq!(shard.remove_disabled_suffix(0), None);
        assert_eq!(shard.slot(0).unwrap().len(), 3);
    }

    #[test]
    fn test_remove_disabled_suffix_empty_or_absent() {
        let mut shard = SourceShard::new(2);
        assert_eq!(shard.remove_disabled_suffix(0), None);

        shard.clear();
        assert_eq!(shard.remove_disabled_suffix(0), None);
    }

    #[test]
    #[should_panic(expected = "already disabled")]
    fn test_double_disable_panics() {
        let mut shard = shard_with(&[1]);
        shard.disable(0, 0);
        shard.disable(0, 0);
    }

    #[test]
    #[should_panic(expected = "is absent")]
    fn test_append_to_absent_slot_panics() {
        let mut shard = shard_with(&[1]);
        shard.clear();
        shard.append(0, Source::new(NodeId(1), true));
    }

    #[test]
    fn test_num_unique_sources() {
        let shard = shard_with(&[3, 3, 4, 7, 7, 7]);
        assert_eq!(shard.num_unique_sources(0), 3);
        assert_eq!(shard.num_unique_sources(1), 0);
    }

    #[test]
    fn test_compact_frontier_slot_and_above() {
        let mut shard = shard_with(&[1, 2, 3, 4]);
        shard.append(1, Source::new(NodeId(9), false));

        let erased = shard.compact(0, Some(SourcePosition::new(0, 0, 1)), 100);

        assert_eq!(erased, 3);
        assert_eq!(gids(&shard, 0), vec![1, 2]);
        assert!(shard.slot(1).is_none());
    }

    #[test]
    fn test_compact_below_frontier_slot_untouched() {
        let mut shard = shard_with(&[1, 2]);
        shard.append(1, Source::new(NodeId(9), false));
        shard.append(1, Source::new(NodeId(10), false));

        shard.compact(0, Some(SourcePosition::new(0, 1, 0)), 100);

        assert_eq!(gids(&shard, 0), vec![1, 2]);
        assert_eq!(gids(&shard, 1), vec![9]);
    }

    #[test]
    fn test_compact_shrinks_after_large_erase() {
        let mut shard = SourceShard::new(1);
        for gid in 0..64 {
            shard.append(0, Source::new(NodeId(gid), true));
        }

        shard.compact(0, Some(SourcePosition::new(0, 0, 0)), 8);

        assert_eq!(shard.slot(0).unwrap().len(), 1);
        assert!(shard.capacity(0) < 64);
    }

    #[test]
    fn test_compact_lower_thread_frontier_clears_shard() {
        let mut shard = shard_with(&[1, 2]);
        let erased = shard.compact(1, Some(SourcePosition::new(0, 1, 5)), 0);
        assert_eq!(erased, 2);
        assert!(shard.is_empty());
        assert!(shard.slot(0).is_none());
    }

    #[test]
    fn test_compact_higher_thread_frontier_is_noop() {
        let mut shard = shard_with(&[1, 2]);
        let erased = shard.compact(0, Some(SourcePosition::new(1, 0, 0)), 0);
        assert_eq!(erased, 0);
        assert_eq!(gids(&shard, 0), vec![1, 2]);
    }

    #[test]
    fn test_dump_groups_by_gid() {
        let mut shard = shard_with(&[1, 1, 2]);
        shard.disable(0, 2);
        assert_eq!(shard.dump(0), "(1, 0)(1, 0)\n(2, 1)");
        assert_eq!(shard.dump(9), "");
    }
}
