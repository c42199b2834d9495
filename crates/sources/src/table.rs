//! The source table: every worker's shard plus every worker's read cursor.

use crate::cursor::{ReadCursor, SourceReader};
use crate::layout::{build_layout, SecondaryBufferLayout};
use crate::SourceShard;
use axon_core::{KernelContext, SynapseRegistry, WorkerPool};
use axon_types::{NodeId, Source, SourcePosition, SynIndex, ThreadId};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Origins of all locally delivered connections, sharded by worker thread.
#[derive(Debug, Default)]
pub struct SourceTable {
    shards: Vec<SourceShard>,
    cursors: Vec<ReadCursor>,
}

impl SourceTable {
    /// Create an empty, uninitialized table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate one shard per worker with an empty slot per synapse type and
    /// reset every cursor. Each worker initializes its own shard.
    pub fn initialize(&mut self, registry: &dyn SynapseRegistry, pool: &WorkerPool) {
        let num_threads = pool.num_threads();
        let num_synapse_types = registry.num_synapse_types();

        self.shards = (0..num_threads).map(|_| SourceShard::default()).collect();
        self.cursors = vec![ReadCursor::default(); num_threads];
        pool.for_each_worker(&mut self.shards, |_, shard| shard.resize(num_synapse_types));

        info!(num_threads, num_synapse_types, "Initialized source table");
    }

    /// Release all shards and cursors.
    pub fn finalize(&mut self) {
        if !self.is_cleared() {
            for shard in &mut self.shards {
                shard.clear();
            }
        }
        self.shards.clear();
        self.cursors.clear();
    }

    /// Number of shards.
    pub fn num_threads(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, tid: ThreadId) -> &SourceShard {
        assert!(
            tid < self.shards.len(),
            "thread {tid} out of range ({} shards)",
            self.shards.len()
        );
        &self.shards[tid]
    }

    fn shard_mut(&mut self, tid: ThreadId) -> &mut SourceShard {
        assert!(
            tid < self.shards.len(),
            "thread {tid} out of range ({} shards)",
            self.shards.len()
        );
        &mut self.shards[tid]
    }

    /// Read-only view of one worker's shard.
    pub fn thread_local_sources(&self, tid: ThreadId) -> &SourceShard {
        self.shard(tid)
    }

    /// All shards, for handing each worker its own during construction.
    pub fn shards_mut(&mut self) -> &mut [SourceShard] {
        &mut self.shards
    }

    /// Whether every shard has been cleared.
    pub fn is_cleared(&self) -> bool {
        self.shards.iter().all(SourceShard::is_cleared)
    }

    /// Release one worker's shard.
    pub fn clear(&mut self, tid: ThreadId) {
        self.shard_mut(tid).clear();
        self.clamp_cursors();
    }

    /// Grow a worker's shard to the registry's synapse-type count.
    pub fn resize(&mut self, tid: ThreadId, registry: &dyn SynapseRegistry) {
        let num_synapse_types = registry.num_synapse_types();
        self.shard_mut(tid).resize(num_synapse_types);
    }

    /// Append a source to a worker's shard.
    pub fn append(&mut self, tid: ThreadId, syn_id: SynIndex, source: Source) {
        self.shard_mut(tid).append(syn_id, source);
    }

    /// Reserve room for `count` more sources.
    pub fn reserve(&mut self, tid: ThreadId, syn_id: SynIndex, count: usize) {
        self.shard_mut(tid).reserve(syn_id, count);
    }

    /// Erase the trailing run of disabled sources of one slot.
    ///
    /// Returns where the erased run started, or `None` if nothing was erased.
    pub fn remove_disabled_suffix(&mut self, tid: ThreadId, syn_id: SynIndex) -> Option<usize> {
        let removed = self.shard_mut(tid).remove_disabled_suffix(syn_id);
        if removed.is_some() {
            self.clamp_cursors();
        }
        removed
    }

    /// Prune disabled tails of every slot of every shard in parallel.
    ///
    /// Returns the number of slots that shrank.
    pub fn remove_all_disabled_suffixes(&mut self, pool: &WorkerPool) -> usize {
        let pruned = AtomicUsize::new(0);
        pool.for_each_worker(&mut self.shards, |_, shard| {
            let count = (0..shard.num_slots())
                .filter(|&syn_id| shard.remove_disabled_suffix(syn_id as SynIndex).is_some())
                .count();
            pruned.fetch_add(count, Ordering::Relaxed);
        });
        let pruned = pruned.into_inner();
        if pruned > 0 {
            self.clamp_cursors();
        }
        pruned
    }

    /// Keep every cursor on entries that still exist.
    fn clamp_cursors(&mut self) {
        for cursor in &mut self.cursors {
            cursor.clamp(&self.shards);
        }
    }

    /// Mark a connection's source as disabled.
    pub fn disable_connection(&mut self, tid: ThreadId, syn_id: SynIndex, lcid: usize) {
        self.shard_mut(tid).disable(syn_id, lcid);
    }

    /// Origin id of a connection.
    pub fn get_gid(&self, tid: ThreadId, syn_id: SynIndex, lcid: usize) -> NodeId {
        self.shard(tid).get(syn_id, lcid).gid()
    }

    /// Number of distinct origins in a sorted slot.
    pub fn num_unique_sources(&self, tid: ThreadId, syn_id: SynIndex) -> usize {
        self.shard(tid).num_unique_sources(syn_id)
    }

    /// Human-readable listing of one slot.
    pub fn dump_sources(&self, tid: ThreadId, syn_id: SynIndex) -> String {
        self.shard(tid).dump(syn_id)
    }

    /// A worker's read cursor.
    pub fn cursor(&self, tid: ThreadId) -> &ReadCursor {
        &self.cursors[tid]
    }

    /// Point a worker's cursor and checkpoint at the top of the table.
    pub fn reset_entry_point(&mut self, tid: ThreadId) {
        self.cursors[tid].reset(&self.shards);
    }

    /// Checkpoint a worker's cursor.
    pub fn save_entry_point(&mut self, tid: ThreadId) {
        self.cursors[tid].save();
    }

    /// Rewind a worker's cursor to its checkpoint.
    pub fn restore_entry_point(&mut self, tid: ThreadId) {
        self.cursors[tid].restore();
    }

    /// One reader per worker, sharing the shards read-only.
    pub fn readers(&mut self) -> Vec<SourceReader<'_>> {
        let shards = &self.shards;
        self.cursors
            .iter_mut()
            .enumerate()
            .map(|(tid, cursor)| SourceReader::new(tid, shards, cursor))
            .collect()
    }

    /// Highest checkpointed position over all workers.
    ///
    /// Every entry above it has been consumed by every worker.
    pub fn find_global_frontier(&self) -> Option<SourcePosition> {
        self.cursors.iter().map(ReadCursor::saved).max().flatten()
    }

    /// Erase what one worker's shard holds above `frontier`.
    ///
    /// See [`SourceShard::compact`]. Returns the number of erased entries.
    pub fn compact(
        &mut self,
        tid: ThreadId,
        frontier: Option<SourcePosition>,
        min_deleted_elements: usize,
    ) -> usize {
        let erased = self.shard_mut(tid).compact(tid, frontier, min_deleted_elements);
        self.clamp_cursors();
        erased
    }

    /// Compute the global frontier and compact every shard in parallel.
    ///
    /// Returns the number of erased entries.
    pub fn compact_all(&mut self, pool: &WorkerPool, min_deleted_elements: usize) -> usize {
        let frontier = self.find_global_frontier();
        let erased = AtomicUsize::new(0);
        pool.for_each_worker(&mut self.shards, |tid, shard| {
            erased.fetch_add(
                shard.compact(tid, frontier, min_deleted_elements),
                Ordering::Relaxed,
            );
        });
        let erased = erased.into_inner();
        self.clamp_cursors();
        debug!(?frontier, erased, "Compacted source table");
        erased
    }

    /// Collect the distinct secondary (origin, synapse type) pairs of every
    /// shard, then lay them out in the receive buffer.
    ///
    /// Disabled sources are left out and get no room in the buffer, so a
    /// connection disabled before this call receives no secondary payload.
    ///
    /// Collective: every rank must call this, since the chunk size is agreed
    /// through [`Transport::all_reduce_max`](axon_core::Transport::all_reduce_max).
    pub fn compute_secondary_buffer_layout(
        &self,
        ctx: &KernelContext,
        pool: &WorkerPool,
    ) -> SecondaryBufferLayout {
        let registry = ctx.registry.as_ref();
        pool.collect_then_single(
            &self.shards,
            BTreeSet::new(),
            |_, shard, keys| {
                let mut local = BTreeSet::new();
                shard.collect_keys(|syn_id| !registry.is_primary(syn_id), &mut local);
                keys.lock().append(&mut local);
            },
            |keys| {
                build_layout(
                    &keys,
                    registry,
                    ctx.identity.as_ref(),
                    ctx.transport.as_ref(),
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::Transport;
    use axon_test_helpers::{
        single_rank_context, InProcessCluster, RoundRobinIdentity, StaticRegistry,
    };
    use axon_types::unpack_source_gid_and_syn_id;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn spike_registry() -> StaticRegistry {
        StaticRegistry::new().with_primary("static")
    }

    fn table(registry: &StaticRegistry, num_threads: usize) -> (SourceTable, WorkerPool) {
        let pool = WorkerPool::new(num_threads).unwrap();
        let mut table = SourceTable::new();
        table.initialize(registry, &pool);
        (table, pool)
    }

    fn gids(table: &SourceTable, tid: ThreadId, syn_id: SynIndex) -> Vec<u64> {
        table
            .thread_local_sources(tid)
            .slot(syn_id)
            .map(|s| s.iter().map(|s| s.gid().0).collect())
            .unwrap_or_default()
    }

    fn append_gids(table: &mut SourceTable, tid: ThreadId, syn_id: SynIndex, ids: &[u64]) {
        for &gid in ids {
            table.append(tid, syn_id, Source::new(NodeId(gid), true));
        }
    }

    #[test]
    #[traced_test]
    fn test_initialize_allocates_every_slot() {
        let registry = spike_registry().with_secondary("gap", 4);
        let (table, _pool) = table(&registry, 3);

        assert_eq!(table.num_threads(), 3);
        for tid in 0..3 {
            let shard = table.thread_local_sources(tid);
            assert_eq!(shard.num_slots(), 2);
            assert!(shard.slot(0).is_some());
            assert!(shard.slot(1).is_some());
            assert!(shard.is_empty());
        }
        assert!(!table.is_cleared());
        assert!(logs_contain("Initialized source table"));
    }

    #[test]
    fn test_resize_after_new_registration() {
        let mut registry = spike_registry();
        let (mut table, _pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[1, 2]);

        let syn_id = registry.register("gap", Some(2));
        table.resize(0, &registry);
        table.resize(0, &registry);

        assert_eq!(table.thread_local_sources(0).num_slots(), 2);
        assert_eq!(table.thread_local_sources(1).num_slots(), 1);
        append_gids(&mut table, 0, syn_id, &[3]);
        assert_eq!(gids(&table, 0, 0), vec![1, 2]);
        assert_eq!(gids(&table, 0, syn_id), vec![3]);
    }

    #[test]
    fn test_parallel_construction_is_shard_isolated() {
        let registry = spike_registry();
        let (mut table, pool) = table(&registry, 4);

        pool.for_each_worker(table.shards_mut(), |tid, shard| {
            shard.reserve(0, 1000);
            for i in 0..1000 {
                shard.append(0, Source::new(NodeId((tid * 10_000 + i) as u64), true));
            }
        });

        for tid in 0..4 {
            let ids = gids(&table, tid, 0);
            assert_eq!(ids.len(), 1000);
            assert!(ids.iter().all(|&gid| gid / 10_000 == tid as u64));
        }
    }

    #[test]
    fn test_remove_disabled_suffix_scenario() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 1);
        append_gids(&mut table, 0, 0, &[1, 2, 3]);
        table.disable_connection(0, 0, 1);
        table.disable_connection(0, 0, 2);

        assert_eq!(table.remove_disabled_suffix(0, 0), Some(1));
        assert_eq!(gids(&table, 0, 0), vec![1]);
        assert_eq!(table.remove_disabled_suffix(0, 0), None);
    }

    #[test]
    fn test_remove_all_disabled_suffixes() {
        let registry = spike_registry().with_primary("stdp");
        let (mut table, pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[1, 2]);
        append_gids(&mut table, 1, 1, &[3, 4]);
        table.disable_connection(0, 0, 1);
        table.disable_connection(1, 1, 0);

        assert_eq!(table.remove_all_disabled_suffixes(&pool), 1);
        assert_eq!(gids(&table, 0, 0), vec![1]);
        assert_eq!(gids(&table, 1, 1), vec![3, 4]);
    }

    #[test]
    fn test_get_gid_and_unique_sources() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 1);
        append_gids(&mut table, 0, 0, &[4, 4, 9]);

        assert_eq!(table.get_gid(0, 0, 2), NodeId(9));
        assert_eq!(table.num_unique_sources(0, 0), 2);
        assert_eq!(table.dump_sources(0, 0), "(4, 0)(4, 0)\n(9, 0)");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_thread_panics() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 2);
        append_gids(&mut table, 2, 0, &[1]);
    }

    #[test]
    fn test_frontier_is_maximum_checkpoint() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[10, 11, 12]);
        append_gids(&mut table, 1, 0, &[20, 21, 22]);

        assert_eq!(table.find_global_frontier(), None);

        for tid in 0..2 {
            table.reset_entry_point(tid);
            table.save_entry_point(tid);
        }
        assert_eq!(
            table.find_global_frontier(),
            Some(SourcePosition::new(1, 0, 2))
        );
    }

    #[test]
    fn test_compaction_scenario_two_threads() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[10, 11, 12]);
        append_gids(&mut table, 1, 0, &[20, 21, 22]);
        for tid in 0..2 {
            table.reset_entry_point(tid);
            table.save_entry_point(tid);
        }
        let frontier = table.find_global_frontier();
        assert_eq!(frontier, Some(SourcePosition::new(1, 0, 2)));

        // Frontier owner has the larger index: thread 0 is not yet consumed.
        assert_eq!(table.compact(0, frontier, 0), 0);
        assert_eq!(gids(&table, 0, 0), vec![10, 11, 12]);

        // Frontier sits on the last entry of thread 1: nothing above it.
        assert_eq!(table.compact(1, frontier, 0), 0);
        assert_eq!(gids(&table, 1, 0), vec![20, 21, 22]);
    }

    #[test]
    fn test_compaction_clears_shards_above_frontier_thread() {
        let registry = spike_registry();
        let (mut table, pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[10, 11, 12]);
        append_gids(&mut table, 1, 0, &[20, 21, 22]);

        // Every worker read all of thread 1 and stopped inside thread 0.
        {
            let identity = RoundRobinIdentity::new(1, 2);
            let mut readers = table.readers();
            for reader in readers.iter_mut() {
                for _ in 0..5 {
                    reader.next_source(0..1, &identity);
                }
                reader.save_entry_point();
            }
        }
        assert_eq!(
            table.find_global_frontier(),
            Some(SourcePosition::new(0, 0, 1))
        );

        assert_eq!(table.compact_all(&pool, 0), 4);
        assert_eq!(gids(&table, 0, 0), vec![10, 11]);
        assert!(table.thread_local_sources(1).slot(0).is_none());
    }

    #[test]
    fn test_frontier_safety_randomized() {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let registry = spike_registry().with_primary("a").with_primary("b");
        let identity = RoundRobinIdentity::new(1, 4);

        for _ in 0..50 {
            let (mut table, pool) = table(&registry, 4);
            for tid in 0..4 {
                for syn_id in 0..3u8 {
                    let n = rng.gen_range(0..6);
                    for lcid in 0..n {
                        let gid = (tid * 1000 + usize::from(syn_id) * 100 + lcid) as u64;
                        table.append(tid, syn_id, Source::new(NodeId(gid), true));
                    }
                }
            }
            for tid in 0..4 {
                table.reset_entry_point(tid);
            }
            let steps: Vec<usize> = (0..4).map(|_| rng.gen_range(0..40)).collect();
            {
                let mut readers = table.readers();
                for (reader, &n) in readers.iter_mut().zip(&steps) {
                    for _ in 0..n {
                        reader.next_source(0..1, &identity);
                    }
                    reader.save_entry_point();
                }
            }

            let frontier = table.find_global_frontier();
            let mut kept = Vec::new();
            for tid in 0..4 {
                for (syn_id, sources) in table.thread_local_sources(tid).slots() {
                    for (lcid, source) in sources.iter().enumerate() {
                        let pos = SourcePosition::new(tid, syn_id, lcid);
                        if Some(pos) <= frontier {
                            kept.push((pos, source.gid()));
                        }
                    }
                }
            }

            table.compact_all(&pool, 2);

            for (pos, gid) in &kept {
                assert_eq!(table.get_gid(pos.tid, pos.syn_id, pos.lcid), *gid);
            }
            let remaining: usize = (0..4).map(|t| table.thread_local_sources(t).len()).sum();
            assert_eq!(remaining, kept.len(), "entries above {frontier:?} survived");
        }
    }

    #[test]
    fn test_pruning_pulls_cursors_onto_remaining_entries() {
        let registry = spike_registry();
        let (mut table, pool) = table(&registry, 1);
        let identity = RoundRobinIdentity::new(1, 1);
        append_gids(&mut table, 0, 0, &[1, 2, 3]);
        table.disable_connection(0, 0, 2);
        table.reset_entry_point(0);
        assert_eq!(table.cursor(0).current(), Some(SourcePosition::new(0, 0, 2)));

        assert_eq!(table.remove_all_disabled_suffixes(&pool), 1);
        assert_eq!(table.cursor(0).current(), Some(SourcePosition::new(0, 0, 1)));
        assert_eq!(table.cursor(0).saved(), Some(SourcePosition::new(0, 0, 1)));

        table.restore_entry_point(0);
        let mut readers = table.readers();
        let read: Vec<u64> = std::iter::from_fn(|| readers[0].next_source(0..1, &identity))
            .map(|(_, source)| source.gid().0)
            .collect();
        assert_eq!(read, vec![2, 1]);
    }

    #[test]
    fn test_resume_after_pruning_and_compaction_randomized() {
        let mut rng = ChaCha8Rng::seed_from_u64(4242);
        let registry = spike_registry().with_primary("a").with_primary("b");
        let identity = RoundRobinIdentity::new(1, 4);

        for _ in 0..50 {
            let (mut table, pool) = table(&registry, 4);
            let mut enabled = Vec::new();
            for tid in 0..4 {
                for syn_id in 0..3u8 {
                    let n = rng.gen_range(0..6);
                    for lcid in 0..n {
                        let gid = (tid * 1000 + usize::from(syn_id) * 100 + lcid) as u64;
                        table.append(tid, syn_id, Source::new(NodeId(gid), true));
                        if rng.gen_bool(0.3) {
                            table.disable_connection(tid, syn_id, lcid);
                        } else {
                            enabled.push((SourcePosition::new(tid, syn_id, lcid), NodeId(gid)));
                        }
                    }
                }
            }
            enabled.sort();

            for tid in 0..4 {
                table.reset_entry_point(tid);
            }
            let mut consumed = vec![Vec::new(); 4];
            {
                let mut readers = table.readers();
                for (reader, consumed) in readers.iter_mut().zip(&mut consumed) {
                    for _ in 0..rng.gen_range(0..40) {
                        if let Some((pos, source)) = reader.next_source(0..1, &identity) {
                            consumed.push((pos, source.gid()));
                        }
                    }
                    // The last handed-out source counts as unconsumed.
                    consumed.pop();
                }
            }

            table.remove_all_disabled_suffixes(&pool);
            for tid in 0..4 {
                table.save_entry_point(tid);
            }
            let frontier = table.find_global_frontier();
            table.compact_all(&pool, 2);

            let saved: Vec<_> = (0..4).map(|tid| table.cursor(tid).saved()).collect();
            let mut readers = table.readers();
            for (tid, reader) in readers.iter_mut().enumerate() {
                assert!(saved[tid] <= frontier);
                reader.restore_entry_point();
                let mut resumed = Vec::new();
                while let Some((pos, source)) = reader.next_source(0..1, &identity) {
                    resumed.push((pos, source.gid()));
                }

                let expected: Vec<_> = enabled
                    .iter()
                    .rev()
                    .filter(|(pos, _)| Some(*pos) <= saved[tid])
                    .copied()
                    .collect();
                assert_eq!(resumed, expected, "thread {tid} resumed from {:?}", saved[tid]);

                let mut all = consumed[tid].clone();
                all.extend(resumed);
                all.sort();
                assert_eq!(all, enabled, "thread {tid} lost or repeated an entry");
            }
        }
    }

    #[test]
    fn test_clear_and_finalize() {
        let registry = spike_registry();
        let (mut table, _pool) = table(&registry, 2);
        append_gids(&mut table, 0, 0, &[1]);

        table.clear(0);
        assert!(!table.is_cleared());
        table.clear(1);
        assert!(table.is_cleared());

        table.finalize();
        assert_eq!(table.num_threads(), 0);
    }

    #[test]
    fn test_secondary_layout_single_rank() {
        let registry = || {
            spike_registry()
                .with_secondary("gap", 3)
                .with_secondary("rate", 5)
        };
        let ctx = single_rank_context(registry(), 2);
        let (mut table, pool) = table(&registry(), 2);

        append_gids(&mut table, 0, 0, &[1, 2]);
        for gid in [7, 7, 8] {
            table.append(0, 1, Source::new(NodeId(gid), false));
        }
        table.append(1, 1, Source::new(NodeId(7), false));
        table.append(1, 2, Source::new(NodeId(7), false));
        table.append(1, 2, Source::new(NodeId(9), false));
        table.disable_connection(1, 2, 1);

        let layout = table.compute_secondary_buffer_layout(&ctx, &pool);

        // (7, gap) + (8, gap) + (7, rate); the disabled (9, rate) is skipped.
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.local_max(), 3 + 3 + 5);
        assert_eq!(layout.chunk_size(), 12);
        assert_eq!(layout.buffer_size(), 12);
        assert_eq!(layout.offset(NodeId(7), 1), Some(0));
        assert_eq!(layout.offset(NodeId(7), 2), Some(3));
        assert_eq!(layout.offset(NodeId(8), 1), Some(8));
        assert_eq!(layout.offset(NodeId(1), 0), None);
        assert_eq!(layout.offset(NodeId(9), 2), None);
    }

    #[test]
    fn test_secondary_layout_without_secondary_types() {
        let registry = spike_registry();
        let ctx = single_rank_context(spike_registry(), 1);
        let (mut table, pool) = table(&registry, 1);
        append_gids(&mut table, 0, 0, &[1, 2]);

        let layout = table.compute_secondary_buffer_layout(&ctx, &pool);
        assert!(layout.is_empty());
        assert_eq!(layout.chunk_size(), 1);
    }

    #[test]
    fn test_secondary_layout_agrees_across_ranks() {
        const RANKS: usize = 3;
        const THREADS: usize = 2;
        let cluster = InProcessCluster::new(RANKS);

        let handles: Vec<_> = cluster
            .transports()
            .into_iter()
            .map(|transport| {
                std::thread::spawn(move || {
                    let rank = transport.rank();
                    let registry = Arc::new(
                        StaticRegistry::new()
                            .with_primary("static")
                            .with_secondary("gap", 2)
                            .with_secondary("rate", 3),
                    );
                    let identity = Arc::new(RoundRobinIdentity::new(RANKS, THREADS));
                    let ctx = KernelContext::new(registry.clone(), identity, Arc::new(transport));
                    let pool = WorkerPool::new(THREADS).unwrap();
                    let mut table = SourceTable::new();
                    table.initialize(registry.as_ref(), &pool);

                    // Rank r sees (r + 1) * 4 distinct secondary origins.
                    for i in 0..(rank + 1) * 4 {
                        let gid = NodeId(100 + i as u64);
                        let syn_id = 1 + (i % 2) as SynIndex;
                        table.append(i % THREADS, syn_id, Source::new(gid, false));
                        table.append(i % THREADS, syn_id, Source::new(gid, false));
                    }

                    let layout = table.compute_secondary_buffer_layout(&ctx, &pool);
                    (layout, registry, ctx)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let chunk_size = results[0].0.chunk_size();
        for (layout, registry, ctx) in &results {
            assert_eq!(layout.chunk_size(), chunk_size);
            assert!(layout.chunk_size() > layout.local_max());
            assert_eq!(layout.num_processes(), RANKS);

            // No two keys overlap, and each stays inside its origin's chunk.
            let mut ranges: Vec<_> = layout
                .offsets()
                .iter()
                .map(|(&key, &offset)| {
                    let (gid, syn_id) = unpack_source_gid_and_syn_id(key);
                    let rank = ctx.identity.process_of(gid);
                    let end = offset + registry.secondary_event_size(syn_id);
                    let chunk = layout.chunk_range(rank);
                    assert!(chunk.start <= offset && end < chunk.end);
                    offset..end
                })
                .collect();
            ranges.sort_by_key(|r| r.start);
            for pair in ranges.windows(2) {
                assert!(pair[0].end <= pair[1].start, "overlap: {pair:?}");
            }
        }
    }
}
