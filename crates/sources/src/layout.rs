//! Receive-buffer layout for secondary events.
//!
//! Secondary events carry payloads of model-specific size, so every rank
//! needs to know where in its receive buffer each (origin, synapse type)
//! payload lands. The buffer is split into one equally sized chunk per
//! sending rank:
//!
//! ```text
//!   receive buffer
//!   ┌──────────────────┬──────────────────┬──────────────────┐
//!   │ chunk of rank 0  │ chunk of rank 1  │ chunk of rank 2  │
//!   │ a:s1 │ b:s1 │ .. │ c:s2 │ ...    │. │ ...              │
//!   └──────────────────┴──────────────────┴──────────────────┘
//!   ◄── chunk_size ───►
//! ```
//!
//! The chunk size is the maximum over all ranks of the payload words any
//! one rank receives from any other, agreed through a single collective
//! reduction, plus one word per chunk for the end marker written by the
//! delivery loop.

use axon_core::{NodeIdentity, SynapseRegistry, Transport};
use axon_types::{pack_source_gid_and_syn_id, NodeId, Rank, SynIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::info;

/// Published mapping from (origin, synapse type) to receive-buffer offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryBufferLayout {
    chunk_size: usize,
    num_processes: usize,
    local_max: usize,
    offsets: BTreeMap<u64, usize>,
}

impl SecondaryBufferLayout {
    /// Words per rank chunk, identical on every rank.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of rank chunks.
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Total receive buffer size in words.
    pub fn buffer_size(&self) -> usize {
        self.chunk_size * self.num_processes
    }

    /// Largest number of payload words this rank receives from one rank.
    pub fn local_max(&self) -> usize {
        self.local_max
    }

    /// Word range of `rank`'s chunk.
    pub fn chunk_range(&self, rank: Rank) -> Range<usize> {
        rank * self.chunk_size..(rank + 1) * self.chunk_size
    }

    /// Offset of the payload of `gid` on synapse type `syn_id`.
    pub fn offset(&self, gid: NodeId, syn_id: SynIndex) -> Option<usize> {
        self.offsets
            .get(&pack_source_gid_and_syn_id(gid, syn_id))
            .copied()
    }

    /// All offsets, keyed by packed (origin, synapse type).
    pub fn offsets(&self) -> &BTreeMap<u64, usize> {
        &self.offsets
    }

    /// Number of distinct (origin, synapse type) pairs laid out.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no secondary sources exist.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Lay out `keys` in the receive buffer.
///
/// Blocks in [`Transport::all_reduce_max`] until every rank gets here.
pub(crate) fn build_layout(
    keys: &BTreeSet<(NodeId, SynIndex)>,
    registry: &dyn SynapseRegistry,
    identity: &dyn NodeIdentity,
    transport: &dyn Transport,
) -> SecondaryBufferLayout {
    let num_processes = transport.num_processes();

    let mut words_per_rank = vec![0usize; num_processes];
    for &(gid, syn_id) in keys {
        words_per_rank[identity.process_of(gid)] += registry.secondary_event_size(syn_id);
    }
    let local_max = words_per_rank.iter().copied().max().unwrap_or(0);

    let global_max = transport.all_reduce_max(local_max as u64) as usize;
    let chunk_size = global_max + 1;

    let mut next_offset: Vec<usize> = (0..num_processes).map(|rank| rank * chunk_size).collect();
    let mut offsets = BTreeMap::new();
    for &(gid, syn_id) in keys {
        let rank = identity.process_of(gid);
        offsets.insert(pack_source_gid_and_syn_id(gid, syn_id), next_offset[rank]);
        next_offset[rank] += registry.secondary_event_size(syn_id);
    }

    info!(
        rank = transport.rank(),
        chunk_size,
        local_max,
        unique_sources = keys.len(),
        "Published secondary buffer layout"
    );

    SecondaryBufferLayout {
        chunk_size,
        num_processes,
        local_max,
        offsets,
    }
}
