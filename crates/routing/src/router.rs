//! Connection router: construction and synchronization across both tables.

use axon_core::{KernelContext, NodeRef, RoutingConfig, SynapseRegistry, WorkerPool};
use axon_devices::{DeviceShard, TargetTableDevices};
use axon_sources::{SecondaryBufferLayout, SourceReader, SourceShard, SourceTable};
use axon_types::{NodeId, RoutingError, Source, SourcePosition, SynIndex, SynapseStatus, ThreadId};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one [`ConnectionRouter::synchronize`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Slots whose disabled tail was pruned.
    pub pruned_slots: usize,
    /// Distinct secondary (origin, synapse type) pairs laid out.
    pub secondary_sources: usize,
    /// Agreed chunk size of the secondary receive buffer.
    pub chunk_size: usize,
    /// Global frontier compaction ran against.
    pub frontier: Option<SourcePosition>,
    /// Source entries released by compaction.
    pub erased: usize,
}

/// Owns the routing tables of one rank and the workers that fill them.
#[derive(Debug)]
pub struct ConnectionRouter {
    ctx: KernelContext,
    config: RoutingConfig,
    pool: WorkerPool,
    sources: SourceTable,
    devices: TargetTableDevices,
    secondary_layout: SecondaryBufferLayout,
}

impl ConnectionRouter {
    /// Build the worker pool and initialize both tables.
    pub fn new(ctx: KernelContext, config: RoutingConfig) -> Result<Self, RoutingError> {
        config.validate()?;
        let pool = WorkerPool::new(config.num_threads)?;

        let mut sources = SourceTable::new();
        sources.initialize(ctx.registry.as_ref(), &pool);

        let mut devices = TargetTableDevices::new();
        devices.initialize(config.num_threads);
        let identity = ctx.identity.as_ref();
        pool.for_each_worker(devices.shards_mut(), |_, shard| {
            shard.resize_to_number_of_neurons(identity)
        });

        info!(
            rank = ctx.transport.rank(),
            num_threads = config.num_threads,
            num_synapse_types = ctx.registry.num_synapse_types(),
            "Created connection router"
        );

        Ok(Self {
            ctx,
            config,
            pool,
            sources,
            devices,
            secondary_layout: SecondaryBufferLayout::default(),
        })
    }

    /// Kernel collaborators.
    pub fn context(&self) -> &KernelContext {
        &self.ctx
    }

    /// Active configuration.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Worker pool shared by both tables.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Source table.
    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    /// Source table, mutable.
    pub fn sources_mut(&mut self) -> &mut SourceTable {
        &mut self.sources
    }

    /// Device tables.
    pub fn devices(&self) -> &TargetTableDevices {
        &self.devices
    }

    /// Device tables, mutable.
    pub fn devices_mut(&mut self) -> &mut TargetTableDevices {
        &mut self.devices
    }

    /// Layout published by the last [`synchronize`](Self::synchronize).
    pub fn secondary_layout(&self) -> &SecondaryBufferLayout {
        &self.secondary_layout
    }

    /// Grow every shard to the registry's current synapse-type count.
    pub fn register_synapse_types(&mut self) {
        let num_synapse_types = self.ctx.registry.num_synapse_types();
        self.pool
            .for_each_worker(self.sources.shards_mut(), |_, shard| {
                shard.resize(num_synapse_types)
            });
        debug!(num_synapse_types, "Resized source shards");
    }

    /// Swap in a registry with more synapse types and resize the shards.
    pub fn set_registry(&mut self, registry: Arc<dyn SynapseRegistry>) {
        assert!(
            registry.num_synapse_types() >= self.ctx.registry.num_synapse_types(),
            "synapse types cannot be unregistered"
        );
        self.ctx.registry = registry;
        self.register_synapse_types();
    }

    /// Record a connection from `source_gid` delivered by worker `tid`.
    pub fn connect(&mut self, tid: ThreadId, syn_id: SynIndex, source_gid: NodeId) {
        let is_primary = self.ctx.registry.is_primary(syn_id);
        self.sources
            .append(tid, syn_id, Source::new(source_gid, is_primary));
    }

    /// Connect network node `source` to the device `target` on worker `tid`.
    #[allow(clippy::too_many_arguments)]
    pub fn connect_to_device(
        &mut self,
        tid: ThreadId,
        source: &NodeRef,
        target: &NodeRef,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        self.devices.add_connection_to_device(
            &self.ctx, source, target, source.gid, tid, syn_id, params, delay, weight,
        )
    }

    /// Connect the device `source` to `target` on worker `tid`.
    #[allow(clippy::too_many_arguments)]
    pub fn connect_from_device(
        &mut self,
        tid: ThreadId,
        source: &NodeRef,
        target: &NodeRef,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        self.devices.add_connection_from_device(
            &self.ctx, source, target, tid, syn_id, params, delay, weight,
        )
    }

    /// Run `build` on every worker with exclusive access to its own shards.
    pub fn build_in_parallel<F>(&mut self, build: F)
    where
        F: Fn(ThreadId, &KernelContext, &mut SourceShard, &mut DeviceShard) + Send + Sync,
    {
        let ctx = &self.ctx;
        let mut shards: Vec<_> = self
            .sources
            .shards_mut()
            .iter_mut()
            .zip(self.devices.shards_mut().iter_mut())
            .collect();
        self.pool
            .for_each_worker(&mut shards, |tid, (sources, devices)| {
                build(tid, ctx, sources, devices)
            });
    }

    /// Point every worker's cursor at the top of the source table.
    pub fn reset_entry_points(&mut self) {
        for tid in 0..self.sources.num_threads() {
            self.sources.reset_entry_point(tid);
        }
    }

    /// One source reader per worker.
    pub fn readers(&mut self) -> Vec<SourceReader<'_>> {
        self.sources.readers()
    }

    /// Collective synchronization step.
    ///
    /// Prunes disabled tails (if configured), publishes the secondary buffer
    /// layout, then checkpoints every cursor and compacts the source table
    /// against the global frontier. Every rank must call this, and every
    /// worker should have walked the table first: a cursor that was never
    /// reset counts as having consumed everything.
    pub fn synchronize(&mut self) -> SyncReport {
        let pruned_slots = if self.config.remove_disabled_on_sync {
            self.sources.remove_all_disabled_suffixes(&self.pool)
        } else {
            0
        };

        self.secondary_layout = self
            .sources
            .compute_secondary_buffer_layout(&self.ctx, &self.pool);

        for tid in 0..self.sources.num_threads() {
            self.sources.save_entry_point(tid);
        }
        let frontier = self.sources.find_global_frontier();
        let erased = self
            .sources
            .compact_all(&self.pool, self.config.min_deleted_elements);

        let report = SyncReport {
            pruned_slots,
            secondary_sources: self.secondary_layout.len(),
            chunk_size: self.secondary_layout.chunk_size(),
            frontier,
            erased,
        };
        info!(
            rank = self.ctx.transport.rank(),
            pruned_slots,
            secondary_sources = report.secondary_sources,
            chunk_size = report.chunk_size,
            ?frontier,
            erased,
            "Synchronized routing tables"
        );
        report
    }

    /// Release both tables.
    pub fn finalize(&mut self) {
        self.sources.finalize();
        self.devices.finalize();
        self.secondary_layout = SecondaryBufferLayout::default();
    }
}
