//! Device connector tables of all worker threads.

use crate::DeviceShard;
use axon_core::{ConnectorModel, KernelContext, NodeIdentity, NodeRef};
use axon_types::{Event, NodeId, Port, RoutingError, SynIndex, SynapseStatus, ThreadId};
use std::sync::Arc;
use tracing::info;

/// Connections to and from devices, one [`DeviceShard`] per worker.
#[derive(Debug, Default)]
pub struct TargetTableDevices {
    shards: Vec<DeviceShard>,
}

impl TargetTableDevices {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate one empty shard per worker.
    pub fn initialize(&mut self, num_threads: usize) {
        self.shards = (0..num_threads).map(DeviceShard::new).collect();
        info!(num_threads, "Initialized device tables");
    }

    /// Drop every connector.
    pub fn finalize(&mut self) {
        self.shards.clear();
    }

    /// Number of shards.
    pub fn num_threads(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, tid: ThreadId) -> &DeviceShard {
        assert!(
            tid < self.shards.len(),
            "thread {tid} out of range ({} shards)",
            self.shards.len()
        );
        &self.shards[tid]
    }

    fn shard_mut(&mut self, tid: ThreadId) -> &mut DeviceShard {
        assert!(
            tid < self.shards.len(),
            "thread {tid} out of range ({} shards)",
            self.shards.len()
        );
        &mut self.shards[tid]
    }

    /// Read-only view of one worker's shard.
    pub fn thread_local_devices(&self, tid: ThreadId) -> &DeviceShard {
        self.shard(tid)
    }

    /// All shards, for handing each worker its own during construction.
    pub fn shards_mut(&mut self) -> &mut [DeviceShard] {
        &mut self.shards
    }

    /// Size a worker's tables to the current node and device counts.
    pub fn resize_to_number_of_neurons(&mut self, tid: ThreadId, identity: &dyn NodeIdentity) {
        self.shard_mut(tid).resize_to_number_of_neurons(identity);
    }

    /// Connect network node `source_gid` to the device `target` on worker `tid`.
    ///
    /// # Panics
    ///
    /// Panics if the node's local id is out of range or `syn_id` is not
    /// registered.
    #[allow(clippy::too_many_arguments)]
    pub fn add_connection_to_device(
        &mut self,
        ctx: &KernelContext,
        source: &NodeRef,
        target: &NodeRef,
        source_gid: NodeId,
        tid: ThreadId,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        self.shard_mut(tid).add_connection_to_device(
            ctx, source, target, source_gid, syn_id, params, delay, weight,
        )
    }

    /// Connect the device `source` to `target` on worker `tid`.
    ///
    /// # Panics
    ///
    /// Panics if `source` has no local device id, the id is out of range, or
    /// `syn_id` is not registered.
    #[allow(clippy::too_many_arguments)]
    pub fn add_connection_from_device(
        &mut self,
        ctx: &KernelContext,
        source: &NodeRef,
        target: &NodeRef,
        tid: ThreadId,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        self.shard_mut(tid)
            .add_connection_from_device(ctx, source, target, syn_id, params, delay, weight)
    }

    /// Deliver `event` from `source_gid` to every device it feeds on `tid`.
    pub fn send_to_device(
        &mut self,
        tid: ThreadId,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        event: &mut Event,
        models: &[Arc<dyn ConnectorModel>],
    ) {
        self.shard_mut(tid)
            .send_to_device(source_gid, identity, event, models);
    }

    /// Deliver `event` from local device `ldid` to every node it feeds on `tid`.
    pub fn send_from_device(
        &mut self,
        tid: ThreadId,
        ldid: usize,
        event: &mut Event,
        models: &[Arc<dyn ConnectorModel>],
    ) {
        self.shard_mut(tid).send_from_device(ldid, event, models);
    }

    /// Status of a connection to a device.
    ///
    /// # Panics
    ///
    /// Panics if no connector of type `syn_id` exists for the node.
    pub fn get_synapse_status_to_device(
        &self,
        tid: ThreadId,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        syn_id: SynIndex,
        port: Port,
    ) -> SynapseStatus {
        self.shard(tid)
            .get_synapse_status_to_device(source_gid, identity, syn_id, port)
    }

    /// Status of a connection from a device.
    ///
    /// # Panics
    ///
    /// Panics if no connector of type `syn_id` exists for the device.
    pub fn get_synapse_status_from_device(
        &self,
        tid: ThreadId,
        ldid: usize,
        syn_id: SynIndex,
        port: Port,
    ) -> SynapseStatus {
        self.shard(tid)
            .get_synapse_status_from_device(ldid, syn_id, port)
    }

    /// Update a connection to a device.
    #[allow(clippy::too_many_arguments)]
    pub fn set_synapse_status_to_device(
        &mut self,
        tid: ThreadId,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        syn_id: SynIndex,
        model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError> {
        self.shard_mut(tid)
            .set_synapse_status_to_device(source_gid, identity, syn_id, model, status, port)
    }

    /// Update a connection from a device.
    pub fn set_synapse_status_from_device(
        &mut self,
        tid: ThreadId,
        ldid: usize,
        syn_id: SynIndex,
        model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError> {
        self.shard_mut(tid)
            .set_synapse_status_from_device(ldid, syn_id, model, status, port)
    }

    /// Global id of local device `ldid` on `tid`, once it has a connection.
    pub fn sending_device_gid(&self, tid: ThreadId, ldid: usize) -> Option<NodeId> {
        self.shard(tid).sending_device_gid(ldid)
    }

    /// Number of connections from local node `lid` to devices.
    pub fn num_connections_to_device(&self, tid: ThreadId, lid: usize) -> usize {
        self.shard(tid).num_connections_to_device(lid)
    }

    /// Number of connections from local device `ldid`.
    pub fn num_connections_from_device(&self, tid: ThreadId, ldid: usize) -> usize {
        self.shard(tid).num_connections_from_device(ldid)
    }
}
