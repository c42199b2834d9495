//! One worker thread's device connector tables.

use axon_core::{Connector, ConnectorModel, KernelContext, NodeIdentity, NodeRef};
use axon_types::{Event, NodeId, Port, RoutingError, SynIndex, SynapseStatus, ThreadId};
use std::sync::Arc;
use tracing::{debug, trace};

/// One connector slot per synapse type.
type ConnectorSlots = Vec<Option<Box<dyn Connector>>>;

/// Device connectors owned by one worker thread.
#[derive(Default)]
pub struct DeviceShard {
    tid: ThreadId,
    /// Indexed by local node id, then synapse type.
    to_devices: Vec<ConnectorSlots>,
    /// Indexed by local device id, then synapse type.
    from_devices: Vec<ConnectorSlots>,
    /// Global id of each sending device, by local device id.
    sending_devices_gids: Vec<Option<NodeId>>,
}

impl DeviceShard {
    /// Create an empty shard for worker `tid`.
    pub fn new(tid: ThreadId) -> Self {
        Self {
            tid,
            ..Self::default()
        }
    }

    /// Worker owning this shard.
    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    /// Size both tables to the current node and device counts.
    ///
    /// Never shrinks; existing connectors are kept.
    pub fn resize_to_number_of_neurons(&mut self, identity: &dyn NodeIdentity) {
        let num_nodes = identity.max_num_local_nodes();
        let num_devices = identity.num_local_devices();

        if self.to_devices.len() < num_nodes {
            self.to_devices.resize_with(num_nodes, Vec::new);
        }
        if self.from_devices.len() < num_devices {
            self.from_devices.resize_with(num_devices, Vec::new);
            self.sending_devices_gids.resize(num_devices, None);
        }

        debug!(
            tid = self.tid,
            num_nodes = self.to_devices.len(),
            num_devices = self.from_devices.len(),
            "Resized device tables"
        );
    }

    /// Number of local node entries in the to-device table.
    pub fn num_local_nodes(&self) -> usize {
        self.to_devices.len()
    }

    /// Number of local device entries in the from-device table.
    pub fn num_local_devices(&self) -> usize {
        self.from_devices.len()
    }

    /// Connect network node `source_gid` to a device.
    #[allow(clippy::too_many_arguments)]
    pub fn add_connection_to_device(
        &mut self,
        ctx: &KernelContext,
        source: &NodeRef,
        target: &NodeRef,
        source_gid: NodeId,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        let lid = ctx.identity.gid_to_lid(source_gid);
        assert!(
            lid < self.to_devices.len(),
            "local id {lid} of {source_gid} out of range ({} local nodes on thread {})",
            self.to_devices.len(),
            self.tid
        );

        let slots = &mut self.to_devices[lid];
        add_connection(ctx, slots, source, target, syn_id, params, delay, weight)?;

        trace!(
            tid = self.tid,
            lid,
            syn_id,
            %source_gid,
            device = %target.gid,
            "Added connection to device"
        );
        Ok(())
    }

    /// Connect a device to a network node, remembering the device's id.
    ///
    /// # Panics
    ///
    /// Panics if `source` is not a device or its local device id is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn add_connection_from_device(
        &mut self,
        ctx: &KernelContext,
        source: &NodeRef,
        target: &NodeRef,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        let Some(ldid) = source.local_device_id else {
            panic!("{} is not a device", source.gid);
        };
        assert!(
            ldid < self.from_devices.len(),
            "local device id {ldid} out of range ({} devices on thread {})",
            self.from_devices.len(),
            self.tid
        );

        let slots = &mut self.from_devices[ldid];
        add_connection(ctx, slots, source, target, syn_id, params, delay, weight)?;
        self.sending_devices_gids[ldid] = Some(source.gid);

        trace!(
            tid = self.tid,
            ldid,
            syn_id,
            device = %source.gid,
            node = %target.gid,
            "Added connection from device"
        );
        Ok(())
    }

    /// Pass `event` from network node `source_gid` to every device connector.
    pub fn send_to_device(
        &mut self,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        event: &mut Event,
        models: &[Arc<dyn ConnectorModel>],
    ) {
        let lid = identity.gid_to_lid(source_gid);
        send_to_all(self.tid, &mut self.to_devices[lid], event, models);
    }

    /// Pass `event` from local device `ldid` to every connector it feeds.
    pub fn send_from_device(
        &mut self,
        ldid: usize,
        event: &mut Event,
        models: &[Arc<dyn ConnectorModel>],
    ) {
        send_to_all(self.tid, &mut self.from_devices[ldid], event, models);
    }

    /// Status of one connection to a device.
    pub fn get_synapse_status_to_device(
        &self,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        syn_id: SynIndex,
        port: Port,
    ) -> SynapseStatus {
        let lid = identity.gid_to_lid(source_gid);
        connector(&self.to_devices[lid], syn_id).get_synapse_status(syn_id, port)
    }

    /// Status of one connection from a device.
    pub fn get_synapse_status_from_device(&self, ldid: usize, syn_id: SynIndex, port: Port) -> SynapseStatus {
        connector(&self.from_devices[ldid], syn_id).get_synapse_status(syn_id, port)
    }

    /// Update one connection to a device.
    pub fn set_synapse_status_to_device(
        &mut self,
        source_gid: NodeId,
        identity: &dyn NodeIdentity,
        syn_id: SynIndex,
        model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError> {
        let lid = identity.gid_to_lid(source_gid);
        connector_mut(&mut self.to_devices[lid], syn_id).set_synapse_status(syn_id, model, status, port)
    }

    /// Update one connection from a device.
    pub fn set_synapse_status_from_device(
        &mut self,
        ldid: usize,
        syn_id: SynIndex,
        model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError> {
        connector_mut(&mut self.from_devices[ldid], syn_id).set_synapse_status(syn_id, model, status, port)
    }

    /// Global id of the device with local device id `ldid`, once connected.
    pub fn sending_device_gid(&self, ldid: usize) -> Option<NodeId> {
        self.sending_devices_gids.get(ldid).copied().flatten()
    }

    /// Connections from local node `lid` to devices, over all synapse types.
    pub fn num_connections_to_device(&self, lid: usize) -> usize {
        self.to_devices.get(lid).map_or(0, |slots| count(slots))
    }

    /// Connections from local device `ldid`, over all synapse types.
    pub fn num_connections_from_device(&self, ldid: usize) -> usize {
        self.from_devices.get(ldid).map_or(0, |slots| count(slots))
    }
}

impl std::fmt::Debug for DeviceShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceShard")
            .field("tid", &self.tid)
            .field("num_local_nodes", &self.to_devices.len())
            .field("num_local_devices", &self.from_devices.len())
            .finish()
    }
}

#[allow(clippy::too_many_arguments)]
fn add_connection(
    ctx: &KernelContext,
    slots: &mut ConnectorSlots,
    source: &NodeRef,
    target: &NodeRef,
    syn_id: SynIndex,
    params: Option<&SynapseStatus>,
    delay: f64,
    weight: f64,
) -> Result<(), RoutingError> {
    let model = ctx.registry.connector_model(syn_id);

    // Room for every registered synapse type.
    let num_synapse_types = ctx.registry.num_synapse_types();
    if slots.len() < num_synapse_types {
        slots.resize_with(num_synapse_types, || None);
    }

    model.add_connection(
        source,
        target,
        &mut slots[usize::from(syn_id)],
        syn_id,
        params,
        delay,
        weight,
    )
}

fn send_to_all(
    tid: ThreadId,
    slots: &mut ConnectorSlots,
    event: &mut Event,
    models: &[Arc<dyn ConnectorModel>],
) {
    for connector in slots.iter_mut().flatten() {
        connector.send_to_all(tid, event, models);
    }
}

fn connector(slots: &ConnectorSlots, syn_id: SynIndex) -> &dyn Connector {
    match slots.get(usize::from(syn_id)) {
        Some(Some(connector)) => connector.as_ref(),
        _ => panic!("no connector for synapse type {syn_id}"),
    }
}

fn connector_mut(slots: &mut ConnectorSlots, syn_id: SynIndex) -> &mut dyn Connector {
    match slots.get_mut(usize::from(syn_id)) {
        Some(Some(connector)) => connector.as_mut(),
        _ => panic!("no connector for synapse type {syn_id}"),
    }
}

fn count(slots: &ConnectorSlots) -> usize {
    slots.iter().flatten().map(|c| c.len()).sum()
}
