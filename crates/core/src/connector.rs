//! Connector objects and the models that create them.

use axon_types::{Event, NodeId, Port, RoutingError, SynIndex, SynapseStatus, ThreadId};
use std::any::Any;
use std::sync::Arc;

/// The view of a node that connection creation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    /// Global id.
    pub gid: NodeId,
    /// Thread-local device index, for devices only.
    pub local_device_id: Option<usize>,
}

impl NodeRef {
    /// A regular network node.
    pub fn node(gid: NodeId) -> Self {
        Self {
            gid,
            local_device_id: None,
        }
    }

    /// A device with the given thread-local device index.
    pub fn device(gid: NodeId, local_device_id: usize) -> Self {
        Self {
            gid,
            local_device_id: Some(local_device_id),
        }
    }
}

/// Holds all connections of one synapse type that share a slot.
pub trait Connector: Send {
    /// Synapse type of the connections held.
    fn syn_id(&self) -> SynIndex;

    /// Number of connections held.
    fn len(&self) -> usize;

    /// Whether the connector holds no connections.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concrete connector, for the model that created it.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Deliver `event` through every connection held.
    fn send_to_all(&mut self, tid: ThreadId, event: &mut Event, models: &[Arc<dyn ConnectorModel>]);

    /// Status of the connection at `port`.
    ///
    /// Callers guarantee `port` is in range.
    fn get_synapse_status(&self, syn_id: SynIndex, port: Port) -> SynapseStatus;

    /// Update the connection at `port` with the fields present in `status`.
    fn set_synapse_status(
        &mut self,
        syn_id: SynIndex,
        model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError>;
}

/// Prototype of a synapse type.
pub trait ConnectorModel: Send + Sync {
    /// Model name, for diagnostics.
    fn name(&self) -> &str;

    /// Whether events of this type are plain spikes.
    fn is_primary(&self) -> bool;

    /// Payload size in buffer words for secondary types; zero for primary ones.
    fn secondary_event_size(&self) -> usize;

    /// Create a connection from `source` to `target` inside `slot`.
    ///
    /// Creates the connector if the slot is empty.
    #[allow(clippy::too_many_arguments)]
    fn add_connection(
        &self,
        source: &NodeRef,
        target: &NodeRef,
        slot: &mut Option<Box<dyn Connector>>,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError>;
}
