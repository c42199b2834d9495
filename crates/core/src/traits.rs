//! Traits implemented by the collaborators of the routing tables.
//!
//! The routing core never reaches for global state. Everything it needs to
//! know about synapse models, node placement and the other ranks comes in
//! through these traits, bundled in a [`KernelContext`](crate::KernelContext).

use crate::ConnectorModel;
use axon_types::{NodeId, Rank, SynIndex};
use std::sync::Arc;

/// Registry of synapse types.
///
/// The index of a model in [`models`](Self::models) is its `SynIndex`.
pub trait SynapseRegistry: Send + Sync {
    /// All registered connector models, in registration order.
    fn models(&self) -> &[Arc<dyn ConnectorModel>];

    // Derived methods

    /// Number of registered synapse types.
    fn num_synapse_types(&self) -> usize {
        self.models().len()
    }

    /// Get the connector model for a synapse type.
    ///
    /// # Panics
    ///
    /// Panics if `syn_id` is not registered.
    fn connector_model(&self, syn_id: SynIndex) -> &dyn ConnectorModel {
        let models = self.models();
        assert!(
            usize::from(syn_id) < models.len(),
            "synapse type {syn_id} is not registered ({} known)",
            models.len()
        );
        models[usize::from(syn_id)].as_ref()
    }

    /// Whether a synapse type carries plain spikes.
    fn is_primary(&self, syn_id: SynIndex) -> bool {
        self.connector_model(syn_id).is_primary()
    }

    /// Payload size, in buffer words, of a secondary synapse type's event.
    fn secondary_event_size(&self, syn_id: SynIndex) -> usize {
        self.connector_model(syn_id).secondary_event_size()
    }
}

/// Maps global node ids to their owning rank and thread-local index.
pub trait NodeIdentity: Send + Sync {
    /// Rank hosting `gid`.
    fn process_of(&self, gid: NodeId) -> Rank;

    /// Thread-local index of a node hosted on this rank.
    fn gid_to_lid(&self, gid: NodeId) -> usize;

    /// Largest number of local nodes on any thread of this rank.
    fn max_num_local_nodes(&self) -> usize;

    /// Number of devices on each thread of this rank.
    fn num_local_devices(&self) -> usize;
}

/// Collective communication with the other ranks.
pub trait Transport: Send + Sync {
    /// Number of participating ranks.
    fn num_processes(&self) -> usize;

    /// This rank's index.
    fn rank(&self) -> Rank;

    /// Reduce `value` to its maximum across all ranks.
    ///
    /// Blocks until every rank has entered the call. A rank that never calls
    /// it stalls the whole run.
    fn all_reduce_max(&self, value: u64) -> u64;
}

/// Transport for a run with a single rank.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn num_processes(&self) -> usize {
        1
    }

    fn rank(&self) -> Rank {
        0
    }

    fn all_reduce_max(&self, value: u64) -> u64 {
        value
    }
}
