//! Explicit kernel context passed to every routing operation.

use crate::{LocalTransport, NodeIdentity, SynapseRegistry, Transport};
use std::sync::Arc;

/// Bundles the collaborators the routing tables consult.
#[derive(Clone)]
pub struct KernelContext {
    /// Registered synapse types.
    pub registry: Arc<dyn SynapseRegistry>,
    /// Node placement.
    pub identity: Arc<dyn NodeIdentity>,
    /// Collective communication with other ranks.
    pub transport: Arc<dyn Transport>,
}

impl KernelContext {
    /// Create a context from its collaborators.
    pub fn new(
        registry: Arc<dyn SynapseRegistry>,
        identity: Arc<dyn NodeIdentity>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            identity,
            transport,
        }
    }

    /// Create a context for a run with a single rank.
    pub fn single_rank(registry: Arc<dyn SynapseRegistry>, identity: Arc<dyn NodeIdentity>) -> Self {
        Self::new(registry, identity, Arc::new(LocalTransport))
    }
}

impl std::fmt::Debug for KernelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelContext")
            .field("num_synapse_types", &self.registry.num_synapse_types())
            .field("rank", &self.transport.rank())
            .field("num_processes", &self.transport.num_processes())
            .finish()
    }
}
