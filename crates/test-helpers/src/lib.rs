//! Test helpers for the routing tables.
//!
//! Deterministic in-memory stand-ins for every collaborator of the routing
//! core, so tables can be exercised without a simulation kernel:
//!
//! - [`StaticRegistry`] with [`RecordingModel`]s that log every delivery
//! - [`RoundRobinIdentity`] distributing node ids over ranks and threads
//! - [`InProcessCluster`] running several ranks on OS threads

mod identity;
mod model;
mod transport;

pub use identity::RoundRobinIdentity;
pub use model::{Delivery, DeliveryLog, RecordingConnector, RecordingModel, StaticRegistry};
pub use transport::{ClusterTransport, InProcessCluster};

use axon_core::KernelContext;
use std::sync::Arc;

/// Single-rank context with the given registry and `num_threads` workers.
pub fn single_rank_context(registry: StaticRegistry, num_threads: usize) -> KernelContext {
    KernelContext::single_rank(
        Arc::new(registry),
        Arc::new(RoundRobinIdentity::new(1, num_threads)),
    )
}
