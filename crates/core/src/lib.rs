//! Shared infrastructure for the routing tables.
//!
//! - [`SynapseRegistry`], [`NodeIdentity`], [`Transport`]: collaborators
//!   consulted by the tables, bundled in a [`KernelContext`]
//! - [`Connector`], [`ConnectorModel`]: polymorphic connection storage
//! - [`WorkerPool`]: fork-join regions over per-thread state
//! - [`RoutingConfig`]: tunables

mod config;
mod connector;
mod context;
mod pool;
mod traits;

pub use config::RoutingConfig;
pub use connector::{Connector, ConnectorModel, NodeRef};
pub use context::KernelContext;
pub use pool::WorkerPool;
pub use traits::{LocalTransport, NodeIdentity, SynapseRegistry, Transport};
