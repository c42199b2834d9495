//! Round-robin node placement.

use axon_core::NodeIdentity;
use axon_types::{NodeId, Rank};

/// Places node `gid` on rank `gid % num_processes`.
///
/// Local ids follow the virtual-process layout: `gid / (ranks * threads)`.
#[derive(Debug, Clone)]
pub struct RoundRobinIdentity {
    num_processes: usize,
    num_threads: usize,
    max_num_local_nodes: usize,
    num_local_devices: usize,
}

impl RoundRobinIdentity {
    /// Create a placement over `num_processes` ranks with `num_threads` each.
    pub fn new(num_processes: usize, num_threads: usize) -> Self {
        Self {
            num_processes,
            num_threads,
            max_num_local_nodes: 16,
            num_local_devices: 4,
        }
    }

    /// Set the per-thread node capacity.
    pub fn with_max_num_local_nodes(mut self, n: usize) -> Self {
        self.max_num_local_nodes = n;
        self
    }

    /// Set the per-thread device count.
    pub fn with_num_local_devices(mut self, n: usize) -> Self {
        self.num_local_devices = n;
        self
    }
}

impl NodeIdentity for RoundRobinIdentity {
    fn process_of(&self, gid: NodeId) -> Rank {
        (gid.0 % self.num_processes as u64) as Rank
    }

    fn gid_to_lid(&self, gid: NodeId) -> usize {
        (gid.0 / (self.num_processes * self.num_threads) as u64) as usize
    }

    fn max_num_local_nodes(&self) -> usize {
        self.max_num_local_nodes
    }

    fn num_local_devices(&self) -> usize {
        self.num_local_devices
    }
}
