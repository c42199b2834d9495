//! In-process stand-in for a multi-rank transport.

use axon_core::Transport;
use axon_types::Rank;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    values: Mutex<Vec<u64>>,
}

/// A group of ranks living in one process.
///
/// Each rank gets a [`ClusterTransport`] handle and must run on its own OS
/// thread, since `all_reduce_max` blocks until every rank has called it.
#[derive(Debug)]
pub struct InProcessCluster {
    shared: Arc<Shared>,
    num_processes: usize,
}

impl InProcessCluster {
    /// Create a cluster of `num_processes` ranks.
    pub fn new(num_processes: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                barrier: Barrier::new(num_processes),
                values: Mutex::new(vec![0; num_processes]),
            }),
            num_processes,
        }
    }

    /// Transport handles, indexed by rank.
    pub fn transports(&self) -> Vec<ClusterTransport> {
        (0..self.num_processes)
            .map(|rank| ClusterTransport {
                shared: Arc::clone(&self.shared),
                rank,
                num_processes: self.num_processes,
            })
            .collect()
    }
}

/// One rank's view of an [`InProcessCluster`].
#[derive(Debug, Clone)]
pub struct ClusterTransport {
    shared: Arc<Shared>,
    rank: Rank,
    num_processes: usize,
}

impl Transport for ClusterTransport {
    fn num_processes(&self) -> usize {
        self.num_processes
    }

    fn rank(&self) -> Rank {
        self.rank
    }

    fn all_reduce_max(&self, value: u64) -> u64 {
        self.shared.values.lock()[self.rank] = value;
        self.shared.barrier.wait();
        let max = self.shared.values.lock().iter().copied().max().unwrap_or(0);
        // Nobody may overwrite a slot before every rank has read it.
        self.shared.barrier.wait();
        max
    }
}
