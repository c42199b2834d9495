//! Events and synapse status records exchanged with connectors.

use crate::{NodeId, Port};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An event handed to connectors at delivery time.
///
/// The delivery loop owns scheduling; connectors fill in the per-connection
/// fields (`weight`, `delay`, `port`) before passing the event on.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Node that emitted the event.
    pub sender: NodeId,
    /// Simulation step at which the event was emitted.
    pub stamp: u64,
    /// Number of coincident spikes carried.
    pub multiplicity: u32,
    /// Weight of the connection currently delivering the event.
    pub weight: f64,
    /// Delay of the connection currently delivering the event (ms).
    pub delay: f64,
    /// Receptor port on the target.
    pub port: Port,
}

impl Event {
    /// Create a single spike from `sender` at `stamp`.
    pub fn spike(sender: NodeId, stamp: u64) -> Self {
        Self {
            sender,
            stamp,
            multiplicity: 1,
            weight: 0.0,
            delay: 0.0,
            port: 0,
        }
    }
}

/// Status dictionary of a single connection.
///
/// `get` fills every field it knows; `set` only applies the fields present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynapseStatus {
    /// Connection weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Connection delay (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    /// Model-specific parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, f64>,
}

impl SynapseStatus {
    /// Status carrying only a weight.
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            ..Default::default()
        }
    }

    /// Add a model-specific parameter.
    pub fn param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}
