//! Connector models that record what they deliver.

use axon_core::{Connector, ConnectorModel, NodeRef, SynapseRegistry};
use axon_types::{Event, NodeId, Port, RoutingError, SynIndex, SynapseStatus, ThreadId};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// One event passed through one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Worker that delivered the event.
    pub tid: ThreadId,
    /// Synapse type of the connection.
    pub syn_id: SynIndex,
    /// Sender of the event.
    pub sender: NodeId,
    /// Target of the connection.
    pub target: NodeId,
    /// Weight applied by the connection.
    pub weight: f64,
}

/// Shared log of deliveries, cloned into every connector.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLog(Arc<Mutex<Vec<Delivery>>>);

impl DeliveryLog {
    /// Snapshot of all deliveries so far.
    pub fn entries(&self) -> Vec<Delivery> {
        self.0.lock().clone()
    }

    /// Number of deliveries so far.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn push(&self, delivery: Delivery) {
        self.0.lock().push(delivery);
    }
}

#[derive(Debug, Clone)]
struct RecordedConnection {
    target: NodeId,
    weight: f64,
    delay: f64,
    params: std::collections::BTreeMap<String, f64>,
}

/// Connector holding plain static connections.
#[derive(Debug)]
pub struct RecordingConnector {
    syn_id: SynIndex,
    connections: Vec<RecordedConnection>,
    log: DeliveryLog,
}

impl RecordingConnector {
    fn new(syn_id: SynIndex, log: DeliveryLog) -> Self {
        Self {
            syn_id,
            connections: Vec::new(),
            log,
        }
    }

    /// Targets of all connections, in creation order.
    pub fn targets(&self) -> Vec<NodeId> {
        self.connections.iter().map(|c| c.target).collect()
    }
}

fn check_delay(delay: f64) -> Result<(), RoutingError> {
    if delay.is_nan() || delay < 0.0 {
        return Err(RoutingError::Connection(format!(
            "delay must be non-negative, got {delay}"
        )));
    }
    Ok(())
}

impl Connector for RecordingConnector {
    fn syn_id(&self) -> SynIndex {
        self.syn_id
    }

    fn len(&self) -> usize {
        self.connections.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn send_to_all(&mut self, tid: ThreadId, event: &mut Event, _models: &[Arc<dyn ConnectorModel>]) {
        for (port, connection) in self.connections.iter().enumerate() {
            event.weight = connection.weight;
            event.delay = connection.delay;
            event.port = port;
            self.log.push(Delivery {
                tid,
                syn_id: self.syn_id,
                sender: event.sender,
                target: connection.target,
                weight: connection.weight,
            });
        }
    }

    fn get_synapse_status(&self, syn_id: SynIndex, port: Port) -> SynapseStatus {
        debug_assert_eq!(syn_id, self.syn_id);
        let connection = &self.connections[port];
        SynapseStatus {
            weight: Some(connection.weight),
            delay: Some(connection.delay),
            params: connection.params.clone(),
        }
    }

    fn set_synapse_status(
        &mut self,
        syn_id: SynIndex,
        _model: &dyn ConnectorModel,
        status: &SynapseStatus,
        port: Port,
    ) -> Result<(), RoutingError> {
        debug_assert_eq!(syn_id, self.syn_id);
        if let Some(delay) = status.delay {
            check_delay(delay)?;
        }
        let connection = &mut self.connections[port];
        if let Some(weight) = status.weight {
            connection.weight = weight;
        }
        if let Some(delay) = status.delay {
            connection.delay = delay;
        }
        connection
            .params
            .extend(status.params.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }
}

/// Model creating [`RecordingConnector`]s.
#[derive(Debug)]
pub struct RecordingModel {
    name: String,
    secondary_event_size: Option<usize>,
    log: DeliveryLog,
}

impl ConnectorModel for RecordingModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_primary(&self) -> bool {
        self.secondary_event_size.is_none()
    }

    fn secondary_event_size(&self) -> usize {
        self.secondary_event_size.unwrap_or(0)
    }

    fn add_connection(
        &self,
        _source: &NodeRef,
        target: &NodeRef,
        slot: &mut Option<Box<dyn Connector>>,
        syn_id: SynIndex,
        params: Option<&SynapseStatus>,
        delay: f64,
        weight: f64,
    ) -> Result<(), RoutingError> {
        let delay = params.and_then(|p| p.delay).unwrap_or(delay);
        let weight = params.and_then(|p| p.weight).unwrap_or(weight);
        check_delay(delay)?;

        let connector = slot.get_or_insert_with(|| {
            Box::new(RecordingConnector::new(syn_id, self.log.clone())) as Box<dyn Connector>
        });
        let Some(connector) = connector.as_any_mut().downcast_mut::<RecordingConnector>() else {
            return Err(RoutingError::Connection(format!(
                "slot for synapse type {syn_id} holds a connector of another model"
            )));
        };
        connector.connections.push(RecordedConnection {
            target: target.gid,
            weight,
            delay,
            params: params.map(|p| p.params.clone()).unwrap_or_default(),
        });
        Ok(())
    }
}

/// Registry of [`RecordingModel`]s sharing one [`DeliveryLog`].
#[derive(Default)]
pub struct StaticRegistry {
    models: Vec<Arc<dyn ConnectorModel>>,
    log: DeliveryLog,
}

impl StaticRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a primary (spike) synapse type.
    pub fn with_primary(mut self, name: &str) -> Self {
        self.register(name, None);
        self
    }

    /// Register a secondary synapse type with a payload of `event_size` words.
    pub fn with_secondary(mut self, name: &str, event_size: usize) -> Self {
        self.register(name, Some(event_size));
        self
    }

    /// Register a synapse type on an existing registry.
    pub fn register(&mut self, name: &str, secondary_event_size: Option<usize>) -> SynIndex {
        let syn_id = self.models.len() as SynIndex;
        self.models.push(Arc::new(RecordingModel {
            name: name.to_string(),
            secondary_event_size,
            log: self.log.clone(),
        }));
        syn_id
    }

    /// Log shared by every connector created through this registry.
    pub fn log(&self) -> DeliveryLog {
        self.log.clone()
    }
}

impl SynapseRegistry for StaticRegistry {
    fn models(&self) -> &[Arc<dyn ConnectorModel>] {
        &self.models
    }
}
