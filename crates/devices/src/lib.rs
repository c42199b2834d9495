//! Connector tables for connections that touch devices.
//!
//! Devices (stimulators, recorders) are not part of the network-wide id
//! mapping, so their connections bypass the source table. Each worker keeps
//! a [`DeviceShard`] with two connector tables:
//!
//! - to devices, indexed by the local id of the sending network node
//! - from devices, indexed by the sending device's local device id,
//!   alongside the device's global id
//!
//! Both are looked up once per event at delivery time.

mod shard;
mod table;

pub use shard::DeviceShard;
pub use table::TargetTableDevices;
