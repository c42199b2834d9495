//! Front door of the connection-routing core.
//!
//! [`ConnectionRouter`] owns the [`SourceTable`](axon_sources::SourceTable),
//! the [`TargetTableDevices`](axon_devices::TargetTableDevices) and the
//! worker pool driving both. Construction appends to the tables per worker;
//! [`ConnectionRouter::synchronize`] is the collective step every rank runs
//! once construction and delivery-table building are done.

mod router;

pub use router::{ConnectionRouter, SyncReport};
