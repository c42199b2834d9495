//! Per-thread source table for primary and secondary event routing.
//!
//! Each worker owns a [`SourceShard`] holding the origin of every connection
//! it delivers, indexed by synapse type and local connection id. During
//! delivery every worker walks all shards downward with its own
//! [`ReadCursor`]; checkpoints of those cursors bound what
//! [`SourceTable::compact_all`] may release afterwards.
//!
//! The table also derives the [`SecondaryBufferLayout`], which places every
//! distinct secondary (origin, synapse type) pair in the receive buffer.

mod cursor;
mod layout;
mod shard;
mod table;

pub use cursor::{ReadCursor, SourceReader};
pub use layout::SecondaryBufferLayout;
pub use shard::SourceShard;
pub use table::SourceTable;
