//! Core types for connection routing.
//!
//! Everything the routing tables store or hand across crate boundaries:
//! node and synapse identifiers, the packed [`Source`] record, table
//! positions, delivery events and synapse status records.

mod error;
mod event;
mod identifiers;
mod position;
mod source;

pub use error::RoutingError;
pub use event::{Event, SynapseStatus};
pub use identifiers::{
    pack_source_gid_and_syn_id, unpack_source_gid_and_syn_id, NodeId, Port, Rank, SynIndex,
    ThreadId, INVALID_SYNINDEX,
};
pub use position::SourcePosition;
pub use source::Source;
