//! Network handles: peers, orderers and commit event sources.
//!
//! The orchestration core only talks to the traits in [`traits`]. Two
//! transports implement them: [`remote::RemoteTransport`] for node gateways
//! reached over HTTP, and [`memory::MemoryNetwork`] for tests and local runs.

pub mod memory;
pub mod remote;
pub mod traits;
pub mod types;

pub use memory::{CommitBehaviour, MemoryNetwork, OrdererBehaviour, PeerBehaviour};
pub use remote::RemoteTransport;
pub use traits::{EndorsingPeer, EventHub, OrderingService, Transport};
pub use types::{
    BroadcastStatus, ChannelConfig, CommitEvent, EndpointProperties, TransactionEnvelope,
    TransportError,
};
