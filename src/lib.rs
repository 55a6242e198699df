//! Client-side orchestration for a permissioned ledger network.
//!
//! Assembles a channel from configured peers and orderers, fans transaction
//! proposals out to the endorsing peers, refuses to order anything that was
//! not endorsed by all of them, and waits for the commit confirmation.

pub mod channel;
pub mod client;
pub mod commit;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod network;
pub mod observability;
pub mod proposal;
pub mod registry;

pub use client::{ChannelClient, CreateTransPayload};
pub use config::GatewayConfig;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
