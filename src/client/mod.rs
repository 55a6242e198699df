//! Caller-facing client facade.

pub mod facade;
pub mod payload;

pub use facade::{ChannelClient, PUT_FUNCTION};
pub use payload::{CreateTransPayload, TransactionReceipt};
