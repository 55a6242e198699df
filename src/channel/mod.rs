//! Channel topology: which orderers and peers a channel is served by.

pub mod builder;
pub mod topology;

pub use builder::{ChannelBuilder, NodeKind};
pub use topology::ChannelTopology;
