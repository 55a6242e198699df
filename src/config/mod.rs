//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (required keys, endpoint lists, mspid uniqueness)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to the registry, builder and client facade
//! ```
//!
//! # Design Decisions
//! - Config is constructed once at process start and never mutated
//! - No global instance; every component receives it explicitly
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClientBinding, CredentialsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    OrgConfig, SdkConfig,
};
