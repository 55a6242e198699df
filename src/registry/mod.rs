//! Organization registry subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.orgs
//!     → store.rs (register, endpoints, TLS rewrite)
//!     → identity provider attaches peer admins
//!     → Arc<OrganizationRegistry> shared read-only
//!     → organization.rs records resolved by the client facade
//! ```

pub mod organization;
pub mod store;

pub use organization::{Endpoint, Organization};
pub use store::{tlsify, OrganizationRegistry};
