//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! crypto-config tree (keystore/*_sk, signcerts/*.pem)
//!     → provider.rs (locate + parse PEM material)
//!     → user.rs (Identity with Enrollment attached)
//!     → attached to Organization as peer admin
//! ```

pub mod provider;
pub mod user;

pub use provider::{find_private_key, CredentialProvider, FileCredentialProvider};
pub use user::{Enrollment, Identity};
