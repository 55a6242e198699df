//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request id, tracing, timeout)
//!     → ChannelClient (send_transaction / send_query)
//!     → response.rs (LedgerError → status + {message, timestamp})
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{ApiError, ErrorBody};
pub use server::{AppState, GatewayServer, HealthStatus};
