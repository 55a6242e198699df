//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher / coordinator / facade / gateway:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Every event carries the channel and transaction id as fields
//! - Metric updates are no-ops until a recorder is installed, so library
//!   users and tests pay nothing

pub mod logging;
pub mod metrics;
