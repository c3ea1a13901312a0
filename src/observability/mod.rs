//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline access log stage
//!     → logging.rs (structured access and error events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line for a request
//! - Metrics are cheap when no exporter is installed

pub mod logging;
pub mod metrics;
