//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline executions and the HTTP engine produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (execution counters, duration histogram)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Request ID flows into every call pipeline execution span
//! - Metric updates are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
