//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Picker, breaker, probe and interceptors produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Observers only see method, peer, code, latency and the breaker-open flag
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
