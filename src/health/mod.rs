//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (passive.rs):
//!     Call finished
//!     → classify status code into an Outcome
//!     → picker feedback (fuse / penalise / no-op)
//!     → breaker mark (success / failure / excluded)
//!
//! Active (active.rs):
//!     Connection fused
//!     → one probe task for that entry
//!     → capped exponential backoff between attempts
//!     → restore entry on first success
//! ```
//!
//! # Design Decisions
//! - A single `Unavailable` fuses immediately, no grace period
//! - Probes only run for fused entries, never on a timer for healthy ones
//! - Health state is per-connection, breaker state is per-target

pub mod active;
pub mod passive;

pub use active::{HealthProbe, ProbeError, Prober, TcpProber};
pub use passive::Outcome;
