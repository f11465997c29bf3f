//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing call:
//!     → registry.rs (breaker for the target, created on first use)
//!     → circuit_breaker.rs (allow: fail fast while the window is failing)
//!     → ... call runs ...
//!     → circuit_breaker.rs (mark success / failure)
//!
//! Fused connection:
//!     → backoff.rs (delay between health probes)
//! ```
//!
//! # Design Decisions
//! - Breakers gate whether a call is attempted at all, upstream of selection
//! - One breaker per target (optionally per method), not per connection
//! - Backoff is capped and jittered so dead backends are not probed in lockstep

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use registry::BreakerRegistry;
