//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery delivers (address, metadata) list
//!     → backend.rs (ConnectionEntry per address, weight from metadata)
//!     → pool.rs (Balancer swaps in a new picker)
//!
//! Per call:
//!     → weighted.rs (smooth weighted round-robin over available entries)
//!     → call runs on the selected peer
//!     → pool.rs complete() → weighted.rs feedback → maybe health probe
//! ```
//!
//! # Design Decisions
//! - One mutex per picker; selection and feedback are O(entries)
//! - Pickers are replaced, never patched, when the address list changes
//! - Fused entries are skipped, not removed

pub mod backend;
pub mod pool;
pub mod weighted;

pub use backend::{ConnectionEntry, ResolvedAddress, DEFAULT_WEIGHT};
pub use pool::{Balancer, Pick};
pub use weighted::{Transition, WeightedPicker};
