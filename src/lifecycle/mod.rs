//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl-C / caller request → broadcast
//!     → health probes stop
//!     → endpoint watcher stops
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
