//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → endpoint list handed to the balancer, which rebuilds its picker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - The endpoint list doubles as a static discovery source

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    BalancerConfig, BreakerConfig, EndpointConfig, InterceptorConfig, ObservabilityConfig, ProbeConfig,
};
