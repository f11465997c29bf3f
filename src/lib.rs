//! Client-side connection selection and fault isolation for RPC clients.
//!
//! Picks one connection per call with smooth weighted round-robin, fuses
//! connections whose backend reports `Unavailable`, probes them back into
//! rotation, and fails calls fast while a target's circuit breaker is open.

pub mod config;
pub mod error;
pub mod health;
pub mod interceptor;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::BalancerConfig;
pub use error::{CallError, Code, NoConnectionAvailable, NotAllowed, Status};
pub use interceptor::{Client, ClientBuilder, Reply, Request, Transport};
pub use lifecycle::Shutdown;
pub use load_balancer::Balancer;
pub use resilience::BreakerRegistry;
