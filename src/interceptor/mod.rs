//! Client-side call interceptors.
//!
//! # Data Flow
//! ```text
//! caller
//!     → trace.rs     (span around everything, including breaker rejection)
//!     → metrics.rs   (latency/outcome, including fast-fail)
//!     → breaker.rs   (allow gate, mark success/failure)
//!     → dispatch.rs  (pick connection → transport → picker feedback)
//! ```
//!
//! # Design Decisions
//! - Every interceptor is a tower layer; tracing and metrics are optional
//! - Errors are never swallowed: refusals surface as distinct `CallError` variants,
//!   backend statuses pass through unchanged
//! - The peer and status code ride on `Reply` / `CallError` so outer layers can
//!   classify without knowing picker or breaker internals

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use crate::config::BalancerConfig;
use crate::error::{CallError, Status};
use crate::load_balancer::pool::Balancer;
use crate::resilience::BreakerRegistry;

pub mod breaker;
pub mod dispatch;
pub mod metrics;
pub mod trace;

pub use breaker::BreakerLayer;
pub use dispatch::Dispatch;
pub use metrics::MetricsLayer;
pub use trace::TracingLayer;

/// An outgoing unary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<B> {
    /// Fully qualified method name, e.g. `/comment.v1.Comment/Create`.
    pub method: String,
    pub body: B,
}

impl<B> Request<B> {
    pub fn new(method: impl Into<String>, body: B) -> Self {
        Self {
            method: method.into(),
            body,
        }
    }
}

/// A successful response and the peer that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<R> {
    pub peer: SocketAddr,
    pub body: R,
}

/// The RPC framework's unary call, executed on an already selected peer.
pub trait Transport: Clone + Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    fn call(
        &self,
        peer: SocketAddr,
        request: Request<Self::Request>,
    ) -> BoxFuture<'static, Result<Self::Response, Status>>;
}

/// A fully composed client.
pub type Client<B, R> = BoxCloneService<Request<B>, Reply<R>, CallError>;

/// Composes the interceptor chain in its fixed order.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    target: String,
    tracing: bool,
    metrics: bool,
}

impl ClientBuilder {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            tracing: true,
            metrics: true,
        }
    }

    pub fn from_config(config: &BalancerConfig) -> Self {
        Self::new(config.target.clone())
            .tracing(config.interceptors.tracing)
            .metrics(config.interceptors.metrics)
    }

    pub fn tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    pub fn build<T: Transport>(
        self,
        balancer: Arc<Balancer>,
        breakers: Arc<BreakerRegistry>,
        transport: T,
    ) -> Client<T::Request, T::Response> {
        let service = ServiceBuilder::new()
            .option_layer(self.tracing.then(|| TracingLayer::new(&self.target)))
            .option_layer(self.metrics.then(|| MetricsLayer::new(&self.target)))
            .layer(BreakerLayer::new(&self.target, breakers))
            .service(Dispatch::new(balancer, transport));
        BoxCloneService::new(service)
    }
}
