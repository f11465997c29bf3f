//! Circuit-breaking interceptor.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use tower::{Layer, Service};

use crate::error::CallError;
use crate::health::passive::Outcome;
use crate::interceptor::{Reply, Request};
use crate::resilience::BreakerRegistry;

#[derive(Debug, Clone)]
pub struct BreakerLayer {
    target: Arc<str>,
    breakers: Arc<BreakerRegistry>,
}

impl BreakerLayer {
    pub fn new(target: &str, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            target: Arc::from(target),
            breakers,
        }
    }
}

impl<S> Layer<S> for BreakerLayer {
    type Service = BreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BreakerService {
            inner,
            target: self.target.clone(),
            breakers: self.breakers.clone(),
        }
    }
}

/// Fails fast while the target's breaker is open; records every
/// health-relevant outcome otherwise.
#[derive(Debug, Clone)]
pub struct BreakerService<S> {
    inner: S,
    target: Arc<str>,
    breakers: Arc<BreakerRegistry>,
}

impl<S, B, R> Service<Request<B>> for BreakerService<S>
where
    S: Service<Request<B>, Response = Reply<R>, Error = CallError>,
    S::Future: Send + 'static,
    R: Send + 'static,
{
    type Response = Reply<R>;
    type Error = CallError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let breaker = self.breakers.get(&self.target, &request.method);
        if let Err(e) = breaker.allow() {
            tracing::debug!(breaker = %breaker.name(), method = %request.method, "Call rejected by circuit breaker");
            return Box::pin(future::ready(Err(e.into())));
        }

        let call = self.inner.call(request);
        Box::pin(async move {
            let result = call.await;
            match Outcome::from_call(&result).breaker_signal() {
                Some(true) => breaker.mark_success(),
                Some(false) => breaker.mark_failed(),
                None => {}
            }
            result
        })
    }
}
