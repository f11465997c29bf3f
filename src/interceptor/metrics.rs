//! Metrics interceptor.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::error::{CallError, Code};
use crate::interceptor::{Reply, Request};
use crate::observability::metrics::record_call;

#[derive(Debug, Clone)]
pub struct MetricsLayer {
    target: Arc<str>,
}

impl MetricsLayer {
    pub fn new(target: &str) -> Self {
        Self {
            target: Arc::from(target),
        }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            target: self.target.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    target: Arc<str>,
}

impl<S, B, R> Service<Request<B>> for MetricsService<S>
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
        let start = Instant::now();
        let target = self.target.clone();
        let method = request.method.clone();
        let call = self.inner.call(request);

        Box::pin(async move {
            let result = call.await;
            let (peer, code, breaker_open) = match &result {
                Ok(reply) => (Some(reply.peer), Code::Ok, false),
                Err(e) => (e.peer(), e.code(), e.is_breaker_open()),
            };
            record_call(&target, &method, peer, code, breaker_open, start);
            result
        })
    }
}
