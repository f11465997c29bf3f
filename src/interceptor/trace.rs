//! Tracing interceptor.
//!
//! Opens one span per call before anything else runs, so breaker rejections
//! and connection selection are inside it. The span carries a fresh call id.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::field::{display, Empty};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{CallError, Code};
use crate::interceptor::{Reply, Request};

#[derive(Debug, Clone)]
pub struct TracingLayer {
    target: Arc<str>,
}

impl TracingLayer {
    pub fn new(target: &str) -> Self {
        Self {
            target: Arc::from(target),
        }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            target: self.target.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingService<S> {
    inner: S,
    target: Arc<str>,
}

impl<S, B, R> Service<Request<B>> for TracingService<S>
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
        let span = tracing::info_span!(
            "rpc_client",
            call_id = %Uuid::new_v4(),
            service = %self.target,
            method = %request.method,
            peer = Empty,
            code = Empty,
            breaker_open = Empty,
            elapsed_ms = Empty,
        );

        let call = {
            let _enter = span.enter();
            self.inner.call(request)
        };

        let recorder = span.clone();
        Box::pin(
            async move {
                let result = call.await;
                recorder.record("elapsed_ms", start.elapsed().as_millis() as u64);
                match &result {
                    Ok(reply) => {
                        recorder.record("peer", display(reply.peer));
                        recorder.record("code", Code::Ok.as_str());
                        recorder.record("breaker_open", false);
                        tracing::debug!("Call completed");
                    }
                    Err(e) => {
                        if let Some(peer) = e.peer() {
                            recorder.record("peer", display(peer));
                        }
                        recorder.record("code", e.code().as_str());
                        recorder.record("breaker_open", e.is_breaker_open());
                        match e.code() {
                            // The caller gave up; the backend said nothing about its health.
                            Code::Cancelled | Code::DeadlineExceeded => {
                                tracing::debug!(error = %e, "Call failed")
                            }
                            _ => tracing::warn!(error = %e, "Call failed"),
                        }
                    }
                }
                result
            }
            .instrument(span),
        )
    }
}
