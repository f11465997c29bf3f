//! Innermost service: connection selection and the transport call.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use tower::Service;

use crate::error::CallError;
use crate::health::passive::Outcome;
use crate::interceptor::{Reply, Request, Transport};
use crate::load_balancer::pool::{Balancer, Pick};

/// Picks a connection, runs the call on it, and reports the outcome back.
#[derive(Debug, Clone)]
pub struct Dispatch<T> {
    balancer: Arc<Balancer>,
    transport: T,
}

impl<T> Dispatch<T> {
    pub fn new(balancer: Arc<Balancer>, transport: T) -> Self {
        Self { balancer, transport }
    }
}

impl<T: Transport> Service<Request<T::Request>> for Dispatch<T> {
    type Response = Reply<T::Response>;
    type Error = CallError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<T::Request>) -> Self::Future {
        let pick = match self.balancer.pick() {
            Ok(pick) => pick,
            Err(e) => return Box::pin(future::ready(Err(e.into()))),
        };
        let peer = pick.addr();
        let completion = Completion {
            balancer: self.balancer.clone(),
            pick: Some(pick),
        };
        let call = self.transport.call(peer, request);

        Box::pin(async move {
            let result = call.await;
            completion.finish(Outcome::from_result(&result));
            result
                .map(|body| Reply { peer, body })
                .map_err(|status| CallError::Backend { peer, status })
        })
    }
}

/// Reports the outcome of a picked connection exactly once.
///
/// Dropped before `finish` (the caller abandoned the call) it reports
/// `Outcome::Ignored`, which leaves availability untouched.
struct Completion {
    balancer: Arc<Balancer>,
    pick: Option<Pick>,
}

impl Completion {
    fn finish(mut self, outcome: Outcome) {
        if let Some(pick) = self.pick.take() {
            self.balancer.complete(&pick, outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(pick) = self.pick.take() {
            tracing::trace!(addr = %pick.addr(), "Call abandoned before completion");
            self.balancer.complete(&pick, Outcome::Ignored);
        }
    }
}
