//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};

use rpc_balancer::config::{BalancerConfig, BreakerConfig, EndpointConfig, ProbeConfig};
use rpc_balancer::error::Code;
use rpc_balancer::health::{HealthProbe, ProbeError, Prober};
use rpc_balancer::{
    Balancer, BreakerRegistry, CallError, Client, ClientBuilder, Reply, Request, Shutdown, Status, Transport,
};

pub const METHOD: &str = "/comment.v1.Comment/Create";

pub fn peer(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// In-memory transport. Every peer answers `Ok` unless told otherwise.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    failing: Arc<Mutex<HashMap<SocketAddr, Code>>>,
    calls: Arc<Mutex<Vec<SocketAddr>>>,
}

impl ScriptedTransport {
    pub fn fail(&self, peer: SocketAddr, code: Code) {
        self.failing.lock().unwrap().insert(peer, code);
    }

    pub fn heal(&self, peer: SocketAddr) {
        self.failing.lock().unwrap().remove(&peer);
    }

    /// Peers in the order they were called.
    pub fn calls(&self) -> Vec<SocketAddr> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, peer: SocketAddr) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| **p == peer).count()
    }
}

impl Transport for ScriptedTransport {
    type Request = ();
    type Response = ();

    fn call(&self, peer: SocketAddr, _request: Request<()>) -> BoxFuture<'static, Result<(), Status>> {
        self.calls.lock().unwrap().push(peer);
        let result = match self.failing.lock().unwrap().get(&peer) {
            Some(code) => Err(Status::new(*code, format!("scripted {code}"))),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }
}

/// Transport whose calls never finish.
#[derive(Clone, Default)]
pub struct StalledTransport {
    pub calls: Arc<AtomicUsize>,
}

impl Transport for StalledTransport {
    type Request = ();
    type Response = ();

    fn call(&self, _peer: SocketAddr, _request: Request<()>) -> BoxFuture<'static, Result<(), Status>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(std::future::pending())
    }
}

/// Prober with a single switch for every address.
#[derive(Clone, Default)]
pub struct SwitchProber {
    pub healthy: Arc<AtomicBool>,
    pub probes: Arc<AtomicUsize>,
}

impl SwitchProber {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Prober for SwitchProber {
    fn probe(&self, addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let healthy = self.healthy.load(Ordering::SeqCst);
        Box::pin(async move {
            if healthy {
                Ok(())
            } else {
                Err(ProbeError::Unreachable(addr.to_string()))
            }
        })
    }
}

pub fn config(weights: &[(u16, i64)]) -> BalancerConfig {
    BalancerConfig {
        target: "comment".to_string(),
        endpoints: weights
            .iter()
            .map(|(port, weight)| EndpointConfig {
                weight: Some(*weight),
                ..EndpointConfig::new(peer(*port).to_string())
            })
            .collect(),
        breaker: BreakerConfig {
            window_size: 100,
            window_secs: 10,
            failure_ratio: 0.5,
            min_samples: 10,
            per_method: false,
        },
        probe: ProbeConfig {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            timeout_ms: 50,
        },
        ..BalancerConfig::default()
    }
}

/// Everything a test needs to drive and inspect one client.
pub struct Harness<T: Transport> {
    pub client: Client<T::Request, T::Response>,
    pub balancer: Arc<Balancer>,
    pub breakers: Arc<BreakerRegistry>,
    pub transport: T,
    pub prober: SwitchProber,
    pub shutdown: Shutdown,
}

impl<T: Transport> Harness<T> {
    pub fn new(config: &BalancerConfig, transport: T) -> Self {
        Self::with_builder(config, ClientBuilder::from_config(config), transport)
    }

    pub fn with_builder(config: &BalancerConfig, builder: ClientBuilder, transport: T) -> Self {
        let shutdown = Shutdown::new();
        let prober = SwitchProber::default();
        let probe = HealthProbe::new(Arc::new(prober.clone()), config.probe.clone(), &shutdown);
        let balancer = Arc::new(Balancer::new(config.target.clone(), &config.resolved_addresses(), probe));
        let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
        let client = builder.build(balancer.clone(), breakers.clone(), transport.clone());
        Self {
            client,
            balancer,
            breakers,
            transport,
            prober,
            shutdown,
        }
    }

    /// Breaker success and failure counts for the harness target.
    pub fn breaker_counts(&self) -> (usize, usize) {
        self.breakers.get(self.balancer.target(), METHOD).counts()
    }

    pub fn available(&self) -> Vec<bool> {
        self.balancer.connections().iter().map(|e| e.is_available()).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.balancer.connections().iter().map(|e| e.in_flight()).sum()
    }
}

impl<T: Transport<Request = ()>> Harness<T> {
    pub async fn call(&mut self) -> Result<Reply<T::Response>, CallError> {
        send(&mut self.client).await
    }
}

pub async fn send<R: Send + 'static>(client: &mut Client<(), R>) -> Result<Reply<R>, CallError> {
    client.ready().await?.call(Request::new(METHOD, ())).await
}
