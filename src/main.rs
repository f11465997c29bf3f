//! Balancer simulator.
//!
//! Drives synthetic unary calls through the full client chain
//! (tracing → metrics → breaker → weighted picker) against an in-memory
//! transport, then prints how calls were spread across peers.
//!
//! ```text
//! rpc-balancer --config balancer.toml --calls 10000 --concurrency 8 \
//!     --unavailable 127.0.0.1:9003 --recover-after-ms 2000
//! ```

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tower::{Service, ServiceExt};

use rpc_balancer::config::loader::load_config;
use rpc_balancer::config::watcher::{follow, ConfigWatcher};
use rpc_balancer::config::{BalancerConfig, EndpointConfig};
use rpc_balancer::health::{HealthProbe, ProbeError, Prober};
use rpc_balancer::observability::{logging, metrics};
use rpc_balancer::{
    Balancer, BreakerRegistry, CallError, ClientBuilder, Request, Shutdown, Status, Transport,
};

#[derive(Parser)]
#[command(name = "rpc-balancer")]
#[command(about = "Simulate client-side weighted balancing with fusing and circuit breaking", long_about = None)]
struct Cli {
    /// Balancer config (TOML). Without it three demo peers weighted 10/10/80 are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Total number of calls to issue.
    #[arg(long, default_value_t = 10_000)]
    calls: usize,

    /// Number of concurrent callers.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Peers that answer every call and probe with `Unavailable`.
    #[arg(long = "unavailable")]
    unavailable: Vec<SocketAddr>,

    /// Unavailable peers come back after this many milliseconds.
    #[arg(long)]
    recover_after_ms: Option<u64>,

    /// Reload endpoints when the config file changes.
    #[arg(long)]
    watch: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Peers that are down, optionally only for a while.
struct Outage {
    down: HashSet<SocketAddr>,
    started: Instant,
    recover_after: Option<Duration>,
}

impl Outage {
    fn is_down(&self, peer: SocketAddr) -> bool {
        self.down.contains(&peer) && self.recover_after.map_or(true, |d| self.started.elapsed() < d)
    }
}

#[derive(Clone)]
struct SimTransport {
    outage: Arc<Outage>,
}

impl Transport for SimTransport {
    type Request = ();
    type Response = ();

    fn call(&self, peer: SocketAddr, _request: Request<()>) -> BoxFuture<'static, Result<(), Status>> {
        let down = self.outage.is_down(peer);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_micros(200)).await;
            if down {
                Err(Status::unavailable("connection refused"))
            } else {
                Ok(())
            }
        })
    }
}

struct SimProber {
    outage: Arc<Outage>,
}

impl Prober for SimProber {
    fn probe(&self, addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
        let down = self.outage.is_down(addr);
        Box::pin(async move {
            if down {
                Err(ProbeError::Unreachable(addr.to_string()))
            } else {
                Ok(())
            }
        })
    }
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    calls: usize,
    ok: usize,
    picks: BTreeMap<String, usize>,
    errors: BTreeMap<String, usize>,
    elapsed_ms: u128,
}

impl Summary {
    fn merge(&mut self, other: Summary) {
        self.calls += other.calls;
        self.ok += other.ok;
        for (peer, n) in other.picks {
            *self.picks.entry(peer).or_default() += n;
        }
        for (kind, n) in other.errors {
            *self.errors.entry(kind).or_default() += n;
        }
    }

    fn record(&mut self, result: &Result<rpc_balancer::Reply<()>, CallError>) {
        self.calls += 1;
        match result {
            Ok(reply) => {
                self.ok += 1;
                *self.picks.entry(reply.peer.to_string()).or_default() += 1;
            }
            Err(e) => {
                if let Some(peer) = e.peer() {
                    *self.picks.entry(peer.to_string()).or_default() += 1;
                }
                let kind = match e {
                    CallError::NotAllowed(_) => "breaker_open".to_string(),
                    CallError::NoConnectionAvailable(_) => "no_connection".to_string(),
                    CallError::Backend { status, .. } => status.code.to_string(),
                };
                *self.errors.entry(kind).or_default() += 1;
            }
        }
    }
}

fn demo_config() -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.target = "demo".to_string();
    config.endpoints = [("127.0.0.1:9001", 10), ("127.0.0.1:9002", 10), ("127.0.0.1:9003", 80)]
        .into_iter()
        .map(|(address, weight)| EndpointConfig {
            weight: Some(weight),
            ..EndpointConfig::new(address)
        })
        .collect();
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => demo_config(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        service = %config.target,
        endpoints = config.endpoints.len(),
        calls = cli.calls,
        concurrency = cli.concurrency,
        "rpc-balancer simulation starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let outage = Arc::new(Outage {
        down: cli.unavailable.iter().copied().collect(),
        started: Instant::now(),
        recover_after: cli.recover_after_ms.map(Duration::from_millis),
    });

    let probe = HealthProbe::new(Arc::new(SimProber { outage: outage.clone() }), config.probe.clone(), &shutdown);
    let balancer = Arc::new(Balancer::new(config.target.clone(), &config.resolved_addresses(), probe));
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));

    // Keep the watcher alive for the whole run.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(follow(balancer.clone(), updates, shutdown.subscribe()));
            Some(watcher.run()?)
        }
        _ => None,
    };

    let client = ClientBuilder::from_config(&config).build(balancer.clone(), breakers, SimTransport { outage });

    let start = Instant::now();
    let workers = cli.concurrency.max(1);
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let share = cli.calls / workers + usize::from(worker < cli.calls % workers);
        let mut client = client.clone();
        handles.push(tokio::spawn(async move {
            let mut summary = Summary::default();
            for _ in 0..share {
                let result = match ServiceExt::<Request<()>>::ready(&mut client).await {
                    Ok(svc) => svc.call(Request::new("/demo.v1.Demo/Echo", ())).await,
                    Err(e) => Err(e),
                };
                summary.record(&result);
            }
            summary
        }));
    }

    let run = async {
        let mut total = Summary::default();
        for handle in handles {
            total.merge(handle.await?);
        }
        Ok::<_, tokio::task::JoinError>(total)
    };

    let mut summary = tokio::select! {
        result = run => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            shutdown.trigger();
            return Ok(());
        }
    };
    summary.elapsed_ms = start.elapsed().as_millis();
    shutdown.trigger();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("calls: {} ok: {} elapsed: {}ms", summary.calls, summary.ok, summary.elapsed_ms);
        for (peer, n) in &summary.picks {
            let share = *n as f64 * 100.0 / summary.calls.max(1) as f64;
            println!("  {peer:<22} {n:>8} ({share:.1}%)");
        }
        for (kind, n) in &summary.errors {
            println!("  error {kind:<16} {n:>8}");
        }
        for entry in balancer.connections() {
            println!(
                "  {} weight={} available={}",
                entry.addr,
                entry.weight,
                entry.is_available()
            );
        }
    }

    Ok(())
}
