//! Active health checking.
//!
//! # Responsibilities
//! - Re-test fused connections out of band
//! - Restore a connection once its backend is reachable again
//! - Back off exponentially against backends that stay down

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ProbeConfig;
use crate::lifecycle::Shutdown;
use crate::load_balancer::weighted::WeightedPicker;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Why a probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Out-of-band reachability check for one backend.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>>;
}

/// Probes by opening a TCP connection to the backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe(&self, addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
        Box::pin(async move {
            TcpStream::connect(addr).await?;
            Ok(())
        })
    }
}

/// Schedules one background probe task per fused connection.
#[derive(Clone)]
pub struct HealthProbe {
    prober: Arc<dyn Prober>,
    config: ProbeConfig,
    shutdown: Shutdown,
}

impl fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthProbe")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthProbe {
    pub fn new(prober: Arc<dyn Prober>, config: ProbeConfig, shutdown: &Shutdown) -> Self {
        Self {
            prober,
            config,
            shutdown: shutdown.clone(),
        }
    }

    /// Start probing entry `index` of `picker`.
    ///
    /// The caller must hold the entry's probe slot (see `Transition::Fused`).
    pub fn schedule(&self, picker: &Arc<WeightedPicker>, index: usize, addr: SocketAddr) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(
                    addr = %addr,
                    "No tokio runtime, fused connection stays out until the next address update"
                );
                picker.release_probe(index);
                return;
            }
        };

        tracing::debug!(addr = %addr, "Scheduling health probe");
        handle.spawn(run_probe(
            Arc::downgrade(picker),
            index,
            addr,
            self.prober.clone(),
            self.config.clone(),
            self.shutdown.subscribe(),
        ));
    }
}

async fn run_probe(
    picker: Weak<WeightedPicker>,
    index: usize,
    addr: SocketAddr,
    prober: Arc<dyn Prober>,
    config: ProbeConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = shutdown.recv() => {
                tracing::debug!(addr = %addr, "Health probe received shutdown signal, exiting");
                return;
            }
        }

        if picker.strong_count() == 0 {
            tracing::debug!(addr = %addr, "Connection set replaced, abandoning probe");
            return;
        }

        let result = match time::timeout(timeout, prober.probe(addr)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        let Some(picker) = picker.upgrade() else {
            return;
        };

        match result {
            Ok(()) => {
                picker.restore(index);
                metrics::record_probe(&addr.to_string(), true);
                metrics::record_connection_available(&addr.to_string(), true);
                tracing::info!(addr = %addr, attempts = attempt, "Connection restored");
                return;
            }
            Err(e) => {
                metrics::record_probe(&addr.to_string(), false);
                tracing::debug!(addr = %addr, attempt, error = %e, "Health probe failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::passive::Outcome;
    use crate::load_balancer::backend::ResolvedAddress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` probes, then succeeds.
    struct Flaky {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Prober for Flaky {
        fn probe(&self, _addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let failures = self.failures;
            Box::pin(async move {
                if n < failures {
                    Err(ProbeError::Unreachable("refused".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    struct Hangs;

    impl Prober for Hangs {
        fn probe(&self, _addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
            Box::pin(std::future::pending())
        }
    }

    fn fused_picker() -> (Arc<WeightedPicker>, SocketAddr) {
        let addr = SocketAddr::from(([10, 0, 0, 3], 6000));
        let picker = Arc::new(WeightedPicker::new(&[ResolvedAddress::new(addr)]));
        picker.feedback(0, Outcome::Unavailable);
        (picker, addr)
    }

    fn config() -> ProbeConfig {
        ProbeConfig {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            timeout_ms: 50,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_restores_after_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let prober = Arc::new(Flaky { failures: 3, calls: calls.clone() });
        let probe = HealthProbe::new(prober, config(), &Shutdown::new());
        let (picker, addr) = fused_picker();

        probe.schedule(&picker, 0, addr);
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let entry = picker.entry(0).unwrap();
        assert!(entry.is_available());
        assert!(!entry.is_probing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_counts_as_failure() {
        let probe = HealthProbe::new(Arc::new(Hangs), config(), &Shutdown::new());
        let (picker, addr) = fused_picker();

        probe.schedule(&picker, 0, addr);
        time::sleep(Duration::from_secs(10)).await;

        let entry = picker.entry(0).unwrap();
        assert!(!entry.is_available());
        assert!(entry.is_probing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let prober = Arc::new(Flaky { failures: usize::MAX, calls: calls.clone() });
        let shutdown = Shutdown::new();
        let probe = HealthProbe::new(prober, config(), &shutdown);
        let (picker, addr) = fused_picker();

        probe.schedule(&picker, 0, addr);
        time::sleep(Duration::from_millis(1_500)).await;
        shutdown.trigger();
        time::sleep(Duration::from_millis(1)).await;
        let seen = calls.load(Ordering::SeqCst);
        assert!(seen > 0);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_tcp_prober_connects() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(TcpProber.probe(addr).await.is_ok());

        drop(listener);
        let err = TcpProber.probe(addr).await.unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_abandoned_when_picker_replaced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let prober = Arc::new(Flaky { failures: 0, calls: calls.clone() });
        let probe = HealthProbe::new(prober, config(), &Shutdown::new());
        let (picker, addr) = fused_picker();

        probe.schedule(&picker, 0, addr);
        drop(picker);
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
