//! Connection set management.
//!
//! # Responsibilities
//! - Own the current weighted picker for a resolved address set
//! - Replace it wholesale whenever discovery delivers a new list
//! - Route call feedback to the picker that served the call
//! - Hand fused entries to the health probe

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::NoConnectionAvailable;
use crate::health::active::HealthProbe;
use crate::health::passive::Outcome;
use crate::load_balancer::backend::{ConnectionEntry, ResolvedAddress};
use crate::load_balancer::weighted::{Transition, WeightedPicker};
use crate::observability::metrics;

/// A selected connection.
///
/// Keeps the picker it came from alive so feedback lands on the right entry
/// even if the address set is replaced while the call is in flight.
#[derive(Debug, Clone)]
pub struct Pick {
    picker: Arc<WeightedPicker>,
    index: usize,
    addr: SocketAddr,
}

impl Pick {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Picker plus feedback loop for one target.
///
/// Fused connections are re-tested by tasks spawned on the ambient tokio
/// runtime. Feedback delivered outside a runtime still fuses, but nothing
/// restores the connection until the next [`Balancer::update`].
#[derive(Debug)]
pub struct Balancer {
    target: String,
    picker: ArcSwap<WeightedPicker>,
    probe: HealthProbe,
}

impl Balancer {
    pub fn new(target: impl Into<String>, addresses: &[ResolvedAddress], probe: HealthProbe) -> Self {
        let target = target.into();
        let picker = WeightedPicker::new(addresses);
        metrics::record_picker_size(&target, picker.len());
        tracing::info!(service = %target, connections = picker.len(), "Balancer created");
        Self {
            target,
            picker: ArcSwap::from_pointee(picker),
            probe,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Rebuild the picker from a new address list.
    ///
    /// Outstanding probes against the old picker stop on their next attempt.
    pub fn update(&self, addresses: &[ResolvedAddress]) {
        let picker = WeightedPicker::new(addresses);
        let connections = picker.len();
        self.picker.store(Arc::new(picker));
        metrics::record_picker_size(&self.target, connections);
        for address in addresses {
            metrics::record_connection_available(&address.addr.to_string(), true);
        }
        tracing::info!(service = %self.target, connections, "Connection set replaced");
    }

    /// Select a connection for one call.
    pub fn pick(&self) -> Result<Pick, NoConnectionAvailable> {
        let picker = self.picker.load_full();
        match picker.pick() {
            Ok((index, addr)) => Ok(Pick { picker, index, addr }),
            Err(e) => {
                tracing::debug!(service = %self.target, connections = picker.len(), "No available connection");
                for entry in picker.snapshot() {
                    tracing::trace!(addr = %entry.addr, available = entry.is_available(), "Connection status");
                }
                Err(e)
            }
        }
    }

    /// Completion callback. Call exactly once per successful [`Balancer::pick`].
    pub fn complete(&self, pick: &Pick, outcome: Outcome) {
        match pick.picker.feedback(pick.index, outcome) {
            Transition::Fused { schedule_probe } => {
                tracing::warn!(service = %self.target, addr = %pick.addr, "Connection fused");
                metrics::record_connection_available(&pick.addr.to_string(), false);
                if schedule_probe {
                    self.probe.schedule(&pick.picker, pick.index, pick.addr);
                }
            }
            Transition::Penalized => {
                tracing::debug!(service = %self.target, addr = %pick.addr, "Connection overloaded, deprioritised");
            }
            Transition::Unchanged => {}
        }
    }

    /// The picker currently serving new calls.
    pub fn picker(&self) -> Arc<WeightedPicker> {
        self.picker.load_full()
    }

    /// Entries of the current picker.
    pub fn connections(&self) -> Vec<ConnectionEntry> {
        self.picker.load().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use crate::health::active::{ProbeError, Prober};
    use crate::lifecycle::Shutdown;
    use futures_util::future::BoxFuture;

    struct NeverHealthy;

    impl Prober for NeverHealthy {
        fn probe(&self, _addr: SocketAddr) -> BoxFuture<'static, Result<(), ProbeError>> {
            Box::pin(async { Err(ProbeError::Unreachable("down".into())) })
        }
    }

    fn addresses(weights: &[i64]) -> Vec<ResolvedAddress> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ResolvedAddress::new(SocketAddr::from(([10, 0, 0, 2], 7000 + i as u16))).with_weight(*w))
            .collect()
    }

    fn balancer(weights: &[i64]) -> Balancer {
        let probe = HealthProbe::new(Arc::new(NeverHealthy), ProbeConfig::default(), &Shutdown::new());
        Balancer::new("comment", &addresses(weights), probe)
    }

    #[test]
    fn test_pick_and_complete_without_runtime() {
        let balancer = balancer(&[1, 1]);
        let pick = balancer.pick().unwrap();
        balancer.complete(&pick, Outcome::Unavailable);

        // No runtime to spawn the probe on: the slot is released, the entry stays fused.
        let entry = &balancer.connections()[pick.index()];
        assert!(!entry.is_available());
        assert!(!entry.is_probing());
    }

    #[test]
    fn test_update_replaces_set() {
        let balancer = balancer(&[1, 1]);
        let pick = balancer.pick().unwrap();
        balancer.complete(&pick, Outcome::Unavailable);

        balancer.update(&addresses(&[5, 5, 5]));
        let connections = balancer.connections();
        assert_eq!(connections.len(), 3);
        assert!(connections.iter().all(|e| e.is_available() && e.running() == 0));
    }

    #[test]
    fn test_feedback_after_update_hits_old_picker() {
        let balancer = balancer(&[1]);
        let old = balancer.picker();
        let pick = balancer.pick().unwrap();
        balancer.update(&addresses(&[1]));
        assert!(!Arc::ptr_eq(&old, &balancer.picker()));
        balancer.complete(&pick, Outcome::Unavailable);

        assert!(balancer.connections()[0].is_available());
        assert!(!old.entry(0).unwrap().is_available());
        assert_eq!(old.entry(0).unwrap().in_flight(), 0);
    }

    #[test]
    fn test_empty_update() {
        let balancer = balancer(&[3]);
        balancer.update(&[]);
        assert_eq!(balancer.pick().unwrap_err(), NoConnectionAvailable);
    }
}
