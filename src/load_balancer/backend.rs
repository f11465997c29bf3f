//! Connection entries and discovery input.
//!
//! # Responsibilities
//! - Represent a resolved backend address and its discovery metadata
//! - Derive the static weight of a connection from that metadata
//! - Hold the per-connection scheduling state used by the weighted picker

use std::collections::HashMap;
use std::net::SocketAddr;

/// Weight used when discovery carries no usable `weight`.
pub const DEFAULT_WEIGHT: u32 = 10;

/// Metadata key carrying the connection weight.
pub const WEIGHT_KEY: &str = "weight";

/// One address delivered by service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub addr: SocketAddr,
    pub metadata: HashMap<String, String>,
}

impl ResolvedAddress {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            metadata: HashMap::new(),
        }
    }

    /// Attach a `weight` attribute. Non-positive values fall back to the default.
    pub fn with_weight(mut self, weight: i64) -> Self {
        self.metadata.insert(WEIGHT_KEY.to_string(), weight.to_string());
        self
    }

    /// Static weight of this address.
    pub fn weight(&self) -> u32 {
        weight_from_metadata(&self.metadata)
    }
}

/// Parse `weight` from discovery metadata.
///
/// Absent, unparseable and non-positive values all map to [`DEFAULT_WEIGHT`].
pub fn weight_from_metadata(metadata: &HashMap<String, String>) -> u32 {
    metadata
        .get(WEIGHT_KEY)
        .and_then(|w| w.trim().parse::<i64>().ok())
        .filter(|w| *w > 0)
        .map(|w| u32::try_from(w).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_WEIGHT)
}

/// A tracked backend connection.
///
/// Every mutable field is owned by the picker and only touched under its lock.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Peer address; the transport owns the connection itself.
    pub addr: SocketAddr,
    /// Static capacity hint, immutable after creation.
    pub weight: u32,
    /// Smooth weighted round-robin accumulator.
    pub(crate) running: i64,
    /// Whether the entry may currently be selected.
    pub(crate) available: bool,
    /// A health probe is outstanding for this entry.
    pub(crate) probing: bool,
    /// Picks whose completion has not been reported yet.
    pub(crate) in_flight: usize,
}

impl ConnectionEntry {
    pub fn new(address: &ResolvedAddress) -> Self {
        Self {
            addr: address.addr,
            weight: address.weight(),
            running: 0,
            available: true,
            probing: false,
            in_flight: 0,
        }
    }

    pub fn running(&self) -> i64 {
        self.running
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_probing(&self) -> bool {
        self.probing
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_weight_defaults() {
        assert_eq!(ResolvedAddress::new(addr(1)).weight(), DEFAULT_WEIGHT);
        assert_eq!(ResolvedAddress::new(addr(1)).with_weight(0).weight(), DEFAULT_WEIGHT);
        assert_eq!(ResolvedAddress::new(addr(1)).with_weight(-3).weight(), DEFAULT_WEIGHT);
        assert_eq!(ResolvedAddress::new(addr(1)).with_weight(80).weight(), 80);
    }

    #[test]
    fn test_weight_unparseable() {
        let mut resolved = ResolvedAddress::new(addr(1));
        resolved.metadata.insert(WEIGHT_KEY.into(), "heavy".into());
        assert_eq!(resolved.weight(), DEFAULT_WEIGHT);

        resolved.metadata.insert(WEIGHT_KEY.into(), " 25 ".into());
        assert_eq!(resolved.weight(), 25);
    }

    #[test]
    fn test_new_entry_starts_available() {
        let entry = ConnectionEntry::new(&ResolvedAddress::new(addr(2)).with_weight(30));
        assert_eq!(entry.weight, 30);
        assert_eq!(entry.running(), 0);
        assert!(entry.is_available());
        assert!(!entry.is_probing());
        assert_eq!(entry.in_flight(), 0);
    }
}
