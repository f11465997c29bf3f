//! Smooth weighted round-robin picker.
//!
//! Each pick adds every available entry's weight to its running value,
//! selects the largest running value (first one wins ties) and subtracts the
//! total available weight from the winner. Over any `Σw` consecutive picks an
//! entry is chosen in proportion to its weight, interleaved rather than in
//! bursts.
//!
//! The whole entry list sits behind one mutex. Both the pick and the feedback
//! critical sections are O(entries).

use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::error::NoConnectionAvailable;
use crate::health::passive::Outcome;
use crate::load_balancer::backend::{ConnectionEntry, ResolvedAddress};

/// State change caused by call feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// The entry was just fused. `schedule_probe` is set when this caller
    /// claimed the entry's probe slot and must start the probe.
    Fused { schedule_probe: bool },
    /// The entry lost one round of scheduling credit.
    Penalized,
}

/// Weighted picker over one resolved address set.
#[derive(Debug)]
pub struct WeightedPicker {
    entries: Mutex<Vec<ConnectionEntry>>,
}

impl WeightedPicker {
    pub fn new(addresses: &[ResolvedAddress]) -> Self {
        Self {
            entries: Mutex::new(addresses.iter().map(ConnectionEntry::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.available).count()
    }

    /// Select one available entry. Returns its index and address.
    pub fn pick(&self) -> Result<(usize, SocketAddr), NoConnectionAvailable> {
        let mut entries = self.entries.lock();

        let mut total: i64 = 0;
        let mut best: Option<(usize, i64)> = None;
        for (index, entry) in entries.iter_mut().enumerate() {
            if !entry.available {
                continue;
            }
            entry.running += i64::from(entry.weight);
            total += i64::from(entry.weight);
            if best.map_or(true, |(_, running)| entry.running > running) {
                best = Some((index, entry.running));
            }
        }

        let (index, _) = best.ok_or(NoConnectionAvailable)?;
        let selected = &mut entries[index];
        selected.running -= total;
        selected.in_flight += 1;
        Ok((index, selected.addr))
    }

    /// Apply the outcome of a call made on entry `index`.
    pub fn feedback(&self, index: usize, outcome: Outcome) -> Transition {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(index) else {
            return Transition::Unchanged;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);

        match outcome {
            Outcome::Success | Outcome::Ignored | Outcome::Failure => Transition::Unchanged,
            Outcome::Unavailable => {
                if !entry.available {
                    return Transition::Unchanged;
                }
                entry.available = false;
                let schedule_probe = !entry.probing;
                entry.probing = true;
                Transition::Fused { schedule_probe }
            }
            Outcome::Overloaded => {
                if !entry.available {
                    return Transition::Unchanged;
                }
                entry.running -= i64::from(entry.weight);
                Transition::Penalized
            }
        }
    }

    /// Put a fused entry back into rotation with a fresh scheduling position.
    ///
    /// Returns false if the entry was already available.
    pub fn restore(&self, index: usize) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(index) else {
            return false;
        };
        entry.probing = false;
        if entry.available {
            return false;
        }
        entry.available = true;
        entry.running = 0;
        true
    }

    /// Give up the probe slot without restoring the entry.
    pub fn release_probe(&self, index: usize) {
        if let Some(entry) = self.entries.lock().get_mut(index) {
            entry.probing = false;
        }
    }

    pub fn entry(&self, index: usize) -> Option<ConnectionEntry> {
        self.entries.lock().get(index).cloned()
    }

    /// Copy of every entry, in selection order.
    pub fn snapshot(&self) -> Vec<ConnectionEntry> {
        self.entries.lock().clone()
    }
}
