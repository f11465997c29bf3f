//! Lazily created circuit breakers, one per logical target.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::CircuitBreaker;

#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker guarding `method` on `target`.
    ///
    /// Keyed by target alone unless `per_method` is configured.
    pub fn get(&self, target: &str, method: &str) -> Arc<CircuitBreaker> {
        let key = if self.config.per_method {
            format!("{target}/{method}")
        } else {
            target.to_string()
        };

        if let Some(breaker) = self.breakers.get(&key) {
            return breaker.value().clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(key.clone(), self.config.clone()));
        self.breakers.entry(key).or_insert(breaker).value().clone()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
