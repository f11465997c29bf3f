//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ratios, window sizes, delays)
//! - Detect unparseable and duplicate endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Runs before a config is accepted, including on hot reload

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("endpoint address {0:?} is not a socket address")]
    InvalidAddress(String),

    #[error("endpoint {0} is listed more than once")]
    DuplicateEndpoint(SocketAddr),

    #[error("breaker.failure_ratio must be in (0, 1], got {0}")]
    FailureRatio(f64),

    #[error("breaker.{0} must be greater than zero")]
    ZeroWindow(&'static str),

    #[error("probe.base_delay_ms must be greater than zero")]
    ZeroProbeDelay,

    #[error("probe.max_delay_ms ({max}) is below probe.base_delay_ms ({base})")]
    ProbeDelayOrder { base: u64, max: u64 },

    #[error("probe.timeout_ms must be greater than zero")]
    ZeroProbeTimeout,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        match endpoint.address.parse::<SocketAddr>() {
            Ok(addr) => {
                if !seen.insert(addr) {
                    errors.push(ValidationError::DuplicateEndpoint(addr));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidAddress(endpoint.address.clone())),
        }
    }

    let breaker = &config.breaker;
    if !(breaker.failure_ratio > 0.0 && breaker.failure_ratio <= 1.0) {
        errors.push(ValidationError::FailureRatio(breaker.failure_ratio));
    }
    if breaker.window_size == 0 {
        errors.push(ValidationError::ZeroWindow("window_size"));
    }
    if breaker.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow("window_secs"));
    }

    let probe = &config.probe;
    if probe.base_delay_ms == 0 {
        errors.push(ValidationError::ZeroProbeDelay);
    }
    if probe.max_delay_ms < probe.base_delay_ms {
        errors.push(ValidationError::ProbeDelayOrder {
            base: probe.base_delay_ms,
            max: probe.max_delay_ms,
        });
    }
    if probe.timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
