//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! carry defaults, so a minimal file only needs the endpoint list.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::load_balancer::backend::{ResolvedAddress, WEIGHT_KEY};

/// Root configuration for one client-side balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Logical service name (breaker key and metric label).
    pub target: String,

    /// Static endpoint list, the file-based discovery source.
    pub endpoints: Vec<EndpointConfig>,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Health probe settings for fused connections.
    pub probe: ProbeConfig,

    /// Optional interceptors around each call.
    pub interceptors: InterceptorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            target: "default".to_string(),
            endpoints: Vec::new(),
            breaker: BreakerConfig::default(),
            probe: ProbeConfig::default(),
            interceptors: InterceptorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl BalancerConfig {
    /// Endpoints as discovery output. Unparseable addresses are skipped
    /// (validation reports them).
    pub fn resolved_addresses(&self) -> Vec<ResolvedAddress> {
        self.endpoints
            .iter()
            .filter_map(|endpoint| match endpoint.resolve() {
                Some(resolved) => Some(resolved),
                None => {
                    tracing::warn!(address = %endpoint.address, "Invalid endpoint address");
                    None
                }
            })
            .collect()
    }
}

/// One backend endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Socket address (e.g. "127.0.0.1:9000").
    pub address: String,

    /// Capacity hint. Absent or non-positive means the default weight.
    #[serde(default)]
    pub weight: Option<i64>,

    /// Free-form discovery metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: None,
            metadata: HashMap::new(),
        }
    }

    pub fn resolve(&self) -> Option<ResolvedAddress> {
        let addr: SocketAddr = self.address.parse().ok()?;
        let mut metadata = self.metadata.clone();
        if let Some(weight) = self.weight {
            metadata.insert(WEIGHT_KEY.to_string(), weight.to_string());
        }
        Some(ResolvedAddress { addr, metadata })
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Maximum number of outcomes kept in the window.
    pub window_size: usize,

    /// Maximum age of an outcome in seconds.
    pub window_secs: u64,

    /// Failure ratio at or above which the breaker opens (0.0 - 1.0).
    pub failure_ratio: f64,

    /// Minimum outcomes in the window before the ratio is considered.
    pub min_samples: usize,

    /// Keep one breaker per method instead of one per target.
    pub per_method: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            window_secs: 10,
            failure_ratio: 0.5,
            min_samples: 10,
            per_method: false,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Delay before the first probe in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for the exponential probe delay in milliseconds.
    pub max_delay_ms: u64,

    /// Timeout for a single probe in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            max_delay_ms: 30_000,
            timeout_ms: 1_000,
        }
    }
}

/// Which optional interceptors wrap each call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptorConfig {
    pub tracing: bool,
    pub metrics: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            tracing: true,
            metrics: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
