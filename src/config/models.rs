//! Configuration data structures for the gateway.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files.
//! They are serde-friendly and carry defaults matching the gateway's fixed
//! policy constants, so a minimal config only needs a listen address.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Address the gateway listens on, e.g. "127.0.0.1:3000".
    pub listen_addr: String,
    /// URL advertised when the gateway registers itself in the registry.
    /// Defaults to `http://<listen_addr>`.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Path of the shared registry document.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,
    #[serde(default)]
    pub health_probe: ProbeConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl GatewayConfig {
    /// The URL other processes should use to reach this gateway.
    pub fn advertised_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            public_url: None,
            registry_path: default_registry_path(),
            health_probe: ProbeConfig::default(),
            breaker: BreakerConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

fn default_registry_path() -> String {
    "./registry.json".to_string()
}

/// Health prober schedule and probe parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    /// Seconds between probe cycles.
    pub interval_secs: u64,
    /// Seconds after startup before the first cycle.
    pub initial_delay_secs: u64,
    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,
    /// Path probed on each registered service.
    pub path: String,
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            initial_delay_secs: 5,
            timeout_secs: 5,
            path: "/health".to_string(),
        }
    }
}

/// Circuit breaker policy. The defaults are the gateway's fixed policy:
/// open after 3 consecutive failures, half-open after a 30 second cooldown.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
        }
    }
}

/// Timeouts for relayed and aggregated downstream calls.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// Timeout for proxied calls, in seconds.
    pub timeout_secs: u64,
    /// Timeout for each aggregator sub-call, in seconds.
    pub aggregate_timeout_secs: u64,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            aggregate_timeout_secs: 5,
        }
    }
}
