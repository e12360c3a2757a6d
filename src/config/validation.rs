use std::net::SocketAddr;

use thiserror::Error;

use crate::config::models::GatewayConfig;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid listen address '{0}' (expected host:port, e.g. '127.0.0.1:3000')")]
    InvalidListenAddr(String),
    #[error("registry_path must not be empty")]
    EmptyRegistryPath,
    #[error("breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,
    #[error("{0} must be at least 1 second")]
    ZeroDuration(&'static str),
    #[error("health_probe.path must start with '/'")]
    InvalidProbePath,
}

pub type ValidationResult = Result<(), ValidationError>;

/// Startup validation for a loaded configuration. A config that fails here
/// is fatal; nothing is ever re-validated per request.
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    pub fn validate(config: &GatewayConfig) -> ValidationResult {
        if config.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddr(
                config.listen_addr.clone(),
            ));
        }
        if config.registry_path.trim().is_empty() {
            return Err(ValidationError::EmptyRegistryPath);
        }
        if config.breaker.failure_threshold == 0 {
            return Err(ValidationError::ZeroFailureThreshold);
        }
        if config.breaker.cooldown_secs == 0 {
            return Err(ValidationError::ZeroDuration("breaker.cooldown_secs"));
        }
        if config.proxy.timeout_secs == 0 {
            return Err(ValidationError::ZeroDuration("proxy.timeout_secs"));
        }
        if config.proxy.aggregate_timeout_secs == 0 {
            return Err(ValidationError::ZeroDuration("proxy.aggregate_timeout_secs"));
        }
        if config.health_probe.interval_secs == 0 {
            return Err(ValidationError::ZeroDuration("health_probe.interval_secs"));
        }
        if config.health_probe.timeout_secs == 0 {
            return Err(ValidationError::ZeroDuration("health_probe.timeout_secs"));
        }
        if !config.health_probe.path.starts_with('/') {
            return Err(ValidationError::InvalidProbePath);
        }
        Ok(())
    }
}
