//! Core gateway orchestration service.
//!
//! `GatewayService` ties immutable configuration and the static route table
//! to the runtime state the gateway owns: the per-destination circuit
//! breaker and the injected registry handle. Both the proxy path and the
//! fan-out aggregators resolve destinations through this one place, so the
//! breaker gate and the registry lookup behave identically everywhere.
//!
//! The breaker map and registry handle are explicit fields rather than
//! ambient module state, so tests can run several isolated gateway
//! instances side by side.

use std::sync::Arc;

use crate::{
    config::models::GatewayConfig,
    core::{breaker::CircuitBreaker, error::GatewayError, routes::RouteTable},
    ports::registry::{ServiceRecord, ServiceRegistry},
};

pub struct GatewayService {
    config: Arc<GatewayConfig>,
    routes: RouteTable,
    breaker: CircuitBreaker,
    registry: Arc<dyn ServiceRegistry>,
}

impl GatewayService {
    pub fn new(
        config: Arc<GatewayConfig>,
        routes: RouteTable,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        let breaker = CircuitBreaker::new(
            config.breaker.failure_threshold,
            config.breaker.cooldown(),
        );
        Self {
            config,
            routes,
            breaker,
            registry,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn registry(&self) -> &Arc<dyn ServiceRegistry> {
        &self.registry
    }

    /// Resolve a destination for a call: circuit breaker gate first, then
    /// registry discovery. Neither step touches the destination itself.
    pub async fn resolve(&self, service: &str) -> Result<ServiceRecord, GatewayError> {
        if self.breaker.is_open(service).await {
            return Err(GatewayError::CircuitOpen {
                service: service.to_string(),
            });
        }
        Ok(self.registry.discover(service).await?)
    }

    /// Names currently present in the registry, healthy or not. Used to
    /// enrich 503 responses so callers can see what the gateway knows about.
    pub async fn known_services(&self) -> Vec<String> {
        match self.registry.list_services().await {
            Ok(services) => services.into_keys().collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to list services for diagnostics");
                Vec::new()
            }
        }
    }
}
