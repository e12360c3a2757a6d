use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by registry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    /// The service name was never registered.
    #[error("service not registered: {0}")]
    NotFound(String),

    /// The service is registered but currently failing health checks.
    #[error("service unavailable (failing health checks): {0}")]
    Unavailable(String),

    /// The backing document could not be read or written.
    #[error("registry storage error: {0}")]
    Storage(String),
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A single registered service, as persisted in the registry document.
///
/// Timestamps are epoch milliseconds and field names are camelCase on the
/// wire so that any process speaking the shared registry document format can
/// interoperate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    pub url: String,
    pub healthy: bool,
    pub registered_at: i64,
    pub last_health_check: i64,
    /// Identifier of the process instance that registered this record.
    /// Used only for self-cleanup on that process's shutdown.
    pub owner_process_id: String,
}

/// Input for a registration call. The store fills in the timestamps and
/// initial health itself.
#[derive(Debug, Clone)]
pub struct Registration {
    pub url: String,
    pub owner_process_id: String,
}

/// Read-only view of a record returned by `list_services`, with computed
/// uptime.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub url: String,
    pub healthy: bool,
    pub uptime_ms: i64,
    pub registered_at: i64,
    pub last_health_check: i64,
}

/// Aggregate registry counts.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// ServiceRegistry defines the port (interface) for the service discovery
/// store: who is running, where, and is it healthy.
///
/// At most one record exists per name; `register` overwrites (last writer
/// wins). Unhealthy records remain listable but are not resolvable through
/// `discover`.
#[async_trait]
pub trait ServiceRegistry: Send + Sync + 'static {
    /// Upsert a record for `name`, marking it healthy as of now.
    /// Overwriting an existing registration is not an error.
    async fn register(&self, name: &str, registration: Registration) -> RegistryResult<()>;

    /// Resolve a service for routing. Fails with `NotFound` if the name is
    /// absent and `Unavailable` if it is present but unhealthy.
    async fn discover(&self, name: &str) -> RegistryResult<ServiceRecord>;

    /// All records, healthy or not, with computed uptime.
    async fn list_services(&self) -> RegistryResult<BTreeMap<String, ServiceView>>;

    /// Remove a record if present. Returns whether anything was removed;
    /// idempotent.
    async fn unregister(&self, name: &str) -> RegistryResult<bool>;

    /// Set the health flag and stamp `last_health_check`. A no-op for
    /// unknown names.
    async fn mark_health(&self, name: &str, healthy: bool) -> RegistryResult<()>;

    /// Aggregate counts over all records.
    async fn stats(&self) -> RegistryResult<RegistryStats>;

    /// Remove every record registered by the given process instance.
    /// Invoked on that process's shutdown so a restart does not leave a
    /// stale "healthy" entry behind. Returns the number of records removed.
    async fn cleanup_owned_by(&self, owner_process_id: &str) -> RegistryResult<usize>;
}
