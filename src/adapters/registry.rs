//! File-backed service registry.
//!
//! The whole registry is one JSON document keyed by service name. Every
//! mutation reads the full document, applies the change in memory, and
//! rewrites the full document; there are no partial patches and no
//! cross-process locking. Sequential calls from one process are therefore
//! consistent, but two processes mutating concurrently race at
//! whole-document granularity and the last writer wins. That race is a
//! known property of this store, acceptable because each service name has
//! exactly one registrar; do not rely on this store for multi-writer
//! coordination.

use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use eyre::{Result, WrapErr};

use crate::ports::registry::{
    Registration, RegistryError, RegistryResult, RegistryStats, ServiceRecord, ServiceRegistry,
    ServiceView,
};

pub struct FileRegistry {
    path: PathBuf,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl FileRegistry {
    /// Open a registry at `path`, verifying that an existing document is
    /// readable. A corrupt document at startup is fatal; a missing file is
    /// simply an empty registry.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let registry = Self { path: path.into() };
        registry
            .load_document()
            .await
            .wrap_err_with(|| format!("unreadable registry document at {}", registry.path.display()))?;
        Ok(registry)
    }

    async fn load_document(&self) -> Result<BTreeMap<String, ServiceRecord>, RegistryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(RegistryError::Storage(format!(
                    "read {}: {err}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| {
            RegistryError::Storage(format!("parse {}: {err}", self.path.display()))
        })
    }

    async fn store_document(
        &self,
        document: &BTreeMap<String, ServiceRecord>,
    ) -> Result<(), RegistryError> {
        let raw = serde_json::to_string_pretty(document)
            .map_err(|err| RegistryError::Storage(format!("serialize registry: {err}")))?;
        tokio::fs::write(&self.path, raw).await.map_err(|err| {
            RegistryError::Storage(format!("write {}: {err}", self.path.display()))
        })
    }
}

#[async_trait]
impl ServiceRegistry for FileRegistry {
    async fn register(&self, name: &str, registration: Registration) -> RegistryResult<()> {
        let mut document = self.load_document().await?;
        let now = now_ms();
        let previous = document.insert(
            name.to_string(),
            ServiceRecord {
                name: name.to_string(),
                url: registration.url,
                healthy: true,
                registered_at: now,
                last_health_check: now,
                owner_process_id: registration.owner_process_id,
            },
        );
        self.store_document(&document).await?;

        if previous.is_some() {
            tracing::info!(service = name, "re-registered service (record overwritten)");
        } else {
            tracing::info!(service = name, "registered service");
        }
        Ok(())
    }

    async fn discover(&self, name: &str) -> RegistryResult<ServiceRecord> {
        let document = self.load_document().await?;
        let record = document
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if !record.healthy {
            return Err(RegistryError::Unavailable(name.to_string()));
        }
        Ok(record.clone())
    }

    async fn list_services(&self) -> RegistryResult<BTreeMap<String, ServiceView>> {
        let document = self.load_document().await?;
        let now = now_ms();
        Ok(document
            .into_iter()
            .map(|(name, record)| {
                let view = ServiceView {
                    url: record.url,
                    healthy: record.healthy,
                    uptime_ms: (now - record.registered_at).max(0),
                    registered_at: record.registered_at,
                    last_health_check: record.last_health_check,
                };
                (name, view)
            })
            .collect())
    }

    async fn unregister(&self, name: &str) -> RegistryResult<bool> {
        let mut document = self.load_document().await?;
        let removed = document.remove(name).is_some();
        if removed {
            self.store_document(&document).await?;
            tracing::info!(service = name, "unregistered service");
        }
        Ok(removed)
    }

    async fn mark_health(&self, name: &str, healthy: bool) -> RegistryResult<()> {
        let mut document = self.load_document().await?;
        let Some(record) = document.get_mut(name) else {
            return Ok(());
        };
        if record.healthy != healthy {
            tracing::info!(service = name, healthy, "service health changed");
        }
        record.healthy = healthy;
        record.last_health_check = now_ms();
        self.store_document(&document).await
    }

    async fn stats(&self) -> RegistryResult<RegistryStats> {
        let document = self.load_document().await?;
        let healthy = document.values().filter(|record| record.healthy).count();
        Ok(RegistryStats {
            total: document.len(),
            healthy,
            unhealthy: document.len() - healthy,
        })
    }

    async fn cleanup_owned_by(&self, owner_process_id: &str) -> RegistryResult<usize> {
        let mut document = self.load_document().await?;
        let before = document.len();
        document.retain(|_, record| record.owner_process_id != owner_process_id);
        let removed = before - document.len();
        if removed > 0 {
            self.store_document(&document).await?;
            tracing::info!(owner = owner_process_id, removed, "cleaned up owned records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    async fn open_registry(dir: &tempfile::TempDir) -> FileRegistry {
        FileRegistry::open(dir.path().join("registry.json"))
            .await
            .unwrap()
    }

    fn registration(url: &str) -> Registration {
        Registration {
            url: url.to_string(),
            owner_process_id: "test-owner".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_list_round_trip() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register("item-service", registration("http://localhost:3002"))
            .await
            .unwrap();

        let services = registry.list_services().await.unwrap();
        let view = services.get("item-service").unwrap();
        assert_eq!(view.url, "http://localhost:3002");
        assert!(view.healthy);
        assert!(view.uptime_ms >= 0);
    }

    #[tokio::test]
    async fn discover_unknown_name_is_not_found() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        let err = registry.discover("nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn discover_refuses_unhealthy_records() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register("item-service", registration("http://localhost:3002"))
            .await
            .unwrap();
        registry.mark_health("item-service", false).await.unwrap();

        let err = registry.discover("item-service").await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));

        // Still listable, just not resolvable.
        let services = registry.list_services().await.unwrap();
        assert!(!services.get("item-service").unwrap().healthy);
    }

    #[tokio::test]
    async fn register_overwrites_existing_record() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register("item-service", registration("http://localhost:3002"))
            .await
            .unwrap();
        registry.mark_health("item-service", false).await.unwrap();
        registry
            .register("item-service", registration("http://localhost:4002"))
            .await
            .unwrap();

        // Last register wins and resets health.
        let record = registry.discover("item-service").await.unwrap();
        assert_eq!(record.url, "http://localhost:4002");
        assert!(record.healthy);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register("list-service", registration("http://localhost:3003"))
            .await
            .unwrap();

        assert!(registry.unregister("list-service").await.unwrap());
        assert!(!registry.unregister("list-service").await.unwrap());
    }

    #[tokio::test]
    async fn mark_health_is_a_noop_for_unknown_names() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry.mark_health("ghost", false).await.unwrap();
        assert_eq!(registry.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn stats_count_health_buckets() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register("user-service", registration("http://localhost:3001"))
            .await
            .unwrap();
        registry
            .register("item-service", registration("http://localhost:3002"))
            .await
            .unwrap();
        registry.mark_health("item-service", false).await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.healthy, 1);
        assert_eq!(stats.unhealthy, 1);
    }

    #[tokio::test]
    async fn cleanup_removes_only_owned_records() {
        let dir = tempdir().unwrap();
        let registry = open_registry(&dir).await;

        registry
            .register(
                "user-service",
                Registration {
                    url: "http://localhost:3001".to_string(),
                    owner_process_id: "proc-a".to_string(),
                },
            )
            .await
            .unwrap();
        registry
            .register(
                "item-service",
                Registration {
                    url: "http://localhost:3002".to_string(),
                    owner_process_id: "proc-b".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(registry.cleanup_owned_by("proc-a").await.unwrap(), 1);

        let services = registry.list_services().await.unwrap();
        assert!(!services.contains_key("user-service"));
        assert!(services.contains_key("item-service"));
    }

    #[tokio::test]
    async fn document_persists_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let first = FileRegistry::open(&path).await.unwrap();
        first
            .register("user-service", registration("http://localhost:3001"))
            .await
            .unwrap();

        let second = FileRegistry::open(&path).await.unwrap();
        let record = second.discover("user-service").await.unwrap();
        assert_eq!(record.url, "http://localhost:3001");
    }

    #[tokio::test]
    async fn corrupt_document_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(FileRegistry::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn persisted_document_uses_camel_case_and_epoch_millis() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let registry = FileRegistry::open(&path).await.unwrap();

        registry
            .register("item-service", registration("http://localhost:3002"))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &doc["item-service"];
        assert!(record["registeredAt"].is_i64());
        assert!(record["lastHealthCheck"].is_i64());
        assert_eq!(record["ownerProcessId"], "test-owner");
    }
}
