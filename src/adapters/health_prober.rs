//! Background health prober.
//!
//! Periodically probes every registered service's health endpoint and
//! records the result in the registry. Proxying consults the recorded
//! flag only; no probe ever happens on the request path.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::{
    config::ProbeConfig,
    ports::{http_client::HttpClient, registry::ServiceRegistry},
};

pub struct HealthProber {
    registry: Arc<dyn ServiceRegistry>,
    http_client: Arc<dyn HttpClient>,
    config: ProbeConfig,
}

impl HealthProber {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        http_client: Arc<dyn HttpClient>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            registry,
            http_client,
            config,
        }
    }

    /// Run the probe loop until the owning task is aborted.
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            initial_delay_secs = self.config.initial_delay_secs,
            "health prober started"
        );
        tokio::time::sleep(self.config.initial_delay()).await;
        loop {
            self.probe_cycle().await;
            tokio::time::sleep(self.config.interval()).await;
        }
    }

    /// Probe every registered service once, concurrently.
    pub async fn probe_cycle(&self) {
        let services = match self.registry.list_services().await {
            Ok(services) => services,
            Err(err) => {
                tracing::warn!(error = %err, "skipping probe cycle, registry unreadable");
                return;
            }
        };

        let probes = services
            .into_iter()
            .map(|(name, view)| self.probe_one(name, view.url));
        join_all(probes).await;
    }

    async fn probe_one(&self, name: String, url: String) {
        let probe_url = format!("{}{}", url, self.config.path);
        let result = self
            .http_client
            .health_check(&probe_url, self.config.timeout())
            .await;

        let healthy = matches!(result, Ok(true));
        match &result {
            Ok(true) => tracing::debug!(service = %name, "probe ok"),
            Ok(false) => tracing::warn!(service = %name, url = %probe_url, "probe failed"),
            Err(err) => tracing::warn!(service = %name, url = %probe_url, error = %err, "probe error"),
        }

        if let Err(err) = self.registry.mark_health(&name, healthy).await {
            tracing::warn!(service = %name, error = %err, "failed to record probe result");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use axum::body::Body;
    use hyper::{Request, Response};
    use tempfile::tempdir;

    use super::*;
    use crate::{
        adapters::registry::FileRegistry,
        ports::{
            http_client::{HttpClientError, HttpClientResult},
            registry::Registration,
        },
    };

    /// Scripted client: maps probe urls to outcomes and records calls.
    struct MockHttpClient {
        outcomes: HashMap<String, HttpClientResult<bool>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        fn new(outcomes: HashMap<String, HttpClientResult<bool>>) -> Self {
            Self {
                outcomes,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn send_request(
            &self,
            _req: Request<Body>,
            _timeout: Duration,
        ) -> HttpClientResult<Response<Body>> {
            Err(HttpClientError::InvalidRequest("not scripted".to_string()))
        }

        async fn health_check(&self, url: &str, _timeout: Duration) -> HttpClientResult<bool> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.outcomes.get(url) {
                Some(Ok(healthy)) => Ok(*healthy),
                Some(Err(HttpClientError::Timeout(d))) => Err(HttpClientError::Timeout(*d)),
                Some(Err(_)) | None => Ok(false),
            }
        }
    }

    async fn seeded_registry(dir: &tempfile::TempDir) -> Arc<FileRegistry> {
        let registry = FileRegistry::open(dir.path().join("registry.json"))
            .await
            .unwrap();
        registry
            .register(
                "user-service",
                Registration {
                    url: "http://localhost:3001".to_string(),
                    owner_process_id: "test".to_string(),
                },
            )
            .await
            .unwrap();
        registry
            .register(
                "item-service",
                Registration {
                    url: "http://localhost:3002".to_string(),
                    owner_process_id: "test".to_string(),
                },
            )
            .await
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn cycle_marks_each_service_from_its_probe() {
        let dir = tempdir().unwrap();
        let registry = seeded_registry(&dir).await;

        let mut outcomes = HashMap::new();
        outcomes.insert("http://localhost:3001/health".to_string(), Ok(true));
        outcomes.insert("http://localhost:3002/health".to_string(), Ok(false));
        let client = Arc::new(MockHttpClient::new(outcomes));

        let prober = HealthProber::new(registry.clone(), client.clone(), ProbeConfig::default());
        prober.probe_cycle().await;

        let services = registry.list_services().await.unwrap();
        assert!(services["user-service"].healthy);
        assert!(!services["item-service"].healthy);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn probe_timeout_counts_as_unhealthy() {
        let dir = tempdir().unwrap();
        let registry = seeded_registry(&dir).await;
        registry.unregister("item-service").await.unwrap();

        let mut outcomes = HashMap::new();
        outcomes.insert(
            "http://localhost:3001/health".to_string(),
            Err(HttpClientError::Timeout(Duration::from_secs(5))),
        );
        let client = Arc::new(MockHttpClient::new(outcomes));

        let prober = HealthProber::new(registry.clone(), client, ProbeConfig::default());
        prober.probe_cycle().await;

        let services = registry.list_services().await.unwrap();
        assert!(!services["user-service"].healthy);
    }

    #[tokio::test]
    async fn recovery_flips_the_flag_back() {
        let dir = tempdir().unwrap();
        let registry = seeded_registry(&dir).await;
        registry.unregister("item-service").await.unwrap();
        registry.mark_health("user-service", false).await.unwrap();

        let mut outcomes = HashMap::new();
        outcomes.insert("http://localhost:3001/health".to_string(), Ok(true));
        let client = Arc::new(MockHttpClient::new(outcomes));

        let prober = HealthProber::new(registry.clone(), client, ProbeConfig::default());
        prober.probe_cycle().await;

        let services = registry.list_services().await.unwrap();
        assert!(services["user-service"].healthy);
    }

    #[tokio::test]
    async fn empty_registry_is_a_quiet_cycle() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(
            FileRegistry::open(dir.path().join("registry.json"))
                .await
                .unwrap(),
        );
        let client = Arc::new(MockHttpClient::new(HashMap::new()));

        let prober = HealthProber::new(registry, client.clone(), ProbeConfig::default());
        prober.probe_cycle().await;

        assert!(client.calls.lock().unwrap().is_empty());
    }
}
