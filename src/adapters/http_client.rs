//! Outbound HTTP client built on hyper's connection pool.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use eyre::Result;
use http::{Request, Response, Uri, Version, header};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Pooled client for proxying and health probing. Downstream services are
/// plain HTTP in development, but the connector also accepts HTTPS so a
/// registry entry may point at a TLS endpoint.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HttpClientAdapter {
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();
        for cert in native_certs.certs {
            if root_cert_store.add(cert).is_err() {
                tracing::warn!("failed to add native certificate to rustls root store");
            }
        }
        if !native_certs.errors.is_empty() {
            tracing::warn!(errors = ?native_certs.errors, "some native certificates failed to load");
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Body>(https_connector);
        Ok(Self { client })
    }

    fn prepare(mut req: Request<Body>) -> HttpClientResult<Request<Body>> {
        // hyper requires the Host header to match the target authority,
        // not whatever the original caller sent.
        let host = req
            .uri()
            .authority()
            .map(|authority| authority.to_string())
            .ok_or_else(|| {
                HttpClientError::InvalidRequest(format!("missing authority in uri {}", req.uri()))
            })?;
        let host_value = header::HeaderValue::from_str(&host)
            .map_err(|err| HttpClientError::InvalidRequest(format!("bad host '{host}': {err}")))?;
        req.headers_mut().insert(header::HOST, host_value);
        *req.version_mut() = Version::HTTP_11;
        Ok(req)
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        req: Request<Body>,
        timeout: Duration,
    ) -> HttpClientResult<Response<Body>> {
        let req = Self::prepare(req)?;

        let response = tokio::time::timeout(timeout, self.client.request(req))
            .await
            .map_err(|_| HttpClientError::Timeout(timeout))?
            .map_err(|err| HttpClientError::ConnectionError(err.to_string()))?;

        let (mut parts, body) = response.into_parts();
        // The hop-by-hop framing is re-established on the inbound side.
        parts.headers.remove(header::TRANSFER_ENCODING);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    async fn health_check(&self, url: &str, timeout: Duration) -> HttpClientResult<bool> {
        let uri: Uri = url
            .parse()
            .map_err(|err| HttpClientError::InvalidRequest(format!("bad url '{url}': {err}")))?;

        let req = Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|err| HttpClientError::InvalidRequest(err.to_string()))?;
        let req = Self::prepare(req)?;

        match tokio::time::timeout(timeout, self.client.request(req)).await {
            Ok(Ok(response)) => Ok(response.status().is_success()),
            Ok(Err(_)) => Ok(false),
            Err(_) => Err(HttpClientError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_sets_host_from_authority() {
        let req = Request::builder()
            .uri("http://localhost:3002/items")
            .header(header::HOST, "gateway.internal")
            .body(Body::empty())
            .unwrap();

        let prepared = HttpClientAdapter::prepare(req).unwrap();
        assert_eq!(prepared.headers()[header::HOST], "localhost:3002");
        assert_eq!(prepared.version(), Version::HTTP_11);
    }

    #[test]
    fn prepare_rejects_relative_uris() {
        let req = Request::builder()
            .uri("/items")
            .body(Body::empty())
            .unwrap();

        assert!(matches!(
            HttpClientAdapter::prepare(req),
            Err(HttpClientError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_as_unhealthy() {
        let client = HttpClientAdapter::new().unwrap();
        // Bind then drop a listener so the port is known-closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let healthy = client
            .health_check(
                &format!("http://127.0.0.1:{port}/health"),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(!healthy);
    }
}
