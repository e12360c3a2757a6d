//! Inbound request handling: dispatch, gateway endpoints, and the proxy.

use std::sync::Arc;

use axum::body::Body;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};

use crate::{
    adapters::aggregator::Aggregator,
    core::{error::GatewayError, gateway::GatewayService},
    ports::{
        http_client::{HttpClient, HttpClientError},
        registry::RegistryError,
    },
};

const GATEWAY_NAME: &str = "pantry-gateway";
const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a JSON response. Serialization of a `serde_json::Value` cannot
/// fail, so this stays infallible for handler ergonomics.
pub(crate) fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

pub struct HttpHandler {
    gateway: Arc<GatewayService>,
    http_client: Arc<dyn HttpClient>,
    aggregator: Aggregator,
}

impl HttpHandler {
    pub fn new(gateway: Arc<GatewayService>, http_client: Arc<dyn HttpClient>) -> Self {
        let aggregator = Aggregator::new(gateway.clone(), http_client.clone());
        Self {
            gateway,
            http_client,
            aggregator,
        }
    }

    /// Entry point for every inbound request. Never returns `Err` for a
    /// per-request failure; the error path exists for infrastructure-level
    /// surprises only.
    pub async fn handle_request(&self, req: Request<Body>) -> eyre::Result<Response<Body>> {
        let path = req.uri().path().to_string();
        let mut response = self.dispatch(req, &path).await;
        Self::add_identity_headers(&mut response);
        Ok(response)
    }

    fn add_identity_headers(response: &mut Response<Body>) {
        let headers = response.headers_mut();
        headers.insert("x-gateway", HeaderValue::from_static(GATEWAY_NAME));
        headers.insert("x-gateway-version", HeaderValue::from_static(GATEWAY_VERSION));
    }

    async fn dispatch(&self, req: Request<Body>, path: &str) -> Response<Body> {
        match path {
            "/health" => self.handle_health().await,
            "/" => self.handle_root(),
            "/registry" => self.handle_registry(false).await,
            "/debug/services" => self.handle_registry(true).await,
            "/api/dashboard" => self.aggregator.dashboard(req.headers()).await,
            "/api/search" => {
                let raw_query = req.uri().query().map(str::to_string);
                self.aggregator.search(raw_query.as_deref(), req.headers()).await
            }
            _ if path.starts_with("/api/") => self.handle_proxy(req, path).await,
            _ => json_response(
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": format!("No route for {path}") }),
            ),
        }
    }

    /// Aggregate gateway health: always 200, the registry snapshot tells
    /// the caller which downstream services are degraded.
    async fn handle_health(&self) -> Response<Body> {
        let registry = self.gateway.registry();
        let services = registry.list_services().await.unwrap_or_default();
        let stats = match registry.stats().await {
            Ok(stats) => json!({
                "total": stats.total,
                "healthy": stats.healthy,
                "unhealthy": stats.unhealthy,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "registry stats unavailable");
                Value::Null
            }
        };

        json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "status": "ok",
                "gateway": { "name": GATEWAY_NAME, "version": GATEWAY_VERSION },
                "services": services,
                "stats": stats,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }

    fn handle_root(&self) -> Response<Body> {
        json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "name": GATEWAY_NAME,
                "version": GATEWAY_VERSION,
                "endpoints": {
                    "health": "GET /health",
                    "registry": "GET /registry",
                    "dashboard": "GET /api/dashboard",
                    "search": "GET /api/search?q=<term>",
                    "auth": "ANY /api/auth/*",
                    "users": "ANY /api/users/*",
                    "items": "ANY /api/items/*",
                    "lists": "ANY /api/lists/*",
                },
            }),
        )
    }

    async fn handle_registry(&self, debug: bool) -> Response<Body> {
        let services = match self.gateway.registry().list_services().await {
            Ok(services) => services,
            Err(err) => {
                tracing::error!(error = %err, "failed to read registry");
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Registry unavailable" }),
                );
            }
        };
        if debug {
            tracing::debug!(count = services.len(), services = ?services.keys(), "registry snapshot requested");
        }

        json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "services": services,
                "count": services.len(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }

    /// Relay one `/api/*` request to its destination service.
    async fn handle_proxy(&self, req: Request<Body>, path: &str) -> Response<Body> {
        let Some(rule) = self.gateway.routes().resolve(path) else {
            return json_response(
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": format!("No route for {path}") }),
            );
        };
        let service = rule.service.clone();

        let record = match self.gateway.resolve(&service).await {
            Ok(record) => record,
            Err(err) => return self.destination_error(&service, err).await,
        };

        let rewritten = rule.rewrite(path);
        let uri = match req.uri().query() {
            Some(query) => format!("{}{}?{}", record.url, rewritten, query),
            None => format!("{}{}", record.url, rewritten),
        };

        let (parts, body) = req.into_parts();
        let mut builder = Request::builder().method(parts.method.clone()).uri(&uri);
        for (name, value) in &parts.headers {
            // Host must match the new authority; content-length is
            // recomputed by the client from the actual body.
            if name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            builder = builder.header(name, value);
        }
        let forwarded_body = match parts.method {
            Method::POST | Method::PUT | Method::PATCH => body,
            _ => Body::empty(),
        };
        let downstream_req = match builder.body(forwarded_body) {
            Ok(downstream_req) => downstream_req,
            Err(err) => {
                tracing::error!(error = %err, uri = %uri, "failed to build downstream request");
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Gateway error" }),
                );
            }
        };

        let timeout = self.gateway.config().proxy.timeout();
        match self.http_client.send_request(downstream_req, timeout).await {
            Ok(response) => {
                // Any completed exchange below 500 is transport-layer
                // success, 4xx application errors included.
                if response.status().is_server_error() {
                    self.gateway.breaker().record_failure(&service).await;
                } else {
                    self.gateway.breaker().record_success(&service).await;
                }
                response
            }
            Err(HttpClientError::ConnectionError(reason)) => {
                self.gateway.breaker().record_failure(&service).await;
                self.destination_error(
                    &service,
                    GatewayError::UpstreamUnreachable {
                        service: service.clone(),
                        reason,
                    },
                )
                .await
            }
            Err(HttpClientError::Timeout(duration)) => {
                self.gateway.breaker().record_failure(&service).await;
                self.destination_error(
                    &service,
                    GatewayError::UpstreamUnreachable {
                        service: service.clone(),
                        reason: format!("timed out after {duration:?}"),
                    },
                )
                .await
            }
            Err(HttpClientError::InvalidRequest(reason)) => {
                tracing::error!(service = %service, reason = %reason, "invalid downstream request");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Gateway error" }),
                )
            }
        }
    }

    /// Gateway-originated error envelope for a failed destination. The
    /// 503 family carries the known-service list for debugging.
    async fn destination_error(&self, service: &str, err: GatewayError) -> Response<Body> {
        let status = err.status();
        tracing::warn!(service, error = %err, status = %status, "destination unavailable");

        let mut body = json!({
            "success": false,
            "message": err.to_string(),
            "service": service,
            "error": err.code(),
        });
        if status == StatusCode::SERVICE_UNAVAILABLE
            && !matches!(err, GatewayError::CircuitOpen { .. })
        {
            body["knownServices"] = json!(self.gateway.known_services().await);
        }
        if matches!(err, GatewayError::Discovery(RegistryError::Storage(_))) {
            // Storage detail stays in the log.
            body["message"] = json!("Registry unavailable");
        }
        json_response(status, body)
    }
}
