//! Fan-out aggregators: dashboard and global search.
//!
//! Both handlers issue several downstream calls concurrently through the
//! same breaker-gated resolution path as the proxy, then merge results so
//! one failed branch never fails the others. The merged response reports
//! each branch as `{available, data | error}`.

use std::sync::Arc;

use axum::body::Body;
use http::{HeaderMap, Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};

use crate::{
    adapters::http_handler::json_response,
    core::{error::GatewayError, gateway::GatewayService},
    ports::http_client::{HttpClient, HttpClientError},
};

pub struct Aggregator {
    gateway: Arc<GatewayService>,
    http_client: Arc<dyn HttpClient>,
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl Aggregator {
    pub fn new(gateway: Arc<GatewayService>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            gateway,
            http_client,
        }
    }

    /// One breaker-gated downstream call returning the parsed JSON body.
    ///
    /// Transport failures and 5xx responses are recorded as breaker
    /// failures; any completed response below 500 counts as a breaker
    /// success even when the branch itself reports an application error.
    async fn call(
        &self,
        service: &str,
        method: Method,
        path_and_query: &str,
        bearer: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let record = self.gateway.resolve(service).await?;
        let uri = format!("{}{}", record.url, path_and_query);

        let mut builder = Request::builder()
            .method(method)
            .uri(&uri)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = builder
            .body(Body::empty())
            .map_err(|err| GatewayError::Internal(format!("build request for {uri}: {err}")))?;

        let timeout = self.gateway.config().proxy.aggregate_timeout();
        let response = match self.http_client.send_request(req, timeout).await {
            Ok(response) => response,
            Err(HttpClientError::ConnectionError(reason)) => {
                self.gateway.breaker().record_failure(service).await;
                return Err(GatewayError::UpstreamUnreachable {
                    service: service.to_string(),
                    reason,
                });
            }
            Err(HttpClientError::Timeout(duration)) => {
                self.gateway.breaker().record_failure(service).await;
                return Err(GatewayError::UpstreamUnreachable {
                    service: service.to_string(),
                    reason: format!("timed out after {duration:?}"),
                });
            }
            Err(HttpClientError::InvalidRequest(reason)) => {
                return Err(GatewayError::Internal(reason));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.gateway.breaker().record_failure(service).await;
            return Err(GatewayError::UpstreamStatus {
                service: service.to_string(),
                status: status.as_u16(),
            });
        }
        self.gateway.breaker().record_success(service).await;

        if !status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                service: service.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|err| GatewayError::Internal(format!("read body from {service}: {err}")))?
            .to_bytes();
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| GatewayError::Internal(format!("parse body from {service}: {err}")))
    }

    fn branch(result: Result<Value, GatewayError>, service: &str) -> Value {
        match result {
            Ok(data) => json!({ "available": true, "data": data }),
            Err(err) => {
                tracing::warn!(service, error = %err, "aggregator branch failed");
                json!({ "available": false, "error": err.to_string() })
            }
        }
    }

    /// `GET /api/dashboard`: validate the bearer token, then fetch the
    /// caller's profile, an item sample, and their lists concurrently.
    /// Always 200 once the token is accepted.
    pub async fn dashboard(&self, headers: &HeaderMap) -> Response<Body> {
        let Some(token) = bearer_token(headers) else {
            return json_response(
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": "Authorization token required" }),
            );
        };

        let validated = match self
            .call("user-service", Method::POST, "/auth/validate", Some(token))
            .await
        {
            Ok(validated) => validated,
            Err(err) => {
                tracing::warn!(error = %err, "dashboard token validation failed");
                return json_response(
                    StatusCode::UNAUTHORIZED,
                    json!({ "success": false, "message": "Invalid or expired token" }),
                );
            }
        };
        let user_id = extract_user_id(&validated);

        let user_path = format!("/users/{user_id}");
        let (user, items, lists) = tokio::join!(
            self.call("user-service", Method::GET, &user_path, Some(token)),
            self.call("item-service", Method::GET, "/items?limit=5", None),
            self.call("list-service", Method::GET, "/lists", Some(token)),
        );

        json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "data": {
                    "user": Self::branch(user, "user-service"),
                    "items": Self::branch(items, "item-service"),
                    "lists": Self::branch(lists, "list-service"),
                },
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }

    /// `GET /api/search?q=<term>`: always searches the item catalog;
    /// searches lists too when a bearer token is present. A missing query
    /// parameter fails with 400 before any downstream call.
    pub async fn search(&self, raw_query: Option<&str>, headers: &HeaderMap) -> Response<Body> {
        let Some(raw_query) = raw_query.filter(|raw| query_param(raw, "q").is_some()) else {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Search query parameter 'q' is required" }),
            );
        };
        let encoded_term = query_param(raw_query, "q").unwrap_or_default();
        let term = urlencoding::decode(encoded_term)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| encoded_term.to_string());

        let token = bearer_token(headers);
        let items_path = format!("/search?{raw_query}");

        let mut results = serde_json::Map::new();
        if let Some(token) = token {
            let (items, lists) = tokio::join!(
                self.call("item-service", Method::GET, &items_path, None),
                self.call("list-service", Method::GET, &items_path, Some(token)),
            );
            results.insert("items".to_string(), Self::branch(items, "item-service"));
            results.insert("lists".to_string(), Self::branch(lists, "list-service"));
        } else {
            let items = self.call("item-service", Method::GET, &items_path, None).await;
            results.insert("items".to_string(), Self::branch(items, "item-service"));
        }

        json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "query": term,
                "results": Value::Object(results),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }
}

/// Pull the caller's id out of a validation response. The user service
/// nests it under `data.user.id` in current versions and `user.id` in
/// older ones; fall back to the self-referential alias otherwise.
fn extract_user_id(validated: &Value) -> String {
    ["/data/user/id", "/user/id"]
        .iter()
        .find_map(|pointer| {
            let value = validated.pointer(pointer)?;
            value
                .as_str()
                .map(str::to_string)
                .or_else(|| value.as_i64().map(|id| id.to_string()))
        })
        .unwrap_or_else(|| "me".to_string())
}

/// Find a parameter's raw (still percent-encoded) value in a query string.
fn query_param<'a>(raw_query: &'a str, name: &str) -> Option<&'a str> {
    raw_query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_the_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn user_id_extraction_prefers_the_nested_shape() {
        let nested = json!({ "data": { "user": { "id": "u-1" } } });
        assert_eq!(extract_user_id(&nested), "u-1");

        let flat = json!({ "user": { "id": 42 } });
        assert_eq!(extract_user_id(&flat), "42");

        let unknown = json!({ "valid": true });
        assert_eq!(extract_user_id(&unknown), "me");
    }

    #[test]
    fn query_param_finds_the_raw_encoded_value() {
        assert_eq!(query_param("q=arroz", "q"), Some("arroz"));
        assert_eq!(query_param("limit=5&q=caf%C3%A9", "q"), Some("caf%C3%A9"));
        assert_eq!(query_param("q=", "q"), None);
        assert_eq!(query_param("query=arroz", "q"), None);
    }
}
