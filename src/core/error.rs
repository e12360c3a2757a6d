use axum::http::StatusCode;
use thiserror::Error;

use crate::ports::registry::RegistryError;

/// Gateway-side failures for a single resolved call to a destination
/// service. Each variant maps to an HTTP status for gateway-originated
/// responses; downstream application errors (< 500) are relayed verbatim
/// instead and never appear here.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The circuit breaker rejected the call before any network activity.
    #[error("circuit open for {service}")]
    CircuitOpen { service: String },

    /// Discovery failed: unknown name or registered-but-unhealthy.
    #[error(transparent)]
    Discovery(#[from] RegistryError),

    /// Connection refused, reset, or timed out before a response arrived.
    #[error("upstream {service} unreachable: {reason}")]
    UpstreamUnreachable { service: String, reason: String },

    /// The destination answered with a non-2xx status. Transport worked,
    /// so this is not a breaker failure unless the status is >= 500.
    #[error("upstream {service} returned status {status}")]
    UpstreamStatus { service: String, status: u16 },

    /// Missing bearer token at an aggregator boundary.
    #[error("authorization required")]
    AuthRequired,

    /// The bearer token was rejected by the user service.
    #[error("authorization rejected")]
    AuthInvalid,

    /// Missing or malformed request parameter.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected failure inside gateway logic. Detail is logged, never
    /// leaked to the caller.
    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for a gateway-originated error response.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CircuitOpen { .. } | Self::UpstreamUnreachable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Discovery(RegistryError::NotFound(_) | RegistryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Discovery(RegistryError::Storage(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::AuthRequired | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code included in gateway error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::Discovery(RegistryError::NotFound(_)) => "DISCOVERY_NOT_FOUND",
            Self::Discovery(RegistryError::Unavailable(_)) => "DISCOVERY_UNAVAILABLE",
            Self::Discovery(RegistryError::Storage(_)) => "REGISTRY_STORAGE",
            Self::UpstreamUnreachable { .. } => "UPSTREAM_UNREACHABLE",
            Self::UpstreamStatus { .. } => "UPSTREAM_ERROR",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthInvalid => "AUTH_INVALID",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_errors_surface_as_503() {
        let err = GatewayError::from(RegistryError::NotFound("nope".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "DISCOVERY_NOT_FOUND");

        let err = GatewayError::from(RegistryError::Unavailable("item-service".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "DISCOVERY_UNAVAILABLE");
    }

    #[test]
    fn auth_errors_surface_as_401() {
        assert_eq!(GatewayError::AuthRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::AuthInvalid.status(), StatusCode::UNAUTHORIZED);
    }
}
