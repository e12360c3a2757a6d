//! Pantry Gateway - the request gateway in front of the shopping-list services.
//!
//! The gateway owns routing, failure isolation, and discovery for a set of
//! independently deployed HTTP services (user, item catalog, list). It is
//! built around a **hexagonal architecture**:
//!
//! - `core` holds the pure logic: the static route table, the
//!   per-destination circuit breaker, and the `GatewayService` that ties
//!   them to the registry.
//! - `ports` defines the traits at the I/O seams (`ServiceRegistry`,
//!   `HttpClient`) so tests can substitute scripted implementations.
//! - `adapters` implements those ports (JSON-file registry, hyper-based
//!   client) plus the inbound HTTP surface: proxying, the fan-out
//!   aggregators, and the background health prober.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use pantry_gateway::{
//!     FileRegistry, GatewayService, HttpClientAdapter, HttpHandler,
//!     config::GatewayConfig, core::RouteTable, ports::registry::ServiceRegistry,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = Arc::new(GatewayConfig::default());
//! let registry: Arc<dyn ServiceRegistry> =
//!     Arc::new(FileRegistry::open(&config.registry_path).await?);
//! let gateway = Arc::new(GatewayService::new(config, RouteTable::standard(), registry));
//! let handler = HttpHandler::new(gateway, Arc::new(HttpClientAdapter::new()?));
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Fallible APIs return `eyre::Result<T>` at the binary seam and domain
//! specific error types (`RegistryError`, `GatewayError`) inside the core.
//!
//! # Concurrency & Data Structures
//! The circuit breaker map uses `scc::HashMap` for shared mutable state
//! under contention; the registry document is shared via plain
//! whole-document reads and rewrites (see `adapters::registry`).

pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{
        aggregator::Aggregator, health_prober::HealthProber, http_client::HttpClientAdapter,
        http_handler::HttpHandler, registry::FileRegistry,
    },
    core::{CircuitBreaker, GatewayService, RouteTable},
    ports::{http_client::HttpClient, registry::ServiceRegistry},
    utils::graceful_shutdown::GracefulShutdown,
};
