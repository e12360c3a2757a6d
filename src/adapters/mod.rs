pub mod aggregator;
pub mod health_prober;
pub mod http_client;
pub mod http_handler;
pub mod registry;
