pub mod breaker;
pub mod error;
pub mod gateway;
pub mod routes;

pub use breaker::CircuitBreaker;
pub use error::GatewayError;
pub use gateway::GatewayService;
pub use routes::{RouteRule, RouteTable};
