// Gateway module for the remote exchange - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod factory;
mod http;
mod traits;
mod types;

// Public re-exports - the ONLY way to access exchange functionality
pub use factory::{resolve_endpoint, ExchangeFactory};
pub use http::HttpExchange;
pub use traits::RemoteExchange;
pub use types::{ExchangeRequest, ExchangeResponse};

#[cfg(test)]
pub use traits::MockRemoteExchange;
