// Gateway module for utils - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod errors;
mod ids;
mod logger;

// Public re-exports - the ONLY way to access utils functionality
pub use errors::ExchangeError;
pub use ids::new_id;
pub use logger::init_logger;
