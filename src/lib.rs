pub mod app;
pub mod cli;
pub mod constants;
pub mod exchange;
pub mod runtime;
pub mod session;
pub mod utils;

pub use app::{load_config, Config};
pub use exchange::{ExchangeFactory, HttpExchange, RemoteExchange};
pub use session::{
    ConversationEntry, ConversationStore, MessageLog, SessionController, SubmitOutcome, Turn,
};
pub use utils::ExchangeError;
