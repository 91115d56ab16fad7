/// Session management module - Gateway

mod controller;
mod log;
mod machine;
mod store;

pub use controller::{SessionController, SubmitOutcome};
pub use log::{MessageLog, Role, Turn};
pub use machine::{
    transition, ChatState, Effect, Event, LateResponsePolicy, PendingExchange, SubmitRejected,
    TransitionError, TransitionResult,
};
pub use store::{derive_title, ConversationEntry, ConversationStore};
