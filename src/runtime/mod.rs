/// Runtime orchestrator module - Gateway

mod display;
mod non_interactive;
mod orchestrator;
mod repl;

pub use display::{format_conversation_list, format_log, format_turn};
pub use non_interactive::{NonInteractiveResult, NonInteractiveRunner};
pub use orchestrator::{resolve_config, Orchestrator};
pub use repl::{parse_line, resolve_switch_target, Repl, ReplCommand};
