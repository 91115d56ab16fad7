use anyhow::{Context, Result};
use colored::Colorize;
use futures::future::OptionFuture;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tracing::error;

use super::display::{format_conversation_list, format_log, format_turn};
use crate::app::UIConfig;
use crate::session::{
    ConversationEntry, SessionController, SubmitOutcome, SubmitRejected, Turn,
};

const HELP: &str = "\
Type a message and press Enter to send it.
  /new            start a new conversation
  /list           list saved conversations
  /switch <n|id>  switch to a conversation by number or id
  /show           print the current conversation
  /help           show this help
  /quit           exit";

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Submit(String),
    New,
    List,
    Switch(String),
    Show,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Submit(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();
    match (name, arg) {
        ("new", _) => ReplCommand::New,
        ("list" | "ls", _) => ReplCommand::List,
        ("switch" | "s", arg) if !arg.is_empty() => ReplCommand::Switch(arg.to_string()),
        ("show", _) => ReplCommand::Show,
        ("help" | "?", _) => ReplCommand::Help,
        ("quit" | "exit" | "q", _) => ReplCommand::Quit,
        _ => ReplCommand::Unknown(trimmed.to_string()),
    }
}

/// Map a `/switch` argument to a conversation id
///
/// Accepts a 1-based position from `/list`, a full id, or a unique id prefix.
pub fn resolve_switch_target(entries: &[ConversationEntry], arg: &str) -> Option<String> {
    if let Ok(position) = arg.parse::<usize>() {
        if (1..=entries.len()).contains(&position) {
            return Some(entries[position - 1].id.clone());
        }
    }
    if let Some(entry) = entries.iter().find(|entry| entry.id == arg) {
        return Some(entry.id.clone());
    }
    let mut matches = entries.iter().filter(|entry| entry.id.starts_with(arg));
    match (matches.next(), matches.next()) {
        (Some(entry), None) => Some(entry.id.clone()),
        _ => None,
    }
}

/// Line-oriented interactive session
///
/// Input keeps being read while a reply is outstanding, so the user can list
/// and switch conversations mid-flight.
pub struct Repl {
    controller: Arc<SessionController>,
    ui: UIConfig,
    pending: Option<JoinHandle<SubmitOutcome>>,
}

impl Repl {
    pub fn new(controller: Arc<SessionController>, ui: UIConfig) -> Self {
        Self {
            controller,
            ui,
            pending: None,
        }
    }

    pub async fn run(self) -> Result<()> {
        println!("{}", "Type /help for commands.".dimmed());
        self.run_with(BufReader::new(tokio::io::stdin())).await
    }

    /// Drive the session from any line source
    ///
    /// At end of input an outstanding reply is still awaited and reported;
    /// only `/quit` abandons it.
    pub async fn run_with<R>(mut self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut quit = false;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read input")? else {
                        break;
                    };
                    if !self.handle_line(&line).await {
                        quit = true;
                        break;
                    }
                }
                Some(joined) = OptionFuture::from(self.pending.as_mut()) => {
                    self.pending = None;
                    self.finish(joined);
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            if quit {
                pending.abort();
            } else {
                self.finish(pending.await);
            }
        }
        Ok(())
    }

    fn finish(&self, joined: Result<SubmitOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.report(outcome),
            Err(e) => error!("Submission task failed: {}", e),
        }
    }

    /// Returns false when the session should end
    async fn handle_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            ReplCommand::Empty => {}
            ReplCommand::Submit(text) => self.submit(text).await,
            ReplCommand::New => {
                self.controller.new_conversation();
                println!("{}", "Started a new conversation.".dimmed());
            }
            ReplCommand::List => {
                let active = self.controller.active_id();
                println!(
                    "{}",
                    format_conversation_list(&self.controller.conversations(), active.as_deref())
                );
            }
            ReplCommand::Switch(arg) => {
                let entries = self.controller.conversations();
                match resolve_switch_target(&entries, &arg) {
                    Some(id) => {
                        let log = self.controller.select(Some(id.as_str()));
                        println!("{}", format_log(&log, &self.ui));
                    }
                    None => {
                        self.controller.select(Some(arg.as_str()));
                        println!(
                            "{}",
                            format!("No conversation '{}'; started a new one.", arg).yellow()
                        );
                    }
                }
            }
            ReplCommand::Show => {
                println!("{}", format_log(&self.controller.visible_log(), &self.ui));
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => return false,
            ReplCommand::Unknown(command) => {
                println!("{}", format!("Unknown command: {}", command).yellow());
            }
        }
        true
    }

    async fn submit(&mut self, text: String) {
        self.controller.set_input(text.clone());
        match self.controller.spawn_submit(text) {
            Ok(handle) => {
                // The previous task has already applied its result
                if let Some(previous) = self.pending.replace(handle) {
                    self.finish(previous.await);
                }
                println!("{}", format_turn(&Turn::placeholder(), &self.ui));
            }
            Err(outcome) => self.report(outcome),
        }
    }

    fn report(&self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Resolved {
                conversation_id,
                messages,
            } => {
                if self.controller.active_id().as_deref() == Some(conversation_id.as_str()) {
                    if let Some(turn) = messages.last() {
                        println!("{}", format_turn(turn, &self.ui));
                    }
                } else {
                    let title = self
                        .controller
                        .conversations()
                        .into_iter()
                        .find(|entry| entry.id == conversation_id)
                        .map(|entry| entry.title)
                        .unwrap_or_default();
                    println!("{}", format!("Reply saved to '{}'.", title).dimmed());
                }
            }
            SubmitOutcome::Discarded => {
                println!("{}", "A late reply was discarded.".dimmed());
            }
            SubmitOutcome::Failed(error) => {
                println!("{} {}", "Error:".red().bold(), error);
                println!("{}", "Your message was kept; send again to retry.".dimmed());
            }
            SubmitOutcome::Rejected(SubmitRejected::Busy) => {
                println!(
                    "{}",
                    "Still waiting for the previous reply; your message was not sent.".yellow()
                );
            }
            SubmitOutcome::Rejected(SubmitRejected::EmptyInput) => {}
            SubmitOutcome::Aborted(reason) => {
                println!("{} {}", "Error:".red().bold(), reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::RemoteExchange;
    use crate::session::{LateResponsePolicy, MessageLog};
    use crate::utils::ExchangeError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Replies after a short delay so input can run ahead of the exchange
    struct DelayedExchange {
        delay: Duration,
    }

    #[async_trait]
    impl RemoteExchange for DelayedExchange {
        async fn send_conversation(
            &self,
            history: &MessageLog,
        ) -> Result<MessageLog, ExchangeError> {
            tokio::time::sleep(self.delay).await;
            Ok(history.append(Turn::assistant("pong")))
        }

        fn name(&self) -> &str {
            "delayed"
        }
    }

    fn delayed_controller(millis: u64) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::new(DelayedExchange {
                delay: Duration::from_millis(millis),
            }),
            LateResponsePolicy::Apply,
        ))
    }

    #[tokio::test]
    async fn test_end_of_input_waits_for_outstanding_reply() {
        let controller = delayed_controller(30);
        let repl = Repl::new(Arc::clone(&controller), UIConfig::default());

        repl.run_with(&b"ping\n"[..]).await.unwrap();

        assert!(!controller.is_submitting());
        let conversations = controller.conversations();
        assert_eq!(conversations.len(), 1);
        let visible = controller.visible_log();
        let contents: Vec<&str> = visible.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["ping", "pong"]);
        assert!(controller.snapshot().input.is_empty());
    }

    #[tokio::test]
    async fn test_quit_abandons_outstanding_reply() {
        let controller = delayed_controller(200);
        let repl = Repl::new(Arc::clone(&controller), UIConfig::default());

        repl.run_with(&b"ping\n/quit\n"[..]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!controller.is_submitting());
        assert!(controller.conversations().is_empty());
        let visible = controller.visible_log();
        assert_eq!(visible.len(), 1);
        assert!(!visible.is_pending());
    }

    #[tokio::test]
    async fn test_commands_run_while_reply_is_outstanding() {
        let controller = delayed_controller(30);
        let repl = Repl::new(Arc::clone(&controller), UIConfig::default());

        // The second message is refused, /new moves away, the reply still lands
        repl.run_with(&b"first\nsecond\n/list\n/new\n"[..])
            .await
            .unwrap();

        assert!(!controller.is_submitting());
        let conversations = controller.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].messages.len(), 2);
        assert_eq!(controller.active_id(), None);
        assert!(controller.visible_log().is_empty());
        // The refused line stays in the input box
        assert_eq!(controller.snapshot().input, "second");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line(""), ReplCommand::Empty);
        assert_eq!(parse_line("   "), ReplCommand::Empty);
        assert_eq!(parse_line("hello"), ReplCommand::Submit("hello".to_string()));
        assert_eq!(parse_line("/new"), ReplCommand::New);
        assert_eq!(parse_line("/list"), ReplCommand::List);
        assert_eq!(parse_line("/switch 2"), ReplCommand::Switch("2".to_string()));
        assert_eq!(parse_line("/show"), ReplCommand::Show);
        assert_eq!(parse_line("/quit"), ReplCommand::Quit);
        assert_eq!(
            parse_line("/switch"),
            ReplCommand::Unknown("/switch".to_string())
        );
        assert_eq!(parse_line("/bogus"), ReplCommand::Unknown("/bogus".to_string()));
    }

    #[test]
    fn test_resolve_switch_target() {
        let entries = vec![
            ConversationEntry::new("abc123".to_string(), MessageLog::new()),
            ConversationEntry::new("abd456".to_string(), MessageLog::new()),
        ];

        assert_eq!(resolve_switch_target(&entries, "1"), Some("abc123".to_string()));
        assert_eq!(resolve_switch_target(&entries, "2"), Some("abd456".to_string()));
        assert_eq!(resolve_switch_target(&entries, "3"), None);
        assert_eq!(resolve_switch_target(&entries, "abd456"), Some("abd456".to_string()));
        assert_eq!(resolve_switch_target(&entries, "abc"), Some("abc123".to_string()));
        // Ambiguous prefix
        assert_eq!(resolve_switch_target(&entries, "ab"), None);
        assert_eq!(resolve_switch_target(&entries, "zzz"), None);
    }
}
