use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    app::Config,
    cli::OutputFormat,
    exchange::RemoteExchange,
    session::{MessageLog, Role, SessionController, SubmitOutcome},
};

/// Result of a non-interactive run
#[derive(Debug, Serialize, Deserialize)]
pub struct NonInteractiveResult {
    /// The prompt that was executed
    pub prompt: String,
    /// Last assistant turn, if the exchange succeeded
    pub response: Option<String>,
    /// Conversation as it stands after the run
    pub messages: MessageLog,
    /// Id the conversation was stored under
    pub conversation_id: Option<String>,
    pub error: Option<ErrorInfo>,
    /// Metadata about the execution
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub endpoint: String,
    /// Execution time in milliseconds
    pub duration_ms: u128,
}

impl NonInteractiveResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Non-interactive runner for executing single prompts
pub struct NonInteractiveRunner {
    controller: SessionController,
}

impl NonInteractiveRunner {
    pub fn new(exchange: Arc<dyn RemoteExchange>, config: &Config) -> Self {
        Self {
            controller: SessionController::new(exchange, config.late_responses),
        }
    }

    /// Execute a single prompt and return the result
    pub async fn execute(&self, prompt: String) -> NonInteractiveResult {
        let start_time = std::time::Instant::now();

        let outcome = self.controller.submit(prompt.clone()).await;
        let messages = self.controller.visible_log();

        let (response, conversation_id, error) = match outcome {
            SubmitOutcome::Resolved {
                conversation_id,
                messages,
            } => {
                let response = messages
                    .iter()
                    .rev()
                    .find(|turn| turn.role == Role::Assistant)
                    .map(|turn| turn.content.clone());
                (response, Some(conversation_id), None)
            }
            SubmitOutcome::Failed(e) => (
                None,
                None,
                Some(ErrorInfo {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
            ),
            SubmitOutcome::Rejected(reason) => (
                None,
                None,
                Some(ErrorInfo {
                    kind: "rejected".to_string(),
                    message: reason.to_string(),
                }),
            ),
            SubmitOutcome::Aborted(reason) => (
                None,
                None,
                Some(ErrorInfo {
                    kind: "aborted".to_string(),
                    message: reason,
                }),
            ),
            SubmitOutcome::Discarded => (
                None,
                None,
                Some(ErrorInfo {
                    kind: "discarded".to_string(),
                    message: "Response was discarded".to_string(),
                }),
            ),
        };

        NonInteractiveResult {
            prompt,
            response,
            messages,
            conversation_id,
            error,
            metadata: ExecutionMetadata {
                endpoint: self.controller.exchange().name().to_string(),
                duration_ms: start_time.elapsed().as_millis(),
            },
        }
    }

    /// Format the result according to the output format
    pub fn format_result(&self, result: &NonInteractiveResult, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_else(|e| {
                format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
            }),
            OutputFormat::Text => {
                let mut output = String::new();
                if let Some(response) = &result.response {
                    output.push_str(response);
                }
                if let Some(error) = &result.error {
                    output.push_str(&format!("Error: {}", error.message));
                }
                output
            }
            OutputFormat::Markdown => {
                let mut output = String::new();

                output.push_str("## Conversation\n\n");
                for turn in &result.messages {
                    output.push_str(&format!("**{}:** {}\n\n", turn.role.label(), turn.content));
                }

                if let Some(error) = &result.error {
                    output.push_str("## Error\n\n");
                    output.push_str(&format!("- `{}`: {}\n\n", error.kind, error.message));
                }

                output.push_str("---\n");
                output.push_str(&format!(
                    "*Endpoint: {} | Duration: {}ms*\n",
                    result.metadata.endpoint, result.metadata.duration_ms
                ));

                output
            }
        }
    }
}
