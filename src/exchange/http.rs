use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::traits::RemoteExchange;
use super::types::{ExchangeRequest, ExchangeResponse};
use crate::session::MessageLog;
use crate::utils::ExchangeError;

const UNCONFIGURED_NAME: &str = "(not configured)";

/// JSON-over-HTTP responder: POSTs `{messages}` and expects `{messages}` back
pub struct HttpExchange {
    client: Client,
    endpoint: Option<String>,
}

impl HttpExchange {
    /// `endpoint` must already be resolved; `None` yields an unconfigured exchange
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::TransportError(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

#[async_trait]
impl RemoteExchange for HttpExchange {
    async fn send_conversation(&self, history: &MessageLog) -> Result<MessageLog, ExchangeError> {
        let endpoint = self.endpoint.as_deref().ok_or(ExchangeError::NotConfigured)?;

        debug!(endpoint, turns = history.len(), "sending conversation");

        let response = self
            .client
            .post(endpoint)
            .json(&ExchangeRequest { messages: history })
            .send()
            .await
            .map_err(|e| {
                ExchangeError::TransportError(format!("could not reach {}: {}", endpoint, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::TransportError(if body.is_empty() {
                format!("responder returned {}", status)
            } else {
                format!("responder returned {}: {}", status, body.trim())
            }));
        }

        let body = response.text().await?;
        let parsed: ExchangeResponse = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;
        let messages = parsed.into_messages()?;

        debug!(turns = messages.len(), "conversation resolved");
        Ok(messages)
    }

    fn name(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(UNCONFIGURED_NAME)
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}
