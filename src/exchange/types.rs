use serde::{Deserialize, Serialize};

use crate::session::MessageLog;
use crate::utils::ExchangeError;

/// Request body: the full conversation to date
#[derive(Debug, Serialize)]
pub struct ExchangeRequest<'a> {
    pub messages: &'a MessageLog,
}

/// Response body; `messages` is required for a usable reply
#[derive(Debug, Deserialize)]
pub struct ExchangeResponse {
    #[serde(default)]
    pub messages: Option<MessageLog>,
}

impl ExchangeResponse {
    pub fn into_messages(self) -> Result<MessageLog, ExchangeError> {
        self.messages.ok_or_else(|| {
            ExchangeError::MalformedResponse("response has no `messages` field".to_string())
        })
    }
}
