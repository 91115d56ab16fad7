use async_trait::async_trait;

use crate::session::MessageLog;
use crate::utils::ExchangeError;

/// Core trait for the remote responder
///
/// Given the whole conversation so far, returns the authoritative conversation
/// that should replace it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteExchange: Send + Sync {
    /// Send the outbound log and get the resolved log back
    async fn send_conversation(&self, history: &MessageLog) -> Result<MessageLog, ExchangeError>;

    /// Display name (usually the endpoint)
    fn name(&self) -> &str;

    /// False when there is nowhere to send to; submissions then fail without a call
    fn is_configured(&self) -> bool {
        true
    }
}
