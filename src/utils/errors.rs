use thiserror::Error;

/// Failure of a single conversation exchange.
///
/// Every variant is recovered the same way by the session controller: the
/// visible log rolls back to the outbound log and the store is left alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("No conversation endpoint is configured (set PARLEY_ENDPOINT or `endpoint` in config.toml)")]
    NotConfigured,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ExchangeError {
    /// Short machine-friendly kind, used in logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::TransportError(_) => "transport_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::TransportError(err.to_string())
        }
    }
}
