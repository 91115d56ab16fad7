use anyhow::{Context, Result};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::http::HttpExchange;
use super::traits::RemoteExchange;
use crate::app::Config;
use crate::constants::PLACEHOLDER_ENDPOINTS;

/// Turn a raw endpoint setting into a usable URL
///
/// Blank values, template placeholders and anything that is not an
/// http(s) URL resolve to `None`, which means "not configured".
pub fn resolve_endpoint(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if PLACEHOLDER_ENDPOINTS
        .iter()
        .any(|placeholder| placeholder.eq_ignore_ascii_case(raw))
    {
        return None;
    }

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(raw.to_string()),
        Ok(url) => {
            warn!("Ignoring endpoint with unsupported scheme '{}'", url.scheme());
            None
        }
        Err(e) => {
            warn!("Ignoring invalid endpoint '{}': {}", raw, e);
            None
        }
    }
}

/// Factory for creating the remote exchange from configuration
pub struct ExchangeFactory;

impl ExchangeFactory {
    /// Build the HTTP exchange, resolving the endpoint once
    pub fn create(config: &Config) -> Result<Arc<dyn RemoteExchange>> {
        let endpoint = resolve_endpoint(config.endpoint.as_deref());
        if endpoint.is_none() {
            warn!("No conversation endpoint configured; messages will not be sent");
        }

        let exchange = HttpExchange::new(
            endpoint,
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Failed to build HTTP client")?;
        Ok(Arc::new(exchange))
    }
}
