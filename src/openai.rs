//! OpenAI client configuration with sensible defaults.
//!
//! The same client type talks to OpenAI and to OpenAI-compatible endpoints
//! such as Groq; only the API base and key differ.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client for the given key and optional base URL.
pub fn create_client(api_key: &str, api_base: Option<&str>) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(api_key, api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with a custom timeout.
pub fn create_client_with_timeout(
    api_key: &str,
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
