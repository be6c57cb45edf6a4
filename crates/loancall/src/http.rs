//! Shared outbound HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::error::ConfigError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a client with a connect timeout and an overall request timeout.
///
/// Callers still wrap each call in their own `tokio::time::timeout`; this
/// bound only keeps stray connections from lingering.
pub(crate) fn build_client(request_timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .user_agent(concat!("loancall/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
