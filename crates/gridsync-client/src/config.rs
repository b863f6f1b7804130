//! Client configuration.

use std::time::Duration;

use reqwest::Url;

use crate::error::TransportError;
use crate::routing::RoutingTable;

/// Default request/response endpoint.
pub const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:4038";
/// Default streaming endpoint.
pub const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:4039/ws";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how a [`GridClient`](crate::GridClient) talks to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the request/response channel (`http://` or `https://`).
    pub http_url: String,
    /// URL of the streaming channel (`ws://` or `wss://`).
    pub stream_url: String,
    /// How long to wait for any single reply.
    pub request_timeout: Duration,
    /// Which channel each operation uses.
    pub routes: RoutingTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_url: String::from(DEFAULT_HTTP_URL),
            stream_url: String::from(DEFAULT_STREAM_URL),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            routes: RoutingTable::DEFAULT,
        }
    }
}

impl ClientConfig {
    /// Configuration for the given endpoints with default timeout and routes.
    pub fn new(http_url: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            http_url: http_url.into(),
            stream_url: stream_url.into(),
            ..Self::default()
        }
    }

    /// Replace the routing table.
    #[must_use]
    pub const fn with_routes(mut self, routes: RoutingTable) -> Self {
        self.routes = routes;
        self
    }

    /// Replace the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check that both URLs parse with the right scheme and a host, and
    /// that the timeout is positive.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] describing the first problem.
    pub fn validate(&self) -> Result<(), TransportError> {
        check_url("http_url", &self.http_url, &["http", "https"])?;
        check_url("stream_url", &self.stream_url, &["ws", "wss"])?;
        if self.request_timeout.is_zero() {
            return Err(TransportError::Config(String::from(
                "request_timeout must be positive",
            )));
        }
        Ok(())
    }
}

fn check_url(field: &str, raw: &str, schemes: &[&str]) -> Result<(), TransportError> {
    let url = Url::parse(raw)
        .map_err(|e| TransportError::Config(format!("{field} {raw:?} is not a URL: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(TransportError::Config(format!(
            "{field} must use one of {schemes:?}, got {raw}"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(TransportError::Config(format!("{field} has no host: {raw}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn wrong_schemes_are_rejected() {
        let swapped = ClientConfig::new("ws://127.0.0.1:4038", "http://127.0.0.1:4039");
        assert!(matches!(
            swapped.validate(),
            Err(TransportError::Config(_))
        ));

        let instant = ClientConfig::default().with_request_timeout(Duration::ZERO);
        assert!(instant.validate().is_err());
    }

    #[test]
    fn urls_without_host_are_rejected() {
        for (http, stream) in [
            ("http://", DEFAULT_STREAM_URL),
            (DEFAULT_HTTP_URL, "ws://"),
            ("http//127.0.0.1:4038", DEFAULT_STREAM_URL),
        ] {
            let config = ClientConfig::new(http, stream);
            assert!(
                matches!(config.validate(), Err(TransportError::Config(_))),
                "{http} / {stream} should be rejected"
            );
        }
    }

    #[test]
    fn secure_schemes_are_accepted() {
        let config = ClientConfig::new("https://grid.example:443", "wss://grid.example/ws");
        assert!(config.validate().is_ok());
    }
}
