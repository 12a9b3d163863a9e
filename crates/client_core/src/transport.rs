//! Endpoint normalization for the analyzer WebSocket.

use url::Url;

use crate::SessionError;

/// Maps an `http(s)` endpoint to its `ws(s)` twin; `ws(s)` URLs pass through.
/// Anything else is rejected before a connection is attempted.
pub fn ws_endpoint(endpoint: &str) -> Result<Url, SessionError> {
    let mapped = if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else {
        return Err(SessionError::InvalidEndpoint(endpoint.to_string()));
    };

    Url::parse(&mapped).map_err(|_| SessionError::InvalidEndpoint(endpoint.to_string()))
}
