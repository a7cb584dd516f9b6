//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the connection URLs and the process-wide
//! `client_id`. ComfyUI routes execution notifications to the socket
//! registered under the same `client_id` that a prompt was submitted
//! with, so one client must be used for both.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// The raw WebSocket stream to a ComfyUI instance.
pub type ComfyUIStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance.
pub struct ComfyUIClient {
    client_id: String,
    ws_url: String,
    api_url: String,
}

impl ComfyUIClient {
    /// Create a new client with a freshly generated `client_id` (UUID v4).
    ///
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `api_url` - HTTP base URL, e.g. `http://host:8188`.
    pub fn new(ws_url: String, api_url: String) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            ws_url,
            api_url,
        }
    }

    /// Identifier sent with every submission and the WebSocket handshake.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// HTTP API base URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Open the notification channel at `/ws?clientId=<client_id>`.
    pub async fn connect(&self) -> Result<ComfyUIStream, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, self.client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %self.client_id,
            "Connected to ComfyUI at {}",
            self.ws_url,
        );

        Ok(ws_stream)
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_stable_per_client() {
        let client = ComfyUIClient::new("ws://h:1".into(), "http://h:1".into());
        assert_eq!(client.client_id(), client.client_id());
        assert!(uuid::Uuid::parse_str(client.client_id()).is_ok());
    }

    #[test]
    fn client_ids_differ_between_clients() {
        let a = ComfyUIClient::new("ws://h:1".into(), "http://h:1".into());
        let b = ComfyUIClient::new("ws://h:1".into(), "http://h:1".into());
        assert_ne!(a.client_id(), b.client_id());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let client = ComfyUIClient::new("ws://127.0.0.1:9".into(), "http://127.0.0.1:9".into());
        assert!(matches!(
            client.connect().await,
            Err(ComfyUIClientError::Connection(_))
        ));
    }
}
