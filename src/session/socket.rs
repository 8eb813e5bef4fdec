//! WebSocket transport: the production [`Transport`] implementation.
//!
//! Frames are JSON text messages with an `event` name, a `payload`, and an
//! optional `ack` id tying a reply back to the server-side continuation.

use super::transport::{ConnectError, HandshakeMetadata, InboundFrame, SocketConn, Transport};
use crate::protocol::Outgoing;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// JSON shape of every frame in both directions.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<u64>,
}

pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        endpoint: &str,
        metadata: &HandshakeMetadata,
    ) -> Result<Box<dyn SocketConn>, ConnectError> {
        let url = ws_url(endpoint).ok_or_else(|| ConnectError::InvalidEndpoint(endpoint.to_string()))?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|_| ConnectError::InvalidEndpoint(url.clone()))?;

        let headers = request.headers_mut();
        if let Some(token) = &metadata.access_token {
            headers.insert("authorization", header_value(&format!("Bearer {token}"))?);
        }
        headers.insert("x-client-type", header_value(&metadata.client_type)?);
        headers.insert("x-session-id", header_value(&metadata.session_id)?);
        if let Some(thread_id) = &metadata.thread_id {
            headers.insert("x-thread-id", header_value(thread_id)?);
        }
        if let Some(user_env) = &metadata.user_env {
            headers.insert("user-env", header_value(user_env)?);
        }
        if let Some(profile) = &metadata.chat_profile {
            headers.insert("x-chat-profile", header_value(profile)?);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|error| ConnectError::Handshake(error.to_string()))?;
        Ok(Box::new(WsConn { inner: stream }))
    }
}

struct WsConn {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SocketConn for WsConn {
    async fn send(&mut self, frame: Outgoing) -> Result<(), ConnectError> {
        let envelope = match frame {
            Outgoing::Event { name, payload } => Envelope {
                event: name.to_string(),
                payload,
                ack: None,
            },
            Outgoing::Ack { id, payload } => Envelope {
                event: "ack".to_string(),
                payload,
                ack: Some(id),
            },
        };
        let text =
            serde_json::to_string(&envelope).map_err(|error| ConnectError::Socket(error.to_string()))?;
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| ConnectError::Socket(error.to_string()))
    }

    async fn recv(&mut self) -> Option<InboundFrame> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => {
                        return Some(InboundFrame {
                            event: envelope.event,
                            payload: envelope.payload,
                            ack: envelope.ack,
                        })
                    }
                    Err(error) => {
                        tracing::warn!(%error, "unparseable frame skipped");
                    }
                },
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by the stream itself.
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(%error, "socket read failed");
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ConnectError> {
    HeaderValue::from_str(value)
        .map_err(|_| ConnectError::Handshake(format!("invalid header value '{value}'")))
}

/// Map the HTTP endpoint to its realtime URL.
fn ws_url(endpoint: &str) -> Option<String> {
    let trimmed = endpoint.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        Some(format!("wss://{rest}/ws"))
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        Some(format!("ws://{rest}/ws"))
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        Some(format!("{trimmed}/ws"))
    } else {
        None
    }
}
