//! Trait abstractions for the realtime connection.
//!
//! These traits let the session loop run against mock sockets in tests.

use crate::protocol::Outgoing;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Identity and routing metadata presented during the socket handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMetadata {
    pub access_token: Option<String>,
    pub client_type: String,
    pub session_id: String,
    pub thread_id: Option<String>,
    pub user_env: Option<String>,
    pub chat_profile: Option<String>,
}

impl Default for HandshakeMetadata {
    fn default() -> Self {
        HandshakeMetadata {
            access_token: None,
            client_type: "web".to_string(),
            session_id: String::new(),
            thread_id: None,
            user_env: None,
            chat_profile: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("socket error: {0}")]
    Socket(String),
}

/// One decoded inbound frame: a named event, its payload, and the ack id
/// when the server expects an answer on this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub event: String,
    pub payload: Value,
    pub ack: Option<u64>,
}

/// Factory for live connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        metadata: &HandshakeMetadata,
    ) -> Result<Box<dyn SocketConn>, ConnectError>;
}

/// An established bidirectional connection.
#[async_trait]
pub trait SocketConn: Send {
    async fn send(&mut self, frame: Outgoing) -> Result<(), ConnectError>;

    /// Next inbound frame. `None` means the connection is gone.
    async fn recv(&mut self) -> Option<InboundFrame>;

    async fn close(&mut self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(
        &self,
        endpoint: &str,
        metadata: &HandshakeMetadata,
    ) -> Result<Box<dyn SocketConn>, ConnectError> {
        (**self).connect(endpoint, metadata).await
    }
}
