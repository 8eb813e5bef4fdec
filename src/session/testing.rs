//! Mock implementations for testing
//!
//! These mocks let session tests run without real sockets.

use super::transport::{ConnectError, HandshakeMetadata, InboundFrame, SocketConn, Transport};
use super::Collaborators;
use crate::protocol::{Outgoing, UiSettingsCommand};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Transport whose connections read scripted inbound frames and record
/// everything sent.
pub struct MockTransport {
    connects: Arc<Mutex<Vec<(String, HandshakeMetadata)>>>,
    sent: Arc<Mutex<Vec<Outgoing>>>,
    inbound: Arc<Mutex<Option<mpsc::UnboundedReceiver<InboundFrame>>>>,
    fail: bool,
}

impl MockTransport {
    /// A working transport plus the sender the test scripts inbound frames
    /// with. Dropping the sender simulates a peer close.
    pub fn new() -> (Self, mpsc::UnboundedSender<InboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = MockTransport {
            connects: Arc::default(),
            sent: Arc::default(),
            inbound: Arc::new(Mutex::new(Some(rx))),
            fail: false,
        };
        (transport, tx)
    }

    /// A transport that refuses every connection.
    pub fn failing() -> Self {
        MockTransport {
            connects: Arc::default(),
            sent: Arc::default(),
            inbound: Arc::new(Mutex::new(None)),
            fail: true,
        }
    }

    /// Recorded connect attempts.
    pub fn connects(&self) -> Arc<Mutex<Vec<(String, HandshakeMetadata)>>> {
        self.connects.clone()
    }

    /// Every frame written to any connection.
    pub fn sent(&self) -> Arc<Mutex<Vec<Outgoing>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        endpoint: &str,
        metadata: &HandshakeMetadata,
    ) -> Result<Box<dyn SocketConn>, ConnectError> {
        self.connects
            .lock()
            .unwrap()
            .push((endpoint.to_string(), metadata.clone()));
        if self.fail {
            return Err(ConnectError::Handshake("mock refused".to_string()));
        }
        let inbound = self.inbound.lock().unwrap().take();
        Ok(Box::new(MockConn {
            inbound,
            sent: self.sent.clone(),
        }))
    }
}

struct MockConn {
    /// Only the first connection gets the scripted frames; later ones idle.
    inbound: Option<mpsc::UnboundedReceiver<InboundFrame>>,
    sent: Arc<Mutex<Vec<Outgoing>>>,
}

#[async_trait]
impl SocketConn for MockConn {
    async fn send(&mut self, frame: Outgoing) -> Result<(), ConnectError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<InboundFrame> {
        match self.inbound.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

/// Collaborators that record every call.
#[derive(Default)]
pub struct RecordingCollaborators {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingCollaborators {
    pub fn new() -> Self {
        RecordingCollaborators::default()
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Collaborators for RecordingCollaborators {
    async fn speak(&self, text: &str) {
        self.calls.lock().unwrap().push(format!("speak:{text}"));
    }

    async fn abort_speech(&self) {
        self.calls.lock().unwrap().push("abort_speech".to_string());
    }

    async fn apply_ui_settings(&self, command: &UiSettingsCommand) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("ui_settings:{:?}", command.name));
    }

    async fn invoke_fn(&self, name: &str, _args: &Value) {
        self.calls.lock().unwrap().push(format!("invoke:{name}"));
    }

    async fn reload(&self) {
        self.calls.lock().unwrap().push("reload".to_string());
    }
}
