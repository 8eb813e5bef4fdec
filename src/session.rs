//! The connection manager: owns the socket, feeds the reducer, and carries
//! out the side effects it returns.

pub mod http;
pub mod socket;
#[cfg(test)]
pub mod testing;
pub mod transport;

use crate::dispatch::{dispatch, Command, Input, SessionContext, SideEffect};
use crate::protocol::{AckHandle, Outgoing, ServerEvent, UiSettingsCommand};
use crate::state::{ConnectionStatus, StateHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use transport::{HandshakeMetadata, InboundFrame, SocketConn, Transport};

/// Rapid connect requests within this window collapse into one attempt with
/// the last-supplied parameters.
pub const CONNECT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Host-side integrations the session drives but does not implement:
/// speech playback, presentation settings, local function calls, reload.
#[async_trait]
pub trait Collaborators: Send + Sync {
    async fn speak(&self, _text: &str) {}
    async fn abort_speech(&self) {}
    async fn apply_ui_settings(&self, _command: &UiSettingsCommand) {}
    async fn invoke_fn(&self, _name: &str, _args: &Value) {}
    async fn reload(&self) {}
}

/// Host with no integrations.
pub struct NoopCollaborators;

#[async_trait]
impl Collaborators for NoopCollaborators {}

/// Parameters for opening (or reopening) the realtime connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub endpoint: String,
    pub metadata: HandshakeMetadata,
}

/// Commands accepted by the session loop.
pub enum SessionCommand {
    Connect(ConnectParams),
    Disconnect,
    Dispatch(Command),
    /// Reset all state under a fresh session id and tell the server.
    ClearSession,
}

enum LoopEvent {
    Command(Option<SessionCommand>),
    ConnectNow,
    Inbound(Option<InboundFrame>),
    Outbound(Option<Outgoing>),
}

/// The session event loop. Single owner of the socket; everything else
/// talks to it through [`SessionCommand`]s.
pub struct Session<T, C>
where
    T: Transport + 'static,
    C: Collaborators + 'static,
{
    state: StateHandle,
    ctx: SessionContext,
    transport: T,
    collaborators: Arc<C>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    outbound_tx: mpsc::UnboundedSender<Outgoing>,
    outbound_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl<T, C> Session<T, C>
where
    T: Transport + 'static,
    C: Collaborators + 'static,
{
    pub fn new(
        state: StateHandle,
        ctx: SessionContext,
        transport: T,
        collaborators: C,
    ) -> (Self, mpsc::UnboundedSender<SessionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Session {
            state,
            ctx,
            transport,
            collaborators: Arc::new(collaborators),
            command_rx,
            outbound_tx,
            outbound_rx,
        };
        (session, command_tx)
    }

    /// Run until every command sender is dropped.
    pub async fn run(mut self) {
        let mut socket: Option<Box<dyn SocketConn>> = None;
        let mut pending_connect: Option<ConnectParams> = None;
        let connect_timer = tokio::time::sleep(CONNECT_DEBOUNCE);
        tokio::pin!(connect_timer);

        loop {
            let event = tokio::select! {
                command = self.command_rx.recv() => LoopEvent::Command(command),
                () = connect_timer.as_mut(), if pending_connect.is_some() => LoopEvent::ConnectNow,
                frame = recv_or_pending(&mut socket) => LoopEvent::Inbound(frame),
                frame = self.outbound_rx.recv() => LoopEvent::Outbound(frame),
            };

            match event {
                LoopEvent::Command(None) => break,
                LoopEvent::Command(Some(command)) => match command {
                    SessionCommand::Connect(params) => {
                        self.state.lock().connection = ConnectionStatus::Connecting;
                        pending_connect = Some(params);
                        connect_timer
                            .as_mut()
                            .reset(Instant::now() + CONNECT_DEBOUNCE);
                    }
                    SessionCommand::Disconnect => {
                        if let Some(mut conn) = socket.take() {
                            conn.close().await;
                        }
                        self.state.lock().connection =
                            ConnectionStatus::Disconnected { error: false };
                    }
                    SessionCommand::Dispatch(command) => {
                        let effects = {
                            let mut state = self.state.lock();
                            dispatch(&mut state, &self.ctx, Input::Command(command))
                        };
                        self.run_effects(effects).await;
                    }
                    SessionCommand::ClearSession => {
                        let new_session_id = uuid::Uuid::new_v4().to_string();
                        let effects = {
                            let mut state = self.state.lock();
                            dispatch(
                                &mut state,
                                &self.ctx,
                                Input::Command(Command::ClearSession { new_session_id }),
                            )
                        };
                        self.run_effects(effects).await;
                        // The clear notice must reach the wire before the
                        // socket goes away, so drain the queue here rather
                        // than waiting for the select loop.
                        while let Ok(frame) = self.outbound_rx.try_recv() {
                            if let Some(conn) = socket.as_mut() {
                                if let Err(error) = conn.send(frame).await {
                                    tracing::warn!(%error, "send failed");
                                }
                            }
                        }
                        if let Some(mut conn) = socket.take() {
                            conn.close().await;
                        }
                        self.state.lock().connection =
                            ConnectionStatus::Disconnected { error: false };
                    }
                },
                LoopEvent::ConnectNow => {
                    let Some(params) = pending_connect.take() else {
                        continue;
                    };
                    if let Some(mut conn) = socket.take() {
                        conn.close().await;
                    }
                    let metadata = self.fill_metadata(params.metadata);
                    match self.transport.connect(&params.endpoint, &metadata).await {
                        Ok(conn) => {
                            tracing::info!(endpoint = %params.endpoint, "connected");
                            socket = Some(conn);
                            self.state.lock().connection = ConnectionStatus::Connected;
                            let _ = self.outbound_tx.send(Outgoing::connection_successful());
                        }
                        Err(error) => {
                            tracing::warn!(%error, endpoint = %params.endpoint, "connect failed");
                            self.state.lock().connection =
                                ConnectionStatus::Disconnected { error: true };
                        }
                    }
                }
                LoopEvent::Inbound(Some(frame)) => {
                    self.handle_frame(frame).await;
                }
                LoopEvent::Inbound(None) => {
                    tracing::info!("socket closed by peer");
                    socket = None;
                    self.state.lock().connection = ConnectionStatus::Disconnected { error: true };
                }
                LoopEvent::Outbound(Some(frame)) => {
                    if let Some(conn) = socket.as_mut() {
                        if let Err(error) = conn.send(frame).await {
                            tracing::warn!(%error, "send failed");
                        }
                    } else {
                        tracing::debug!("outbound frame dropped, not connected");
                    }
                }
                // We hold a sender ourselves, so the outbound channel never
                // closes while the loop runs.
                LoopEvent::Outbound(None) => {}
            }
        }
    }

    async fn handle_frame(&self, frame: InboundFrame) {
        let ack = frame
            .ack
            .map(|id| AckHandle::new(id, self.outbound_tx.clone()));
        match ServerEvent::decode(&frame.event, frame.payload) {
            Ok(event) => {
                let effects = {
                    let mut state = self.state.lock();
                    dispatch(&mut state, &self.ctx, Input::Server { event, ack })
                };
                self.run_effects(effects).await;
            }
            Err(error) => {
                tracing::warn!(%error, "inbound frame dropped");
            }
        }
    }

    async fn run_effects(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                // One ordered path to the socket for frames and acks alike.
                SideEffect::Emit(frame) => {
                    let _ = self.outbound_tx.send(frame);
                }
                SideEffect::Speak(text) => self.collaborators.speak(&text).await,
                SideEffect::AbortSpeech => self.collaborators.abort_speech().await,
                SideEffect::UiSettings(command) => {
                    self.collaborators.apply_ui_settings(&command).await;
                }
                SideEffect::InvokeFn { name, args } => {
                    self.collaborators.invoke_fn(&name, &args).await;
                }
                SideEffect::Reload => self.collaborators.reload().await,
            }
        }
    }

    /// Fill handshake fields the caller left blank from current state.
    fn fill_metadata(&self, mut metadata: HandshakeMetadata) -> HandshakeMetadata {
        let state = self.state.lock();
        if metadata.session_id.is_empty() {
            metadata.session_id = state.session_id.clone();
        }
        if metadata.thread_id.is_none() {
            metadata.thread_id = state.thread_id.clone();
        }
        if metadata.chat_profile.is_none() {
            metadata.chat_profile = state.chat_profile.clone();
        }
        metadata
    }
}

async fn recv_or_pending(socket: &mut Option<Box<dyn SocketConn>>) -> Option<InboundFrame> {
    match socket.as_mut() {
        Some(conn) => conn.recv().await,
        None => std::future::pending().await,
    }
}
