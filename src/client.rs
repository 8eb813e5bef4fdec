//! High-level handle host applications hold onto.

use crate::dispatch::{Command, SessionContext};
use crate::protocol::{Action, GatherCommandResponse, Step, UserInputKind};
use crate::session::http::{FileRef, HttpSideChannel, ProgressFn, SideChannelError};
use crate::session::transport::Transport;
use crate::session::{Collaborators, ConnectParams, Session, SessionCommand};
use crate::state::{ActionError, ChatState, StateHandle};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cloneable facade over a running session loop.
///
/// All methods are fire-and-forget into the loop except the awaited action
/// calls and uploads.
#[derive(Clone)]
pub struct ChatClient {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    state: StateHandle,
    side_channel: Arc<HttpSideChannel>,
}

impl ChatClient {
    /// Start a session loop on the current runtime and return its handle.
    pub fn spawn<T, C>(http_endpoint: impl Into<String>, transport: T, collaborators: C) -> Self
    where
        T: Transport + 'static,
        C: Collaborators + 'static,
    {
        let http_endpoint = http_endpoint.into();
        let ctx = SessionContext {
            http_endpoint: http_endpoint.clone(),
        };
        let state = StateHandle::new(ChatState::new(uuid::Uuid::new_v4().to_string()));
        let (session, command_tx) = Session::new(state.clone(), ctx, transport, collaborators);
        tokio::spawn(session.run());
        ChatClient {
            command_tx,
            state,
            side_channel: Arc::new(HttpSideChannel::new(http_endpoint)),
        }
    }

    /// Shared view of the session state.
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn connect(&self, params: ConnectParams) {
        self.send(SessionCommand::Connect(params));
    }

    pub fn disconnect(&self) {
        self.send(SessionCommand::Disconnect);
    }

    /// Send a free chat message; returns the locally-created step.
    pub fn send_message(&self, name: impl Into<String>, output: impl Into<String>) -> Step {
        let step = Step::user_message(name, output);
        self.dispatch(Command::SendMessage(step.clone()));
        step
    }

    /// Submit user input, answering a pending obligation when one holds the
    /// turn and sending a fresh message otherwise.
    pub fn submit_input(&self, kind: UserInputKind, step: Step, data: Option<Value>) {
        self.dispatch(Command::SubmitUserInput { kind, step, data });
    }

    pub fn add_waiting_message(&self, name: impl Into<String>) {
        self.dispatch(Command::AddWaitingMessage { name: name.into() });
    }

    pub fn stop_task(&self) {
        self.dispatch(Command::StopTask);
    }

    pub fn update_chat_settings(&self, values: Map<String, Value>) {
        self.dispatch(Command::UpdateChatSettings(values));
    }

    /// Invoke a server-side action and wait for its response.
    pub async fn call_action(&self, action: Action) -> Result<Option<String>, ActionError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Command::CallAction { action, tx });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ActionError::SessionClosed),
        }
    }

    /// Invoke a list-bound action and wait for its response.
    pub async fn call_list_action(&self, action: Action) -> Result<Option<String>, ActionError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Command::CallListAction { action, tx });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ActionError::SessionClosed),
        }
    }

    pub fn call_predefined_procedure(&self, data: Value) {
        self.dispatch(Command::CallPredefinedProcedure(data));
    }

    pub fn reply_call_fn(&self, result: Value) {
        self.dispatch(Command::ReplyCallFn(result));
    }

    pub fn reply_gather(&self, response: GatherCommandResponse) {
        self.dispatch(Command::ReplyGather(response));
    }

    /// Reset all state under a fresh session id and notify the server.
    pub fn clear_session(&self) {
        self.send(SessionCommand::ClearSession);
    }

    /// Upload a file over the HTTP side-channel. Runs in the background;
    /// the handle cancels or awaits it.
    pub fn upload_file(
        &self,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        content: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> UploadHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let side_channel = self.side_channel.clone();
        let session_id = self.state.lock().session_id.clone();
        let file_name = file_name.into();
        let mime = mime.into();
        let task = tokio::spawn(async move {
            side_channel
                .upload_file(&session_id, &file_name, &mime, content, progress, token)
                .await
        });
        UploadHandle { cancel, task }
    }

    fn dispatch(&self, command: Command) {
        self.send(SessionCommand::Dispatch(command));
    }

    fn send(&self, command: SessionCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::debug!("session loop is gone, command dropped");
        }
    }
}

/// A background upload in flight.
pub struct UploadHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<FileRef, SideChannelError>>,
}

impl UploadHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<FileRef, SideChannelError> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(SideChannelError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::MockTransport;
    use crate::session::transport::{HandshakeMetadata, InboundFrame};
    use crate::session::NoopCollaborators;
    use serde_json::json;
    use std::time::Duration;

    fn connect(client: &ChatClient) {
        client.connect(ConnectParams {
            endpoint: "http://host".to_string(),
            metadata: HandshakeMetadata::default(),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn send_message_lands_in_the_log_and_on_the_wire() {
        let (transport, _inbound) = MockTransport::new();
        let sent = transport.sent();
        let client = ChatClient::spawn("http://host", transport, NoopCollaborators);
        connect(&client);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let step = client.send_message("user", "hello");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(client.state().lock().log.contains(&step.id));
        assert!(sent
            .lock()
            .unwrap()
            .iter()
            .any(|frame| matches!(frame, crate::protocol::Outgoing::Event { name: "ui_message", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn call_action_awaits_the_server_response() {
        let (transport, inbound) = MockTransport::new();
        let client = ChatClient::spawn("http://host", transport, NoopCollaborators);
        connect(&client);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let action: Action =
            serde_json::from_value(json!({ "id": "a1", "name": "lookup" })).unwrap();
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.call_action(action).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        inbound
            .send(InboundFrame {
                event: "action_response".to_string(),
                payload: json!({ "id": "a1", "status": true, "response": "done" }),
                ack: None,
            })
            .unwrap();

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result.as_deref(), Some("done"));
    }
}
