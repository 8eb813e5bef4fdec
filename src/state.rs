//! Aggregate session state: everything the dispatch reducer reads and writes.

use crate::gather::GatherChannel;
use crate::protocol::PreselectionSpec;
use crate::store::{ElementRegistry, MessageLog};
use crate::turn::TurnArbiter;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

/// Socket lifecycle as the rest of the crate observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// `error` is set when the last connection attempt failed, as opposed to
    /// never having connected or having been closed deliberately.
    Disconnected { error: bool },
    Connecting,
    Connected,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected { error: false }
    }
}

/// Why an awaited action callback never produced a result.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{name}' failed")]
    Failed {
        name: String,
        message: Option<String>,
    },
    #[error("session closed before the action completed")]
    SessionClosed,
}

/// An action call awaiting its `action_response` / `list_action_response`.
#[derive(Debug)]
pub struct PendingAction {
    pub name: String,
    pub tx: oneshot::Sender<Result<Option<String>, ActionError>>,
}

/// A server-requested local procedure, kept until the server clears it or
/// the client replies through the stored acknowledgement.
#[derive(Debug)]
pub struct PendingCallFn {
    pub name: String,
    pub args: Value,
    pub ack: Option<crate::protocol::AckHandle>,
}

/// The whole client-side session picture. Owned by the session loop; shared
/// read access goes through [`StateHandle`].
#[derive(Debug, Default)]
pub struct ChatState {
    pub log: MessageLog,
    pub elements: ElementRegistry,
    pub turn: TurnArbiter,
    pub gather: GatherChannel,
    pub connection: ConnectionStatus,
    /// True between `task_start` and `task_end`.
    pub loading: bool,
    pub token_count: u64,
    pub first_interaction: Option<String>,
    /// Raw settings field descriptors, as sent by the server.
    pub chat_settings_inputs: Vec<Value>,
    pub chat_settings_values: Map<String, Value>,
    pub preselection: Option<PreselectionSpec>,
    pub call_fn: Option<PendingCallFn>,
    pub chat_profile: Option<String>,
    pub thread_id: Option<String>,
    pub session_id: String,
    pending_actions: HashMap<String, PendingAction>,
}

impl ChatState {
    pub fn new(session_id: impl Into<String>) -> Self {
        ChatState {
            session_id: session_id.into(),
            ..ChatState::default()
        }
    }

    /// Replace the settings schema and recompute values from each field's
    /// `initial`, discarding any user edits against the old schema.
    pub fn apply_chat_settings(&mut self, inputs: Vec<Value>) {
        self.chat_settings_values = default_settings_values(&inputs);
        self.chat_settings_inputs = inputs;
    }

    pub fn register_pending_action(&mut self, id: impl Into<String>, pending: PendingAction) {
        self.pending_actions.insert(id.into(), pending);
    }

    pub fn take_pending_action(&mut self, id: &str) -> Option<PendingAction> {
        self.pending_actions.remove(id)
    }

    /// Wipe everything tied to the old session and start over under a new
    /// session id. Awaited actions are failed, not left hanging.
    pub fn reset(&mut self, new_session_id: impl Into<String>) {
        for (_, pending) in self.pending_actions.drain() {
            let _ = pending.tx.send(Err(ActionError::SessionClosed));
        }
        self.log.clear();
        self.elements.clear();
        self.turn.clear();
        self.gather.deactivate();
        self.loading = false;
        self.token_count = 0;
        self.first_interaction = None;
        self.chat_settings_inputs.clear();
        self.chat_settings_values.clear();
        self.preselection = None;
        self.call_fn = None;
        self.thread_id = None;
        self.session_id = new_session_id.into();
    }
}

/// Settings values are seeded from each field descriptor's `initial`, keyed
/// by its `id`. Fields without either are skipped.
fn default_settings_values(inputs: &[Value]) -> Map<String, Value> {
    let mut values = Map::new();
    for input in inputs {
        let Some(id) = input.get("id").and_then(Value::as_str) else {
            continue;
        };
        let initial = input.get("initial").cloned().unwrap_or(Value::Null);
        values.insert(id.to_string(), initial);
    }
    values
}

/// Cloneable shared handle over the session state.
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<Mutex<ChatState>>);

impl StateHandle {
    pub fn new(state: ChatState) -> Self {
        StateHandle(Arc::new(Mutex::new(state)))
    }

    pub fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
