//! Client-to-server frames and the one-shot acknowledgement handle.

use super::spec::Action;
use super::step::Step;
use serde_json::{json, Map, Value};
use std::fmt;
use tokio::sync::mpsc;

/// A frame headed for the server: either a named event or an acknowledgement
/// answering a server-initiated solicitation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Event { name: &'static str, payload: Value },
    Ack { id: u64, payload: Value },
}

impl Outgoing {
    pub fn event(name: &'static str, payload: Value) -> Self {
        Outgoing::Event { name, payload }
    }

    /// Sent right after the socket connects.
    pub fn connection_successful() -> Self {
        Outgoing::event("connection_successful", Value::Null)
    }

    /// A free chat message.
    pub fn ui_message(message: &Step) -> Self {
        Outgoing::event("ui_message", json!({ "message": message }))
    }

    pub fn chat_settings_change(values: &Map<String, Value>) -> Self {
        Outgoing::event("chat_settings_change", Value::Object(values.clone()))
    }

    /// Abort the in-flight agent turn.
    pub fn stop() -> Self {
        Outgoing::event("stop", Value::Null)
    }

    pub fn action_call(action: &Action) -> Self {
        Outgoing::event("action_call", json!(action))
    }

    pub fn list_action_call(action: &Action) -> Self {
        Outgoing::event("list_action_call", json!(action))
    }

    pub fn predefined_procedure_call(data: Value) -> Self {
        Outgoing::event("predefined_procedure_call", data)
    }

    pub fn clear_session() -> Self {
        Outgoing::event("clear_session", Value::Null)
    }
}

/// One-shot continuation for a server solicitation.
///
/// Consuming `respond` makes "invoke exactly once" structural: the handle is
/// moved out of the owning obligation before replying, and a dropped handle
/// simply never answers (the server times the solicitation out on its own).
pub struct AckHandle {
    id: u64,
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl AckHandle {
    pub fn new(id: u64, tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        AckHandle { id, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Answer the solicitation. Send failure means the socket is already
    /// gone, which the server handles via its own timeout.
    pub fn respond(self, payload: Value) {
        if self.tx.send(Outgoing::Ack { id: self.id, payload }).is_err() {
            tracing::debug!(ack_id = self.id, "ack dropped, socket closed");
        }
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle").field("id", &self.id).finish()
    }
}
