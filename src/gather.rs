//! Structured command channel, separate from the message turn flow.

use crate::protocol::{AckHandle, GatherCommandResponse, GatherCommandSpec, Step};
use serde_json::Value;

/// The one gather command currently awaiting a device-side result.
#[derive(Debug)]
pub struct ActiveGather {
    pub spec: GatherCommandSpec,
    /// Optional prompt step shown alongside the command surface.
    pub prompt: Option<Step>,
    ack: Option<AckHandle>,
}

/// Single-slot channel for structured commands. A new command replaces the
/// previous one; the superseded continuation is dropped unanswered.
#[derive(Debug, Default)]
pub struct GatherChannel {
    current: Option<ActiveGather>,
}

impl GatherChannel {
    pub fn new() -> Self {
        GatherChannel::default()
    }

    pub fn activate(&mut self, spec: GatherCommandSpec, prompt: Option<Step>, ack: Option<AckHandle>) {
        if self.current.is_some() {
            tracing::debug!(?spec, "gather command superseded an active one");
        }
        self.current = Some(ActiveGather { spec, prompt, ack });
    }

    /// Send the result back and clear the slot. A resolve with no active
    /// command is a benign race with a timeout or clear.
    pub fn resolve(&mut self, response: GatherCommandResponse) -> bool {
        let Some(active) = self.current.take() else {
            tracing::debug!("gather result with no active command ignored");
            return false;
        };
        if let Some(ack) = active.ack {
            match serde_json::to_value(&response) {
                Ok(payload) => ack.respond(payload),
                Err(error) => tracing::warn!(%error, "gather response failed to serialize"),
            }
        }
        true
    }

    /// Resolve with whatever raw payload the caller built. Used when the
    /// device surface produces its own wire shape.
    pub fn resolve_raw(&mut self, payload: Value) -> bool {
        let Some(active) = self.current.take() else {
            tracing::debug!("gather result with no active command ignored");
            return false;
        };
        if let Some(ack) = active.ack {
            ack.respond(payload);
        }
        true
    }

    /// Drop the active command without answering. Used for server timeouts
    /// and clears.
    pub fn deactivate(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ActiveGather> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
