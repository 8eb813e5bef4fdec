//! Turn arbitration: which solicitations are outstanding and who acts next.

use crate::protocol::{AckHandle, Spec, Step};
use serde_json::Value;
use std::collections::HashMap;

/// Process-wide pointer for the next user action: compose a fresh question,
/// or reply to a specific pending obligation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FutureTurn {
    #[default]
    Question,
    Reply {
        parent: String,
    },
}

/// A step that has solicited a response and may still be awaiting one.
#[derive(Debug)]
pub struct Obligation {
    /// False once answered, cancelled, or timed out. Terminal: an obligation
    /// is never reactivated.
    pub active: bool,
    pub step: Step,
    pub spec: Option<Spec>,
    ack: Option<AckHandle>,
}

/// The single source of truth for outstanding obligations and the turn
/// pointer. Replying to a stale or unknown obligation is an expected race
/// with the network, not a fault: it is logged and dropped.
#[derive(Debug, Default)]
pub struct TurnArbiter {
    obligations: HashMap<String, Obligation>,
    future: FutureTurn,
}

impl TurnArbiter {
    pub fn new() -> Self {
        TurnArbiter::default()
    }

    /// Record a solicitation. A binding spec (one that expects a direct
    /// answer) moves the turn pointer to `reply` targeting this step; an
    /// advisory one resets it to `question`. A later solicitation always
    /// supersedes the pointer — obligations are not queued.
    pub fn register(&mut self, step: Step, spec: Option<Spec>, ack: Option<AckHandle>) {
        let id = step.id.clone();
        let binding = spec.as_ref().is_some_and(Spec::expects_reply);
        self.obligations.insert(
            id.clone(),
            Obligation {
                active: true,
                step,
                spec,
                ack,
            },
        );
        self.future = if binding {
            FutureTurn::Reply { parent: id }
        } else {
            FutureTurn::Question
        };
    }

    /// Hand the turn back to free composition without touching obligations.
    pub fn reset_future(&mut self) {
        self.future = FutureTurn::Question;
    }

    /// Answer an obligation with a normalized payload. The continuation fires
    /// at most once; answering an inactive or unknown obligation is a benign
    /// no-op. The pointer resets to `question` either way once dispatched.
    pub fn resolve(&mut self, step_id: &str, payload: Value) -> bool {
        let Some(obligation) = self.obligations.get_mut(step_id) else {
            tracing::debug!(step_id = %step_id, "reply to unknown obligation ignored");
            return false;
        };
        if !obligation.active {
            tracing::debug!(step_id = %step_id, "reply to inactive obligation ignored");
            return false;
        }
        obligation.active = false;
        if let Some(ack) = obligation.ack.take() {
            ack.respond(payload);
        }
        self.future = FutureTurn::Question;
        true
    }

    /// Deactivate without answering. Used for server-driven timeouts and
    /// clears; the server already knows, so the continuation is dropped.
    pub fn expire(&mut self, step_id: &str) {
        if let Some(obligation) = self.obligations.get_mut(step_id) {
            obligation.active = false;
            obligation.ack = None;
        } else {
            tracing::debug!(step_id = %step_id, "timeout for unknown obligation");
        }
        self.future = FutureTurn::Question;
    }

    pub fn future(&self) -> &FutureTurn {
        &self.future
    }

    pub fn get(&self, step_id: &str) -> Option<&Obligation> {
        self.obligations.get(step_id)
    }

    pub fn is_active(&self, step_id: &str) -> bool {
        self.get(step_id).is_some_and(|o| o.active)
    }

    pub fn clear(&mut self) {
        self.obligations.clear();
        self.future = FutureTurn::Question;
    }

    /// Pointer invariant: a `reply` pointer always targets an active
    /// obligation.
    #[cfg(test)]
    pub fn check_invariant(&self) -> bool {
        match &self.future {
            FutureTurn::Question => true,
            FutureTurn::Reply { parent } => self.is_active(parent),
        }
    }
}
