//! The reducer at the center of the crate.
//!
//! Every inbound server event and every client command funnels through
//! [`dispatch`], which mutates [`ChatState`] and returns the side effects the
//! session loop must carry out. Keeping this a plain function over state and
//! input keeps the whole protocol surface testable without a socket.

use crate::protocol::{
    normalize_reply, Action, AckHandle, GatherCommandResponse, Outgoing, ServerEvent, Spec, Step,
    UiSettingsCommand, UserInputKind,
};
use crate::state::{ActionError, ChatState, PendingAction, PendingCallFn};
use crate::turn::FutureTurn;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

#[cfg(test)]
mod proptests;

/// Immutable per-connection context the reducer needs but does not own.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Base HTTP endpoint of the server, for derived resource URLs.
    pub http_endpoint: String,
}

impl SessionContext {
    /// URL of a stored element payload.
    pub fn element_url(&self, storage_key: &str, session_id: &str) -> String {
        format!(
            "{}/project/file/{storage_key}?session_id={session_id}",
            self.http_endpoint.trim_end_matches('/'),
        )
    }
}

/// One unit of work for the reducer.
pub enum Input {
    /// A decoded server push, with the acknowledgement handle when the frame
    /// solicited a reply.
    Server {
        event: ServerEvent,
        ack: Option<AckHandle>,
    },
    /// A client-originated command.
    Command(Command),
}

/// Client-originated operations.
pub enum Command {
    /// Send a fresh chat message, ignoring any pending obligation.
    SendMessage(Step),
    /// Submit user input, routed by the turn pointer: answers the pending
    /// obligation when one holds the turn, otherwise sends a fresh message.
    SubmitUserInput {
        kind: UserInputKind,
        step: Step,
        data: Option<Value>,
    },
    /// Show the typing-indicator placeholder until the next real step.
    AddWaitingMessage { name: String },
    /// Abort the in-flight agent turn.
    StopTask,
    /// Merge edited settings values and push them to the server.
    UpdateChatSettings(Map<String, Value>),
    CallAction {
        action: Action,
        tx: oneshot::Sender<Result<Option<String>, ActionError>>,
    },
    CallListAction {
        action: Action,
        tx: oneshot::Sender<Result<Option<String>, ActionError>>,
    },
    /// Run a server-side predefined procedure (picked suggestion, shortcut).
    CallPredefinedProcedure(Value),
    /// Answer the pending `call_fn` request.
    ReplyCallFn(Value),
    /// Answer the active gather command.
    ReplyGather(GatherCommandResponse),
    /// Tear the session down and start over under a new session id.
    ClearSession { new_session_id: String },
}

/// Work the session loop must do on the reducer's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Send a frame to the server.
    Emit(Outgoing),
    /// Hand text to the text-to-speech collaborator.
    Speak(String),
    /// Cut off any in-flight speech playback.
    AbortSpeech,
    /// Forward a presentation command (theme, font size).
    UiSettings(UiSettingsCommand),
    /// Ask the host to run a named local function.
    InvokeFn { name: String, args: Value },
    /// The server requested a full client reload.
    Reload,
}

/// Fold one input into the state, returning the side effects to run.
pub fn dispatch(state: &mut ChatState, ctx: &SessionContext, input: Input) -> Vec<SideEffect> {
    let mut effects = Vec::new();
    match input {
        Input::Server { event, ack } => handle_event(state, ctx, event, ack, &mut effects),
        Input::Command(command) => handle_command(state, command, &mut effects),
    }
    effects
}

fn handle_event(
    state: &mut ChatState,
    ctx: &SessionContext,
    event: ServerEvent,
    ack: Option<AckHandle>,
    effects: &mut Vec<SideEffect>,
) {
    match event {
        ServerEvent::TaskStart => {
            state.loading = true;
        }
        ServerEvent::TaskEnd => {
            state.loading = false;
            state.log.remove_waiting();
        }
        ServerEvent::Reload => {
            // A reload abandons the server-side session too, so tell it
            // before wiping local state.
            effects.push(SideEffect::Emit(Outgoing::clear_session()));
            state.reset(uuid::Uuid::new_v4().to_string());
            effects.push(SideEffect::Reload);
        }
        ServerEvent::ResumeThread(snapshot) => {
            state.log.clear();
            for step in snapshot.steps {
                state.log.append(step);
            }
            let session_id = state.session_id.clone();
            let elements = snapshot
                .elements
                .into_iter()
                .map(|mut element| {
                    fill_element_url(ctx, &session_id, &mut element);
                    element
                })
                .collect();
            state.elements.hydrate(elements);
            state.thread_id = snapshot.id;
            if let Some(metadata) = snapshot.metadata {
                state.chat_profile = metadata.chat_profile;
            }
        }
        ServerEvent::NewMessage { msg, spec } => {
            push_speech(&msg, effects);
            // A fresh message always hands the turn back to free composition;
            // a binding spec below moves it to `reply` again.
            state.turn.reset_future();
            match spec {
                Some(Spec::Preselection(preselection)) => {
                    state.log.append(msg);
                    state.preselection = Some(preselection);
                }
                Some(spec) => {
                    state.log.append(msg.clone());
                    state.turn.register(msg, Some(spec), ack);
                }
                None => state.log.append(msg),
            }
        }
        ServerEvent::FirstInteraction(interaction) => {
            state.first_interaction = Some(interaction);
        }
        ServerEvent::UpdateMessage(msg) => {
            state.log.update_by_id(&msg.id.clone(), msg);
        }
        ServerEvent::DeleteMessage(msg) => {
            push_speech(&msg, effects);
            state.log.delete_by_id(&msg.id);
        }
        ServerEvent::StreamStart(mut msg) => {
            msg.streaming = true;
            state.log.append(msg);
        }
        ServerEvent::StreamToken(token) => {
            state
                .log
                .patch_content(&token.id, &token.token, token.is_sequence);
        }
        ServerEvent::Ask { msg, spec } | ServerEvent::Input { msg, spec } => {
            // The agent is waiting on the user now, not working.
            state.loading = false;
            push_speech(&msg, effects);
            state.log.append(msg.clone());
            state.turn.register(msg, Some(spec), ack);
        }
        ServerEvent::AskTimeout { id } | ServerEvent::InputTimeout { id } => {
            state.loading = false;
            state.turn.expire(&id);
        }
        ServerEvent::UpdateInput { msg, spec } => {
            // A revision is a full re-solicitation. It carries its own
            // continuation and pulls the turn pointer back onto this step.
            state.loading = false;
            push_speech(&msg, effects);
            state.log.update_by_id(&msg.id.clone(), msg.clone());
            state.turn.register(msg, Some(spec), ack);
        }
        ServerEvent::ClearInput { id } => {
            state.turn.expire(&id);
        }
        ServerEvent::GatherCommand { msg, spec } => {
            state.log.remove_waiting();
            if let Some(prompt) = &msg {
                push_speech(prompt, effects);
            }
            state.gather.activate(spec, msg, ack);
        }
        ServerEvent::GatherCommandTimeout | ServerEvent::ClearGatherCommand => {
            state.gather.deactivate();
        }
        ServerEvent::CallFn { name, args } => {
            state.call_fn = Some(PendingCallFn {
                name: name.clone(),
                args: args.clone(),
                ack,
            });
            effects.push(SideEffect::InvokeFn { name, args });
        }
        ServerEvent::ClearCallFn | ServerEvent::CallFnTimeout => {
            state.call_fn = None;
        }
        ServerEvent::ChatSettings(inputs) => {
            state.apply_chat_settings(inputs);
        }
        ServerEvent::Element(mut element) => {
            let session_id = state.session_id.clone();
            fill_element_url(ctx, &session_id, &mut element);
            state.elements.upsert(element);
        }
        ServerEvent::RemoveElement { id } => {
            state.elements.remove(&id);
        }
        ServerEvent::TokenUsage(count) => {
            state.token_count = state.token_count.saturating_add(count);
        }
        ServerEvent::ChangeTheme(command) => {
            effects.push(SideEffect::UiSettings(command));
        }
        // Advisory only: never registers an obligation, never moves the
        // turn pointer.
        ServerEvent::Advise { msg, spec } => match spec {
            Spec::Preselection(preselection) => {
                state.preselection = Some(preselection);
            }
            Spec::Message(_) => {
                push_speech(&msg, effects);
                state.log.append(msg);
            }
            other => {
                tracing::debug!(spec = ?other, "binding spec on advisory channel dropped");
            }
        },
        ServerEvent::ClearInputAdvise => {
            state.preselection = None;
        }
        ServerEvent::ActionResponse(response) | ServerEvent::ListActionResponse(response) => {
            let Some(pending) = state.take_pending_action(&response.id) else {
                tracing::debug!(action_id = %response.id, "response for unknown action call");
                return;
            };
            let result = if response.status {
                Ok(response.response)
            } else {
                Err(ActionError::Failed {
                    name: pending.name,
                    message: response.response,
                })
            };
            let _ = pending.tx.send(result);
        }
    }
}

fn handle_command(state: &mut ChatState, command: Command, effects: &mut Vec<SideEffect>) {
    match command {
        Command::SendMessage(step) => {
            // Free chat is suspended while a structured command runs.
            if state.gather.is_active() {
                tracing::debug!("message suppressed, gather command active");
                return;
            }
            effects.push(SideEffect::AbortSpeech);
            state.preselection = None;
            effects.push(SideEffect::Emit(Outgoing::ui_message(&step)));
            state.log.append(step);
        }
        Command::SubmitUserInput { kind, step, data } => {
            effects.push(SideEffect::AbortSpeech);
            state.preselection = None;
            match state.turn.future().clone() {
                FutureTurn::Reply { parent } => {
                    let payload = normalize_reply(kind, &step, data.as_ref());
                    state.log.append(step);
                    state.turn.resolve(&parent, payload);
                }
                FutureTurn::Question => {
                    if kind == UserInputKind::Touch {
                        tracing::debug!("touch input with no pending choice ignored");
                        return;
                    }
                    if state.gather.is_active() {
                        tracing::debug!("message suppressed, gather command active");
                        return;
                    }
                    effects.push(SideEffect::Emit(Outgoing::ui_message(&step)));
                    state.log.append(step);
                }
            }
        }
        Command::AddWaitingMessage { name } => {
            state.log.append(Step::waiting(name));
        }
        Command::StopTask => {
            effects.push(SideEffect::AbortSpeech);
            effects.push(SideEffect::Emit(Outgoing::stop()));
            state.loading = false;
            state.log.remove_waiting();
        }
        Command::UpdateChatSettings(values) => {
            for (key, value) in values {
                state.chat_settings_values.insert(key, value);
            }
            effects.push(SideEffect::Emit(Outgoing::chat_settings_change(
                &state.chat_settings_values,
            )));
        }
        Command::CallAction { action, tx } => {
            state.register_pending_action(
                action.id.clone(),
                PendingAction {
                    name: action.name.clone(),
                    tx,
                },
            );
            effects.push(SideEffect::Emit(Outgoing::action_call(&action)));
        }
        Command::CallListAction { action, tx } => {
            state.register_pending_action(
                action.id.clone(),
                PendingAction {
                    name: action.name.clone(),
                    tx,
                },
            );
            effects.push(SideEffect::Emit(Outgoing::list_action_call(&action)));
        }
        Command::CallPredefinedProcedure(data) => {
            effects.push(SideEffect::AbortSpeech);
            state.preselection = None;
            effects.push(SideEffect::Emit(Outgoing::predefined_procedure_call(data)));
        }
        Command::ReplyCallFn(result) => {
            let Some(pending) = state.call_fn.take() else {
                tracing::debug!("call_fn reply with no pending request ignored");
                return;
            };
            if let Some(ack) = pending.ack {
                ack.respond(result);
            }
        }
        Command::ReplyGather(response) => {
            state.gather.resolve(response);
        }
        Command::ClearSession { new_session_id } => {
            effects.push(SideEffect::AbortSpeech);
            effects.push(SideEffect::Emit(Outgoing::clear_session()));
            state.reset(new_session_id);
        }
    }
}

fn push_speech(step: &Step, effects: &mut Vec<SideEffect>) {
    if let Some(content) = &step.speech_content {
        if !content.is_empty() {
            effects.push(SideEffect::Speak(content.clone()));
        }
    }
}

fn fill_element_url(ctx: &SessionContext, session_id: &str, element: &mut crate::protocol::Element) {
    if element.url.is_none() {
        if let Some(key) = &element.storage_key {
            element.url = Some(ctx.element_url(key, session_id));
        }
    }
}
