//! Server-to-client events: decode from (event name, JSON payload) into a
//! closed enum. Every name the server can push is handled here; an
//! unrecognized name is surfaced as a decode error rather than silently
//! swallowed, so protocol drift shows up in logs.

use super::element::Element;
use super::spec::{GatherCommandSpec, Spec, UiSettingsCommand};
use super::step::{Step, ThreadSnapshot};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Error decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("bad payload for '{event}': {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Streaming content patch, keyed by step id. `is_sequence` distinguishes
/// incremental token appends from a wholesale corrective resend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamToken {
    pub id: String,
    pub token: String,
    #[serde(rename = "isSequence", default)]
    pub is_sequence: bool,
}

/// `{ msg, spec }` envelope used by solicitation events.
#[derive(Debug, Clone, Deserialize)]
struct MsgSpec {
    msg: Step,
    spec: Spec,
}

/// `{ msg, spec }` envelope where the spec may be absent.
#[derive(Debug, Clone, Deserialize)]
struct MsgMaybeSpec {
    msg: Step,
    #[serde(default)]
    spec: Option<Spec>,
}

/// Envelope carrying only a step reference, used by timeout/clear events.
#[derive(Debug, Clone, Deserialize)]
struct MsgOnly {
    msg: StepRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GatherEnvelope {
    #[serde(default)]
    msg: Option<Step>,
    spec: GatherCommandSpec,
}

#[derive(Debug, Clone, Deserialize)]
struct CallFnEnvelope {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ThemeEnvelope {
    spec: UiSettingsCommand,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoveElementEnvelope {
    id: String,
}

/// Acknowledgement of an `action_call` / `list_action_call`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallResponse {
    pub id: String,
    pub status: bool,
    #[serde(default)]
    pub response: Option<String>,
}

/// A decoded server push.
#[derive(Debug)]
pub enum ServerEvent {
    TaskStart,
    TaskEnd,
    Reload,
    ResumeThread(ThreadSnapshot),
    NewMessage { msg: Step, spec: Option<Spec> },
    FirstInteraction(String),
    UpdateMessage(Step),
    DeleteMessage(Step),
    StreamStart(Step),
    StreamToken(StreamToken),
    Ask { msg: Step, spec: Spec },
    AskTimeout { id: String },
    Input { msg: Step, spec: Spec },
    InputTimeout { id: String },
    UpdateInput { msg: Step, spec: Spec },
    ClearInput { id: String },
    GatherCommand { msg: Option<Step>, spec: GatherCommandSpec },
    GatherCommandTimeout,
    ClearGatherCommand,
    CallFn { name: String, args: Value },
    ClearCallFn,
    CallFnTimeout,
    ChatSettings(Vec<Value>),
    Element(Element),
    RemoveElement { id: String },
    TokenUsage(u64),
    ChangeTheme(UiSettingsCommand),
    Advise { msg: Step, spec: Spec },
    ClearInputAdvise,
    ActionResponse(CallResponse),
    ListActionResponse(CallResponse),
}

impl ServerEvent {
    /// Decode a named event. Event names and payload field names are the
    /// wire contract and must match the server byte-for-byte.
    pub fn decode(event: &str, payload: Value) -> Result<ServerEvent, DecodeError> {
        fn parse<T: serde::de::DeserializeOwned>(
            event: &str,
            payload: Value,
        ) -> Result<T, DecodeError> {
            serde_json::from_value(payload).map_err(|source| DecodeError::Payload {
                event: event.to_string(),
                source,
            })
        }

        match event {
            "task_start" => Ok(ServerEvent::TaskStart),
            "task_end" => Ok(ServerEvent::TaskEnd),
            "reload" => Ok(ServerEvent::Reload),
            "resume_thread" => Ok(ServerEvent::ResumeThread(parse(event, payload)?)),
            "new_message" => {
                let env: MsgMaybeSpec = parse(event, payload)?;
                Ok(ServerEvent::NewMessage {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "first_interaction" => Ok(ServerEvent::FirstInteraction(parse(event, payload)?)),
            "update_message" => Ok(ServerEvent::UpdateMessage(parse(event, payload)?)),
            "delete_message" => Ok(ServerEvent::DeleteMessage(parse(event, payload)?)),
            "stream_start" => Ok(ServerEvent::StreamStart(parse(event, payload)?)),
            "stream_token" => Ok(ServerEvent::StreamToken(parse(event, payload)?)),
            "ask" => {
                let env: MsgSpec = parse(event, payload)?;
                Ok(ServerEvent::Ask {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "ask_timeout" => {
                let env: MsgOnly = parse(event, payload)?;
                Ok(ServerEvent::AskTimeout { id: env.msg.id })
            }
            "input" => {
                let env: MsgSpec = parse(event, payload)?;
                Ok(ServerEvent::Input {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "input_timeout" => {
                let env: MsgOnly = parse(event, payload)?;
                Ok(ServerEvent::InputTimeout { id: env.msg.id })
            }
            "update_input" => {
                let env: MsgSpec = parse(event, payload)?;
                Ok(ServerEvent::UpdateInput {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "clear_input" => {
                let env: MsgOnly = parse(event, payload)?;
                Ok(ServerEvent::ClearInput { id: env.msg.id })
            }
            "gather_command" => {
                let env: GatherEnvelope = parse(event, payload)?;
                Ok(ServerEvent::GatherCommand {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "gather_command_timeout" => Ok(ServerEvent::GatherCommandTimeout),
            "clear_gather_command" => Ok(ServerEvent::ClearGatherCommand),
            "call_fn" => {
                let env: CallFnEnvelope = parse(event, payload)?;
                Ok(ServerEvent::CallFn {
                    name: env.name,
                    args: env.args,
                })
            }
            "clear_call_fn" => Ok(ServerEvent::ClearCallFn),
            "call_fn_timeout" => Ok(ServerEvent::CallFnTimeout),
            "chat_settings" => Ok(ServerEvent::ChatSettings(parse(event, payload)?)),
            "element" => Ok(ServerEvent::Element(parse(event, payload)?)),
            "remove_element" => {
                let env: RemoveElementEnvelope = parse(event, payload)?;
                Ok(ServerEvent::RemoveElement { id: env.id })
            }
            "token_usage" => Ok(ServerEvent::TokenUsage(parse(event, payload)?)),
            "change_theme" => {
                let env: ThemeEnvelope = parse(event, payload)?;
                Ok(ServerEvent::ChangeTheme(env.spec))
            }
            "advise" => {
                let env: MsgSpec = parse(event, payload)?;
                Ok(ServerEvent::Advise {
                    msg: env.msg,
                    spec: env.spec,
                })
            }
            "clear_input_advise" => Ok(ServerEvent::ClearInputAdvise),
            "action_response" => Ok(ServerEvent::ActionResponse(parse(event, payload)?)),
            "list_action_response" => Ok(ServerEvent::ListActionResponse(parse(event, payload)?)),
            other => Err(DecodeError::UnknownEvent(other.to_string())),
        }
    }
}
