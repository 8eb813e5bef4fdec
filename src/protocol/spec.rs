//! Request specs: the tagged payloads describing what kind of response a
//! solicitation expects, plus the reply shapes the server accepts back.
//!
//! On the wire every spec carries a `__type__` discriminant; here that maps
//! to a closed sum type matched exhaustively, never by field sniffing.

use super::step::Step;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Result code meaning a gather command completed successfully. Any other
/// code signals cancel/failure; that is normal protocol flow, not an error.
pub const GATHER_SUCCESS_CODE: &str = "00";

// ============================================================================
// Shared spec building blocks
// ============================================================================

/// A markdown link rendered through a custom HTML fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdLink {
    pub data: String,
    pub src: String,
    pub display: String,
}

/// One entry of a generic display list. `data` is echoed back as context
/// when the user picks the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub data: Value,
    pub src: String,
    pub display: String,
}

/// A labelled button widget attached to a choice list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonWidget {
    #[serde(rename = "__type__")]
    pub widget_type: String,
    pub label: String,
    pub data: Value,
}

/// An action button bound to a named server-side callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub for_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// Spec variants
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreselectionKind {
    /// Suggested next messages; picking one runs a predefined procedure.
    Message,
    /// Prompt hints shown inside the input box.
    Input,
}

/// Items of a preselection list: input hints carry only a label, message
/// suggestions are full list items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreselectionItem {
    Message(ListItem),
    Input { label: String },
}

/// Non-binding hint list. Never changes turn ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreselectionSpec {
    #[serde(rename = "type")]
    pub kind: PreselectionKind,
    #[serde(default)]
    pub items: Vec<PreselectionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

/// A list the user must pick from, with an answer deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceSpec {
    pub timeout: u32,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<ButtonWidget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

/// Plain message decoration: optional action buttons and md links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputFieldType {
    #[default]
    Text,
    Number,
}

/// A directed input field (text or number) with client/server validation
/// rules. Rules are opaque to the core; the input surface interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub timeout: u32,
    #[serde(rename = "type", default)]
    pub field_type: InputFieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

/// What shape of answer an ask expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AskResponseKind {
    #[default]
    Text,
    File,
    Action,
    ChoiceAction,
}

/// A question that must be answered (or time out) before the agent resumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskSpec {
    pub timeout: u32,
    #[serde(rename = "type", default)]
    pub response: AskResponseKind,
    /// File-answer constraints, present when `response` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

/// An ask gated on an agreement checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    pub timeout: u32,
    #[serde(default)]
    pub md_agreement_links: Vec<MdLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_links: Option<Vec<MdLink>>,
}

/// The closed union of request specs, discriminated by `__type__`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum Spec {
    #[serde(rename = "PreselectionSpec")]
    Preselection(PreselectionSpec),
    #[serde(rename = "ChoiceSpec")]
    Choice(ChoiceSpec),
    #[serde(rename = "AskSpec")]
    Ask(AskSpec),
    #[serde(rename = "InputSpec")]
    Input(InputSpec),
    #[serde(rename = "MessageSpec")]
    Message(MessageSpec),
    #[serde(rename = "CheckSpec")]
    Check(CheckSpec),
}

impl Spec {
    /// Whether this spec solicits a direct answer. Binding specs move the
    /// turn pointer to `reply`; advisory ones leave it at `question`.
    pub fn expects_reply(&self) -> bool {
        match self {
            Spec::Ask(_) | Spec::Input(_) | Spec::Choice(_) | Spec::Check(_) => true,
            Spec::Message(_) | Spec::Preselection(_) => false,
        }
    }
}

// ============================================================================
// Reply shapes
// ============================================================================

/// How the user produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInputKind {
    Keyboard,
    Speech,
    Touch,
}

impl UserInputKind {
    /// Wire tag of the input-response shape.
    fn response_tag(self) -> &'static str {
        match self {
            UserInputKind::Keyboard => "input",
            UserInputKind::Speech => "asr_res",
            UserInputKind::Touch => "click",
        }
    }
}

/// Normalize a reply for the obligation callback.
///
/// Keyboard and speech replies carry the reply step's text in the
/// input-response shape; touch replies pass the picked item's `data`
/// straight through.
pub fn normalize_reply(kind: UserInputKind, step: &Step, data: Option<&Value>) -> Value {
    match kind {
        UserInputKind::Touch => json!({
            "data": data.cloned().unwrap_or(Value::Null),
            "type": "touch",
        }),
        UserInputKind::Keyboard | UserInputKind::Speech => json!({
            "id": step.id,
            "type": kind.response_tag(),
            "forId": "",
            "value": step.output,
        }),
    }
}

// ============================================================================
// Gather commands
// ============================================================================

/// Device-style structured command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherCommandKind {
    CaptureIdcard,
    FaceRecognition,
    Password,
    CustomCard,
    Scan,
}

/// Spec of a structured command session. At most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherCommandSpec {
    pub timeout: u32,
    #[serde(rename = "type")]
    pub command: GatherCommandKind,
}

/// Reply to a gather command: the spec fields plus a result code, a free-form
/// message, and a payload bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherCommandResponse {
    pub timeout: u32,
    #[serde(rename = "type")]
    pub command: GatherCommandKind,
    pub code: String,
    pub msg: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl GatherCommandResponse {
    pub fn success(spec: GatherCommandSpec, data: Map<String, Value>) -> Self {
        GatherCommandResponse {
            timeout: spec.timeout,
            command: spec.command,
            code: GATHER_SUCCESS_CODE.to_string(),
            msg: String::new(),
            data,
        }
    }

    pub fn cancelled(spec: GatherCommandSpec, code: impl Into<String>, msg: impl Into<String>) -> Self {
        GatherCommandResponse {
            timeout: spec.timeout,
            command: spec.command,
            code: code.into(),
            msg: msg.into(),
            data: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == GATHER_SUCCESS_CODE
    }
}

// ============================================================================
// UI settings commands
// ============================================================================

/// Presentation-layer command pushed by the server (theme/font changes).
/// The core only forwards these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettingsCommand {
    pub name: UiSettingsFn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiSettingsFn {
    DarkStyle,
    LightStyle,
    AddFontSize,
    ReduceFontSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::step::Step;

    #[test]
    fn spec_discriminates_on_dunder_type() {
        let raw = serde_json::json!({
            "__type__": "AskSpec",
            "timeout": 30,
            "type": "text"
        });
        let spec: Spec = serde_json::from_value(raw).unwrap();
        match &spec {
            Spec::Ask(ask) => {
                assert_eq!(ask.timeout, 30);
                assert_eq!(ask.response, AskResponseKind::Text);
            }
            other => panic!("expected AskSpec, got {other:?}"),
        }
        assert!(spec.expects_reply());

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back.get("__type__").unwrap(), "AskSpec");
    }

    #[test]
    fn message_and_preselection_are_advisory() {
        let msg = Spec::Message(MessageSpec::default());
        assert!(!msg.expects_reply());

        let raw = serde_json::json!({
            "__type__": "PreselectionSpec",
            "type": "input",
            "items": [{ "label": "balance" }, { "label": "transfer" }]
        });
        let spec: Spec = serde_json::from_value(raw).unwrap();
        assert!(!spec.expects_reply());
        match spec {
            Spec::Preselection(ps) => {
                assert_eq!(ps.kind, PreselectionKind::Input);
                assert_eq!(ps.items.len(), 2);
            }
            other => panic!("expected PreselectionSpec, got {other:?}"),
        }
    }

    #[test]
    fn check_spec_carries_agreement_links() {
        let raw = serde_json::json!({
            "__type__": "CheckSpec",
            "timeout": 60,
            "mdAgreementLinks": [
                { "data": "terms", "src": "<p>terms</p>", "display": "drawer" }
            ]
        });
        let spec: Spec = serde_json::from_value(raw).unwrap();
        match spec {
            Spec::Check(check) => assert_eq!(check.md_agreement_links.len(), 1),
            other => panic!("expected CheckSpec, got {other:?}"),
        }
    }

    #[test]
    fn keyboard_reply_uses_input_response_shape() {
        let mut step = Step::user_message("user", "blue");
        step.id = "reply-1".to_string();
        let payload = normalize_reply(UserInputKind::Keyboard, &step, None);
        assert_eq!(
            payload,
            serde_json::json!({
                "id": "reply-1",
                "type": "input",
                "forId": "",
                "value": "blue",
            })
        );
    }

    #[test]
    fn touch_reply_passes_data_through() {
        let step = Step::user_message("user", "");
        let data = serde_json::json!({ "card": 2 });
        let payload = normalize_reply(UserInputKind::Touch, &step, Some(&data));
        assert_eq!(payload, serde_json::json!({ "data": { "card": 2 }, "type": "touch" }));
    }

    #[test]
    fn gather_response_codes() {
        let spec = GatherCommandSpec {
            timeout: 60,
            command: GatherCommandKind::Password,
        };
        let ok = GatherCommandResponse::success(spec, Map::new());
        assert!(ok.is_success());
        let no = GatherCommandResponse::cancelled(spec, "01", "user cancelled");
        assert!(!no.is_success());

        let wire = serde_json::to_value(&ok).unwrap();
        assert_eq!(wire.get("type").unwrap(), "password");
        assert_eq!(wire.get("code").unwrap(), "00");
    }
}
