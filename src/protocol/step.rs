//! Conversation steps: the nodes of the message tree.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synthetic id used for the waiting placeholder. Never persisted server-side.
pub const WAITING_STEP_ID: &str = "virtual";

/// Kind of a conversation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    UserMessage,
    AssistantMessage,
    SystemMessage,
    Run,
    Tool,
    Llm,
    Embedding,
    Retrieval,
    Rerank,
    /// Synthetic placeholder shown while awaiting the next real step.
    Waiting,
    #[default]
    Undefined,
}

/// Wire timestamps arrive as either epoch millis or an ISO string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Text(String::new())
    }
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::Text(Utc::now().to_rfc3339())
    }
}

/// A node in the conversation tree: a message, tool call, or nested sub-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Non-owning back-reference; children are owned by `steps` on the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_answer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Accumulated text. Mutable while `streaming` is set.
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
    /// Opaque generation metadata (settings, functions, tools).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Value>,
    /// Owned children, same shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
    /// Side payload forwarded to the text-to-speech collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_content: Option<String>,
}

impl Step {
    /// A client-originated free-chat message.
    pub fn user_message(name: impl Into<String>, output: impl Into<String>) -> Self {
        Step {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            step_type: StepType::UserMessage,
            output: output.into(),
            created_at: Timestamp::now(),
            ..Step::empty()
        }
    }

    /// The synthetic typing-indicator placeholder.
    pub fn waiting(name: impl Into<String>) -> Self {
        Step {
            id: WAITING_STEP_ID.to_string(),
            name: name.into(),
            step_type: StepType::Waiting,
            output: "loading".to_string(),
            ..Step::empty()
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.step_type == StepType::Waiting
    }

    fn empty() -> Self {
        Step {
            id: String::new(),
            name: String::new(),
            step_type: StepType::Undefined,
            thread_id: None,
            parent_id: None,
            is_error: None,
            wait_for_answer: None,
            input: None,
            output: String::new(),
            created_at: Timestamp::default(),
            start: None,
            end: None,
            language: None,
            streaming: false,
            generation: None,
            steps: None,
            speech_content: None,
        }
    }
}

/// A full thread snapshot, enough to reconstruct the message log and element
/// registry without any other event history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub elements: Vec<super::Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ThreadMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_profile: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_type_uses_snake_case_on_the_wire() {
        let json = serde_json::to_value(StepType::AssistantMessage).unwrap();
        assert_eq!(json, serde_json::json!("assistant_message"));
    }

    #[test]
    fn step_round_trips_camel_case_fields() {
        let raw = serde_json::json!({
            "id": "s1",
            "name": "Assistant",
            "type": "assistant_message",
            "parentId": "s0",
            "output": "hello",
            "createdAt": "2024-01-01T00:00:00Z",
            "speechContent": "hello",
            "steps": [{ "id": "s2", "type": "tool", "output": "" }]
        });
        let step: Step = serde_json::from_value(raw).unwrap();
        assert_eq!(step.parent_id.as_deref(), Some("s0"));
        assert_eq!(step.speech_content.as_deref(), Some("hello"));
        assert_eq!(step.steps.as_ref().unwrap().len(), 1);

        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back.get("parentId").unwrap(), "s0");
        assert!(back.get("parent_id").is_none());
    }

    #[test]
    fn waiting_placeholder_shape() {
        let w = Step::waiting("Assistant");
        assert_eq!(w.id, WAITING_STEP_ID);
        assert!(w.is_waiting());
        assert_eq!(w.output, "loading");
    }

    #[test]
    fn timestamp_accepts_millis_and_text() {
        let t: Timestamp = serde_json::from_value(serde_json::json!(1700000000000i64)).unwrap();
        assert_eq!(t, Timestamp::Millis(1_700_000_000_000));
        let t: Timestamp = serde_json::from_value(serde_json::json!("2024-01-01")).unwrap();
        assert_eq!(t, Timestamp::Text("2024-01-01".to_string()));
    }
}
