//! Out-of-band artifacts attached to steps or displayed independently.

use serde::{Deserialize, Serialize};

/// Kind of an element payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Html,
    Image,
    Text,
    Pdf,
    Audio,
    Video,
    File,
    Plotly,
    #[serde(rename = "previewinfogroup")]
    PreviewInfoGroup,
    Avatar,
    Tasklist,
}

/// Where an element renders relative to its owning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementDisplay {
    Inline,
    Side,
    Page,
}

/// Which registry partition an element belongs to. Avatars and tasklists are
/// displayed independently; everything else attaches to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPartition {
    Avatar,
    Tasklist,
    Inline,
}

/// An addressable artifact: avatar, tasklist, or a step attachment
/// (html/image/text/pdf/audio/video/file/plotly/preview group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Owning step id, when attached to a step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Direct remote URL, if the server already resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Opaque storage key, resolvable to a URL against the HTTP endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<ElementDisplay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Inline content or content URL for html elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl Element {
    pub fn partition(&self) -> ElementPartition {
        match self.element_type {
            ElementType::Avatar => ElementPartition::Avatar,
            ElementType::Tasklist => ElementPartition::Tasklist,
            _ => ElementPartition::Inline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_decodes_wire_shape() {
        let raw = serde_json::json!({
            "id": "el-1",
            "type": "image",
            "forId": "s1",
            "name": "chart",
            "display": "inline",
            "storageKey": "abc123"
        });
        let el: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(el.element_type, ElementType::Image);
        assert_eq!(el.for_id.as_deref(), Some("s1"));
        assert_eq!(el.storage_key.as_deref(), Some("abc123"));
        assert_eq!(el.partition(), ElementPartition::Inline);
    }

    #[test]
    fn avatar_and_tasklist_partition_separately() {
        let raw = serde_json::json!({ "id": "a", "type": "avatar", "name": "bot" });
        let el: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(el.partition(), ElementPartition::Avatar);

        let raw = serde_json::json!({ "id": "t", "type": "tasklist" });
        let el: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(el.partition(), ElementPartition::Tasklist);
    }

    #[test]
    fn preview_info_group_tag() {
        let raw = serde_json::json!({ "id": "p", "type": "previewinfogroup" });
        let el: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(el.element_type, ElementType::PreviewInfoGroup);
    }
}
