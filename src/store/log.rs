//! Ordered, patch-capable store of conversation steps.

use crate::protocol::Step;

/// The conversation tree in display order. Insertion order is display order;
/// steps are never reordered after insertion except to splice children under
/// their parent.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    steps: Vec<Step>,
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog::default()
    }

    /// Insert a step at the tail (or nest it under its parent).
    ///
    /// Any waiting placeholder is removed first: only one placeholder may
    /// precede the next real step, and a real step replaces it. A step whose
    /// id is already present updates that step instead of duplicating it.
    pub fn append(&mut self, step: Step) {
        self.remove_waiting();
        if self.contains(&step.id) {
            self.update_by_id(&step.id.clone(), step);
            return;
        }
        if let Some(parent_id) = step.parent_id.clone() {
            if let Some(parent) = find_mut(&mut self.steps, &parent_id) {
                parent.steps.get_or_insert_with(Vec::new).push(step);
                return;
            }
        }
        self.steps.push(step);
    }

    /// Merge a patch into the step with this id. Children survive unless the
    /// patch carries its own. Returns false when the id is absent.
    pub fn update_by_id(&mut self, id: &str, patch: Step) -> bool {
        let Some(existing) = find_mut(&mut self.steps, id) else {
            return false;
        };
        let children = existing.steps.take();
        *existing = patch;
        if existing.steps.is_none() {
            existing.steps = children;
        }
        true
    }

    /// Apply a streaming content patch: append the token when `is_sequence`,
    /// otherwise replace the output wholesale.
    pub fn patch_content(&mut self, id: &str, token: &str, is_sequence: bool) -> bool {
        let Some(step) = find_mut(&mut self.steps, id) else {
            tracing::debug!(step_id = %id, "stream token for unknown step dropped");
            return false;
        };
        if is_sequence {
            step.output.push_str(token);
        } else {
            step.output = token.to_string();
        }
        step.streaming = true;
        true
    }

    /// Remove the step with this id (wherever it nests), returning it so the
    /// caller can surface pending side payloads before the step is gone.
    pub fn delete_by_id(&mut self, id: &str) -> Option<Step> {
        remove_from(&mut self.steps, id)
    }

    /// Remove the single waiting placeholder, if one is present.
    pub fn remove_waiting(&mut self) -> Option<Step> {
        let idx = self.steps.iter().position(Step::is_waiting)?;
        Some(self.steps.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        find(&self.steps, id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Top-level steps in display order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

fn find<'a>(steps: &'a [Step], id: &str) -> Option<&'a Step> {
    for step in steps {
        if step.id == id {
            return Some(step);
        }
        if let Some(children) = &step.steps {
            if let Some(found) = find(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_mut<'a>(steps: &'a mut [Step], id: &str) -> Option<&'a mut Step> {
    for step in steps {
        if step.id == id {
            return Some(step);
        }
        if let Some(children) = &mut step.steps {
            if let Some(found) = find_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_from(steps: &mut Vec<Step>, id: &str) -> Option<Step> {
    if let Some(idx) = steps.iter().position(|s| s.id == id) {
        return Some(steps.remove(idx));
    }
    for step in steps {
        if let Some(children) = &mut step.steps {
            if let Some(removed) = remove_from(children, id) {
                return Some(removed);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{StepType, Timestamp};

    fn step(id: &str) -> Step {
        let mut s = Step::user_message("user", "");
        s.id = id.to_string();
        s
    }

    fn assistant(id: &str, output: &str) -> Step {
        Step {
            step_type: StepType::AssistantMessage,
            output: output.to_string(),
            ..step(id)
        }
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut log = MessageLog::new();
        log.append(step("a"));
        log.append(step("b"));
        log.append(step("c"));
        let ids: Vec<&str> = log.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn append_never_duplicates_ids() {
        let mut log = MessageLog::new();
        log.append(assistant("a", "first"));
        log.append(assistant("a", "second"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get("a").unwrap().output, "second");
    }

    #[test]
    fn append_removes_exactly_one_waiting_placeholder() {
        let mut log = MessageLog::new();
        log.append(step("a"));
        log.append(Step::waiting("bot"));
        log.append(assistant("b", "real"));
        let ids: Vec<&str> = log.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn appending_a_waiting_placeholder_replaces_the_previous_one() {
        let mut log = MessageLog::new();
        log.append(Step::waiting("bot"));
        log.append(Step::waiting("bot"));
        assert_eq!(log.len(), 1);
        assert!(log.steps().first().unwrap().is_waiting());
    }

    #[test]
    fn append_nests_under_parent() {
        let mut log = MessageLog::new();
        log.append(assistant("run", ""));
        let mut child = assistant("tool-1", "");
        child.parent_id = Some("run".to_string());
        log.append(child);
        assert_eq!(log.len(), 1);
        assert_eq!(log.get("run").unwrap().steps.as_ref().unwrap().len(), 1);
        assert!(log.contains("tool-1"));
    }

    #[test]
    fn update_preserves_children_unless_patch_replaces_them() {
        let mut log = MessageLog::new();
        let mut parent = assistant("p", "v1");
        parent.steps = Some(vec![assistant("c", "")]);
        log.append(parent);

        log.update_by_id("p", assistant("p", "v2"));
        let got = log.get("p").unwrap();
        assert_eq!(got.output, "v2");
        assert_eq!(got.steps.as_ref().unwrap().len(), 1);

        let mut replacement = assistant("p", "v3");
        replacement.steps = Some(vec![]);
        log.update_by_id("p", replacement);
        assert!(log.get("p").unwrap().steps.as_ref().unwrap().is_empty());
    }

    #[test]
    fn update_unknown_id_is_a_noop() {
        let mut log = MessageLog::new();
        assert!(!log.update_by_id("ghost", step("ghost")));
        assert!(log.is_empty());
    }

    #[test]
    fn patch_content_appends_in_sequence() {
        let mut log = MessageLog::new();
        log.append(assistant("s", ""));
        for tok in ["he", "llo", " world"] {
            log.patch_content("s", tok, true);
        }
        assert_eq!(log.get("s").unwrap().output, "hello world");
    }

    #[test]
    fn patch_content_replace_ignores_prior_output() {
        let mut log = MessageLog::new();
        log.append(assistant("s", "garbage"));
        log.patch_content("s", "clean", false);
        assert_eq!(log.get("s").unwrap().output, "clean");
        log.patch_content("s", "clean", false);
        assert_eq!(log.get("s").unwrap().output, "clean");
    }

    #[test]
    fn char_by_char_stream_reassembles() {
        let mut log = MessageLog::new();
        log.append(assistant("s", ""));
        for ch in "hello world".chars() {
            log.patch_content("s", &ch.to_string(), true);
        }
        assert_eq!(log.get("s").unwrap().output, "hello world");
    }

    #[test]
    fn delete_returns_the_removed_step() {
        let mut log = MessageLog::new();
        let mut s = assistant("s", "bye");
        s.speech_content = Some("goodbye".to_string());
        log.append(s);
        let removed = log.delete_by_id("s").unwrap();
        assert_eq!(removed.speech_content.as_deref(), Some("goodbye"));
        assert!(log.is_empty());
    }

    #[test]
    fn delete_reaches_nested_children() {
        let mut log = MessageLog::new();
        let mut parent = assistant("p", "");
        parent.steps = Some(vec![assistant("c", "")]);
        log.append(parent);
        assert!(log.delete_by_id("c").is_some());
        assert!(log.get("p").unwrap().steps.as_ref().unwrap().is_empty());
    }

    #[test]
    fn created_at_survives_round_trip() {
        let mut log = MessageLog::new();
        let mut s = step("s");
        s.created_at = Timestamp::Millis(42);
        log.append(s);
        assert_eq!(log.get("s").unwrap().created_at, Timestamp::Millis(42));
    }
}
