//! Registry of out-of-band artifacts, partitioned by display role.

use crate::protocol::{Element, ElementPartition};

/// Tracks elements by id with upsert semantics. Avatars and tasklists live in
/// their own partitions; everything else is a step attachment.
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    avatars: Vec<Element>,
    tasklists: Vec<Element>,
    inline: Vec<Element>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        ElementRegistry::default()
    }

    /// Insert or replace by id within the element's partition.
    pub fn upsert(&mut self, element: Element) {
        let bucket = self.bucket_mut(element.partition());
        match bucket.iter_mut().find(|e| e.id == element.id) {
            Some(slot) => *slot = element,
            None => bucket.push(element),
        }
    }

    /// Remove by id from every partition.
    pub fn remove(&mut self, id: &str) {
        self.avatars.retain(|e| e.id != id);
        self.tasklists.retain(|e| e.id != id);
        self.inline.retain(|e| e.id != id);
    }

    /// Rebuild the registry from a thread snapshot's element list.
    pub fn hydrate(&mut self, elements: Vec<Element>) {
        self.clear();
        for element in elements {
            self.upsert(element);
        }
    }

    pub fn avatars(&self) -> &[Element] {
        &self.avatars
    }

    pub fn tasklists(&self) -> &[Element] {
        &self.tasklists
    }

    /// Step attachments (html/image/text/…).
    pub fn inline(&self) -> &[Element] {
        &self.inline
    }

    /// Attachments owned by a given step.
    pub fn for_step<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a Element> {
        self.inline
            .iter()
            .filter(move |e| e.for_id.as_deref() == Some(step_id))
    }

    pub fn clear(&mut self) {
        self.avatars.clear();
        self.tasklists.clear();
        self.inline.clear();
    }

    fn bucket_mut(&mut self, partition: ElementPartition) -> &mut Vec<Element> {
        match partition {
            ElementPartition::Avatar => &mut self.avatars,
            ElementPartition::Tasklist => &mut self.tasklists,
            ElementPartition::Inline => &mut self.inline,
        }
    }
}
