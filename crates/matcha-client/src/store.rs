use std::collections::HashSet;

use matcha_types::{Message, MessageId};

/// Union of two message sequences, deduplicated by `id` and ordered by
/// `created_at`.
///
/// When an id appears more than once the first occurrence wins, scanning
/// `existing` before `incoming`; no field-level merging happens. The sort is
/// stable, so messages sharing a timestamp keep their input order.
pub fn merge(existing: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged: Vec<Message> = existing
        .iter()
        .chain(incoming)
        .filter(|message| seen.insert(message.id))
        .cloned()
        .collect();
    merged.sort_by_key(|message| message.created_at);
    merged
}

/// Messages loaded for the open conversation, display-ordered.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `incoming` into the store. Returns how many new ids were added.
    pub fn merge(&mut self, incoming: &[Message]) -> usize {
        let before = self.messages.len();
        self.messages = merge(&self.messages, incoming);
        self.ids = self.messages.iter().map(|m| m.id).collect();
        self.messages.len() - before
    }

    /// True if any message in `batch` is not in the store yet.
    pub fn has_unseen(&self, batch: &[Message]) -> bool {
        batch.iter().any(|m| !self.ids.contains(&m.id))
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
