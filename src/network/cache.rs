use std::collections::HashMap;

use crate::common::Message;

/// Normalized store of received messages, keyed by `Message.id`.
///
/// Each subscription push carries the backend's full ordered list; the cache
/// keeps that order as-is and never re-sorts it.
#[derive(Debug, Default)]
pub struct MessageCache {
    entities: HashMap<i64, Message>,
    order: Vec<i64>,
}

impl MessageCache {
    /// Merge one push into the store and return the ordered snapshot it describes.
    pub fn apply(&mut self, messages: Vec<Message>) -> Vec<Message> {
        self.order.clear();
        for message in messages {
            if self.order.contains(&message.id) {
                log::warn!("Duplicate message id {} in one push; keeping the first", message.id);
                continue;
            }
            self.order.push(message.id);
            self.entities.insert(message.id, message);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.order
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect()
    }

    /// Drop everything, e.g. after the transport reconnected.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
