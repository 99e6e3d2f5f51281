//! Recently read texts

use crate::reading::text::word_count;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Most items kept in the history
pub const MAX_HISTORY_ITEMS: usize = 50;

/// Characters of the text shown as an item's title
const TITLE_CHARS: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingHistoryItem {
    pub id: Uuid,
    pub text: String,
    pub date: DateTime<Utc>,
    pub word_count: usize,
}

impl ReadingHistoryItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(text, Utc::now())
    }

    pub fn at(text: impl Into<String>, date: DateTime<Utc>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            word_count: word_count(&text),
            text,
            date,
        }
    }

    /// The trimmed text, cut to 50 characters with "..." when longer
    pub fn title(&self) -> String {
        let trimmed = self.text.trim();
        match trimmed.char_indices().nth(TITLE_CHARS) {
            Some((cut, _)) => format!("{}...", &trimmed[..cut]),
            None => trimmed.to_string(),
        }
    }
}

/// Most-recent-first list of read texts
#[derive(Debug, Clone, Default)]
pub struct ReadingHistory {
    items: Arc<RwLock<Vec<ReadingHistoryItem>>>,
}

impl ReadingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, item: ReadingHistoryItem) {
        let mut items = self.items.write();
        items.insert(0, item);
        items.truncate(MAX_HISTORY_ITEMS);
    }

    /// Remove the item with `id`. Returns false if it was not present.
    pub fn delete(&self, id: Uuid) -> bool {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| item.id != id);
        items.len() != before
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn items(&self) -> Vec<ReadingHistoryItem> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}
