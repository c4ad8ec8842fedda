use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::{is_dot_only, sanitize_name, sanitize_user_name};

/// One attachment discovered in a group's message history. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    /// Sanitized poster name.
    pub user: String,
    /// Remote creation time, restored as the file's modification time.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    pub source_message_id: String,
}

impl MediaItem {
    pub fn new(
        url: impl Into<String>,
        user: Option<&str>,
        created: Option<DateTime<Utc>>,
        source_message_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            user: sanitize_user_name(user),
            created,
            source_message_id: source_message_id.into(),
        }
    }
}

/// Durable per-group download queue.
///
/// `pending_items` keeps remote message order (newest first) and never holds
/// two entries with the same url. After creation, removal is the only mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub group_id: String,
    pub group_name: String,
    pub token: String,
    #[serde(default)]
    pub pending_items: Vec<MediaItem>,
}

impl GroupState {
    pub fn new(group_id: impl Into<String>, group_name: &str, token: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: sanitize_name(group_name),
            token: token.into(),
            pending_items: Vec::new(),
        }
    }

    /// Appends items whose url is not already queued. Returns how many were added.
    pub fn extend_items(&mut self, items: impl IntoIterator<Item = MediaItem>) -> usize {
        let mut seen: HashSet<String> = self
            .pending_items
            .iter()
            .map(|item| item.url.clone())
            .collect();
        let before = self.pending_items.len();
        for item in items {
            if seen.insert(item.url.clone()) {
                self.pending_items.push(item);
            }
        }
        self.pending_items.len() - before
    }

    /// Removes the item keyed by `url`. Removing an absent url is a no-op.
    pub fn remove_item(&mut self, url: &str) -> Option<MediaItem> {
        let index = self.pending_items.iter().position(|item| item.url == url)?;
        Some(self.pending_items.remove(index))
    }

    pub fn is_drained(&self) -> bool {
        self.pending_items.is_empty()
    }

    /// Directory name under the output root: the sanitized name, or the id
    /// when the name is blank or only dots.
    pub fn directory_name(&self) -> &str {
        if self.group_name.is_empty() || is_dot_only(&self.group_name) {
            &self.group_id
        } else {
            &self.group_name
        }
    }
}

/// Globally cached access token, independent of any group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
}
