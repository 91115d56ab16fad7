use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::log::MessageLog;
use crate::constants::{DEFAULT_CONVERSATION_TITLE, TITLE_ELLIPSIS, TITLE_PREVIEW_CHARS};
use crate::utils::new_id;

/// Title for a conversation, taken from the first turn of its log
///
/// Total: an empty log or a blank first turn yields the default title.
pub fn derive_title(log: &MessageLog) -> String {
    match log.first() {
        Some(turn) if !turn.content.trim().is_empty() => {
            let preview: String = turn.content.chars().take(TITLE_PREVIEW_CHARS).collect();
            format!("{}{}", preview, TITLE_ELLIPSIS)
        }
        _ => DEFAULT_CONVERSATION_TITLE.to_string(),
    }
}

/// A named conversation holding its last authoritative log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub title: String,
    pub messages: MessageLog,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl ConversationEntry {
    /// Create an entry, titling it from the log
    pub fn new(id: String, messages: MessageLog) -> Self {
        let now = Local::now();
        Self {
            id,
            title: derive_title(&messages),
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get a summary for display
    pub fn summary(&self) -> String {
        format!(
            "{} | {} messages | {}",
            self.updated_at.format("%Y-%m-%d %H:%M"),
            self.messages.len(),
            self.title
        )
    }
}

/// Conversations, newest first, plus which one is active
///
/// Mutating operations return a new store; callers swap the whole value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationStore {
    entries: Vec<ConversationEntry>,
    active_id: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means a new, unsaved conversation
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Log of the active entry, or empty for a new or unmatched conversation
    pub fn active_log(&self) -> MessageLog {
        self.active_id
            .as_deref()
            .and_then(|id| self.get(id))
            .map(|entry| entry.messages.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<&ConversationEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an authoritative log
    ///
    /// With an id, the matching entry gets the new messages and keeps its
    /// title and position. Without one, a new entry is created at the front.
    /// Returns the id the log was stored under. The active id is not touched.
    pub fn upsert(&self, active_id: Option<&str>, resolved: MessageLog) -> (String, Self) {
        let mut next = self.clone();

        if let Some(id) = active_id {
            if let Some(entry) = next.entries.iter_mut().find(|entry| entry.id == id) {
                entry.messages = resolved;
                entry.updated_at = Local::now();
                return (id.to_string(), next);
            }
            // Entries are never deleted, so this only happens for ids minted elsewhere
            next.entries
                .insert(0, ConversationEntry::new(id.to_string(), resolved));
            return (id.to_string(), next);
        }

        let id = new_id();
        next.entries
            .insert(0, ConversationEntry::new(id.clone(), resolved));
        (id, next)
    }

    /// Switch the active conversation and return its log
    ///
    /// An unknown id starts a fresh conversation rather than failing.
    pub fn select(&self, id: Option<&str>) -> (MessageLog, Self) {
        let active_id = id.filter(|id| self.get(id).is_some()).map(str::to_string);
        let next = Self {
            entries: self.entries.clone(),
            active_id,
        };
        (next.active_log(), next)
    }

    /// Same entries, different active id
    pub fn with_active(&self, id: Option<String>) -> Self {
        Self {
            entries: self.entries.clone(),
            active_id: id,
        }
    }
}
