use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::{PLACEHOLDER_TURN_CONTENT, PLACEHOLDER_TURN_ID};
use crate::utils::new_id;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Responders may omit ids; a fresh one is assigned on decode
    #[serde(default = "new_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// A user turn with a fresh id
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn with a fresh id
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// The pending indicator shown while an exchange is outstanding
    pub fn placeholder() -> Self {
        Self {
            id: PLACEHOLDER_TURN_ID.to_string(),
            role: Role::Assistant,
            content: PLACEHOLDER_TURN_CONTENT.to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_TURN_ID
    }
}

/// Ordered sequence of turns for one conversation
///
/// Every operation is pure: it returns a new log and leaves `self` intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog(Vec<Turn>);

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// New log with `turn` at the end
    pub fn append(&self, turn: Turn) -> Self {
        let mut turns = self.0.clone();
        turns.push(turn);
        Self(turns)
    }

    /// New log with the pending placeholder removed, if present
    pub fn without_placeholder(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|turn| !turn.is_placeholder())
                .cloned()
                .collect(),
        )
    }

    /// True while the log carries the pending placeholder
    pub fn is_pending(&self) -> bool {
        self.0.iter().any(Turn::is_placeholder)
    }

    /// Authoritative form of a log received from a responder: no placeholder,
    /// and any repeated id replaced by a fresh one. Order and content stay put.
    pub fn normalized(self) -> Self {
        let mut seen = HashSet::with_capacity(self.0.len());
        Self(
            self.0
                .into_iter()
                .filter(|turn| !turn.is_placeholder())
                .map(|mut turn| {
                    if !seen.insert(turn.id.clone()) {
                        turn.id = new_id();
                        seen.insert(turn.id.clone());
                    }
                    turn
                })
                .collect(),
        )
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Turn> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Turn>> for MessageLog {
    fn from(turns: Vec<Turn>) -> Self {
        Self(turns)
    }
}

impl FromIterator<Turn> for MessageLog {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
