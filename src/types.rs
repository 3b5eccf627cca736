//! Core data types shared across the watcher pipeline.
//!
//! ## Flow
//!
//! ```text
//! RawMessage (source) -> Item (admitted) -> Batch -> ConversationEntry
//!     -> ClassificationResult -> RelayAction
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Attachments
// ============================================================================

/// Binary blob attached to an inbound message (photos, mostly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    /// Raw bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }
}

// ============================================================================
// Items
// ============================================================================

/// One deduplicated unit of inbound content.
///
/// Created by the coordinator only after the cursor tracker admitted its
/// `sequence_id`. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub source_id: String,
    pub sequence_id: i64,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Item {
    pub fn new(
        source_id: impl Into<String>,
        sequence_id: i64,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            sequence_id,
            text: text.into(),
            attachments,
        }
    }
}

/// Items coalesced by one debounce window, in arrival order.
pub type Batch = Vec<Item>;

// ============================================================================
// Conversation
// ============================================================================

/// Role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the classifier conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl ConversationEntry {
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            attachments,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Render a batch as a single user turn.
    ///
    /// Consecutive items of the same source are grouped under one
    /// `Messages from <source>:` header; every item line is prefixed with
    /// `message: `. Attachments keep batch order.
    pub fn from_batch(batch: &[Item]) -> Self {
        let mut text = String::new();
        let mut attachments = Vec::new();
        let mut current: Option<&str> = None;

        for item in batch {
            if current != Some(item.source_id.as_str()) {
                if current.is_some() {
                    text.push('\n');
                }
                text.push_str("Messages from ");
                text.push_str(&item.source_id);
                text.push_str(":\n");
                current = Some(item.source_id.as_str());
            }
            text.push_str("message: ");
            text.push_str(&item.text);
            text.push('\n');
            attachments.extend(item.attachments.iter().cloned());
        }

        Self::user(text.trim_end().to_string(), attachments)
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Structured verdict produced by one successful classification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Narrative judgment
    pub text: String,
    /// The situation is dangerous
    pub danger: bool,
    /// The verdict differs from the previously relayed one
    pub status_changed: bool,
    /// Free-text rationale
    pub principle: Option<String>,
}

impl ClassificationResult {
    /// Summary stored as the assistant turn in classifier history.
    pub fn history_summary(&self) -> String {
        format!(
            "{} Danger: {} StatusChanged: {}",
            self.text, self.danger, self.status_changed
        )
    }
}

/// Notification to post, derived from a verdict. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAction {
    pub send: bool,
    pub silent: bool,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_render_groups_consecutive_sources() {
        let batch = vec![
            Item::new("odessa_infonews", 10, "boom heard", vec![]),
            Item::new("odessa_infonews", 11, "second boom", vec![]),
            Item::new("xydessa_live", 3, "quiet here", vec![]),
        ];

        let entry = ConversationEntry::from_batch(&batch);

        assert_eq!(entry.role, Role::User);
        assert_eq!(
            entry.text,
            "Messages from odessa_infonews:\nmessage: boom heard\nmessage: second boom\n\n\
             Messages from xydessa_live:\nmessage: quiet here"
        );
    }

    #[test]
    fn test_batch_render_keeps_attachments_in_order() {
        let batch = vec![
            Item::new("a", 1, "one", vec![Attachment::new("image/png", vec![1])]),
            Item::new("b", 1, "two", vec![Attachment::new("image/jpeg", vec![2])]),
        ];

        let entry = ConversationEntry::from_batch(&batch);
        let types: Vec<_> = entry.attachments.iter().map(|a| a.content_type.as_str()).collect();
        assert_eq!(types, ["image/png", "image/jpeg"]);
    }

    #[test]
    fn test_history_summary_format() {
        let result = ClassificationResult {
            text: "All clear".to_string(),
            danger: false,
            status_changed: true,
            principle: None,
        };
        assert_eq!(result.history_summary(), "All clear Danger: false StatusChanged: true");
    }
}
