use serde::Serialize;
use tracing::debug;

use crate::backend::MessageBackend;
use crate::chat::{ConversationId, Message};
use crate::error::SyncError;

const UNKNOWN_AUTHOR: &str = "Noma'lum";
const NO_MESSAGES: &str = "Xabarlar yo'q";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorBadge {
    Official,
    Citizen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub message: Message,
    pub author_name: String,
    pub badge: AuthorBadge,
}

/// Fetch-once transcript for overview screens. No live updates, no sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOnlyHistory {
    pub conversation_id: ConversationId,
    pub entries: Vec<HistoryEntry>,
}

impl ReadOnlyHistory {
    pub async fn load(
        backend: &dyn MessageBackend,
        conversation_id: &ConversationId,
    ) -> Result<Self, SyncError> {
        if conversation_id.is_empty() {
            return Err(SyncError::EmptyConversationId);
        }

        let rows = backend.fetch_authored(conversation_id).await?;
        debug!(%conversation_id, count = rows.len(), "read-only history loaded");

        let entries = rows
            .into_iter()
            .map(|row| {
                // Authors without a profile are not known citizens.
                let badge = match row.author_role {
                    Some(role) if !role.is_official() => AuthorBadge::Citizen,
                    _ => AuthorBadge::Official,
                };
                HistoryEntry {
                    author_name: row.author_name.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                    badge,
                    message: row.message,
                }
            })
            .collect();

        Ok(Self {
            conversation_id: conversation_id.clone(),
            entries,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text to show instead of an empty transcript.
    pub fn placeholder(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_MESSAGES)
    }
}
