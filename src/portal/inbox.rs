use serde::Serialize;

use crate::backend::ConversationBackend;
use crate::chat::{Conversation, ConversationQuery};
use crate::entity::Actor;
use crate::error::PortalError;

/// How many requests the resident's home screen lists.
pub const RECENT_REQUESTS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub conversation: Conversation,
    /// Messages in the thread written by someone else.
    pub received: u64,
}

impl RequestSummary {
    pub fn has_unread(&self) -> bool {
        self.received > 0
    }
}

/// The actor's own requests, newest first, with received-message counts.
pub async fn load_my_requests(
    backend: &dyn ConversationBackend,
    actor: &Actor,
    limit: Option<i64>,
) -> Result<Vec<RequestSummary>, PortalError> {
    let conversations = backend
        .list_conversations(&ConversationQuery {
            requester_id: Some(actor.id.clone()),
            limit,
            ..Default::default()
        })
        .await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let received = backend.count_received(&conversation.id, &actor.id).await?;
        summaries.push(RequestSummary {
            conversation,
            received,
        });
    }

    Ok(summaries)
}
