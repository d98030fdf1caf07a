//! Staff triage: the request feed, status changes and rejection reasons.

use tracing::{info, warn};

use crate::backend::{ConversationBackend, MessageBackend};
use crate::chat::{
    Conversation, ConversationId, ConversationQuery, ConversationStatus, NewMessage,
    REJECTION_PREFIX,
};
use crate::entity::Actor;
use crate::error::PortalError;

const NO_REASON: &str = "Sabab ko'rsatilmagan";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    /// `None` shows every status.
    pub status: Option<ConversationStatus>,
    /// Case-insensitive match against title, id and requester name.
    pub search: String,
}

fn matches_search(conversation: &Conversation, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |haystack: &str| haystack.to_lowercase().contains(needle);
    hit(&conversation.title)
        || hit(conversation.id.as_str())
        || conversation.requester_name.as_deref().map(hit).unwrap_or(false)
}

/// Requests visible to `staff`, newest first. The super admin sees every
/// department; other officials see only requests addressed to their role.
pub async fn load_staff_feed(
    backend: &dyn ConversationBackend,
    staff: &Actor,
    filter: &FeedFilter,
) -> Result<Vec<Conversation>, PortalError> {
    if !staff.role.is_official() {
        return Err(PortalError::NotStaff);
    }

    let query = ConversationQuery {
        target_role: (!staff.is_super_admin()).then_some(staff.role),
        status: filter.status,
        ..Default::default()
    };
    let needle = filter.search.trim().to_lowercase();

    let conversations = backend.list_conversations(&query).await?;
    Ok(conversations
        .into_iter()
        .filter(|c| matches_search(c, &needle))
        .collect())
}

/// Move a request to `status`. Rejections need a reason, which is posted
/// into the request's chat so the resident sees it.
pub async fn update_status(
    conversations: &dyn ConversationBackend,
    messages: &dyn MessageBackend,
    staff: &Actor,
    id: &ConversationId,
    status: ConversationStatus,
    reason: Option<&str>,
) -> Result<(), PortalError> {
    if !staff.role.is_official() {
        return Err(PortalError::NotStaff);
    }

    if status != ConversationStatus::Rejected {
        conversations.update_status(id, status).await?;
        return Ok(());
    }

    let reason = reason.map(str::trim).unwrap_or_default();
    if reason.is_empty() {
        return Err(PortalError::RejectReasonRequired);
    }

    let previous = conversations.get_conversation(id).await?.status;
    conversations.update_status(id, status).await?;

    let posted = messages
        .insert_message(NewMessage {
            conversation_id: id.clone(),
            sender_id: staff.id.clone(),
            text: format!("{} {}", REJECTION_PREFIX, reason),
        })
        .await;
    if let Err(err) = posted {
        // A rejection without its reason is not shown to the resident.
        warn!(%id, error = %err, "rejection reason not posted; restoring {}", previous);
        if let Err(revert) = conversations.update_status(id, previous).await {
            warn!(%id, error = %revert, "failed to restore request status");
        }
        return Err(err.into());
    }
    info!(%id, staff = %staff.id, "request rejected");

    Ok(())
}

/// The most recent rejection reason posted in a request's chat.
pub async fn rejection_reason(
    messages: &dyn MessageBackend,
    id: &ConversationId,
) -> Result<String, PortalError> {
    let history = messages.fetch_messages(id).await?;
    let reason = history
        .iter()
        .rev()
        .find_map(|m| m.text.strip_prefix(REJECTION_PREFIX))
        .map(|rest| rest.trim().to_string())
        .unwrap_or_else(|| NO_REASON.to_string());
    Ok(reason)
}
