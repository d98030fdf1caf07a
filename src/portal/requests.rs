use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ConversationBackend;
use crate::chat::{Conversation, NewConversation};
use crate::entity::{Actor, ActorId, Role};
use crate::error::{PortalError, RequestError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A request as typed by the resident, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub title: String,
    pub description: String,
    pub target_role: Option<Role>,
    pub location: Option<Location>,
    pub image_url: Option<String>,
}

impl RequestDraft {
    pub fn validate(&self, requester_id: &ActorId) -> Result<NewConversation, RequestError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(RequestError::MissingTitle);
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(RequestError::MissingDescription);
        }
        let target_role = self.target_role.ok_or(RequestError::MissingTargetRole)?;
        if !target_role.is_department() {
            return Err(RequestError::NotADepartment(target_role.to_string()));
        }
        let location = self.location.ok_or(RequestError::MissingLocation)?;

        Ok(NewConversation {
            requester_id: requester_id.clone(),
            target_role,
            title: title.to_string(),
            description: description.to_string(),
            lat: location.lat,
            lng: location.lng,
            image_url: self
                .image_url
                .as_ref()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        })
    }
}

/// Validate and file a new request; it starts out pending.
pub async fn submit_request(
    backend: &dyn ConversationBackend,
    requester: &Actor,
    draft: &RequestDraft,
) -> Result<Conversation, PortalError> {
    let new = draft.validate(&requester.id)?;
    let conversation = backend.create_conversation(new).await?;
    info!(id = %conversation.id, requester = %requester.id, "request submitted");
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::chat::ConversationStatus;

    fn draft() -> RequestDraft {
        RequestDraft {
            title: "  Chiqindi olib ketilmadi ".to_string(),
            description: "Uch kundan beri".to_string(),
            target_role: Some(Role::Rais),
            location: Some(Location { lat: 41.3, lng: 69.2 }),
            image_url: Some("   ".to_string()),
        }
    }

    #[test]
    fn validation_checks_fields_in_order() {
        let me = ActorId::new("u1");

        let mut d = draft();
        d.title = " ".to_string();
        d.description = String::new();
        assert_eq!(d.validate(&me), Err(RequestError::MissingTitle));

        let mut d = draft();
        d.description = "\n".to_string();
        d.target_role = None;
        assert_eq!(d.validate(&me), Err(RequestError::MissingDescription));

        let mut d = draft();
        d.target_role = None;
        d.location = None;
        assert_eq!(d.validate(&me), Err(RequestError::MissingTargetRole));

        let mut d = draft();
        d.target_role = Some(Role::SuperAdmin);
        assert_eq!(
            d.validate(&me),
            Err(RequestError::NotADepartment("super_admin".to_string()))
        );

        let mut d = draft();
        d.location = None;
        assert_eq!(d.validate(&me), Err(RequestError::MissingLocation));
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let new = draft().validate(&ActorId::new("u1")).unwrap();
        assert_eq!(new.title, "Chiqindi olib ketilmadi");
        assert_eq!(new.image_url, None);
        assert_eq!(new.target_role, Role::Rais);
    }

    #[tokio::test]
    async fn submitted_request_is_pending() {
        let backend = LocalBackend::in_memory().await.unwrap();
        let me = Actor::new("u1", "Dilnoza", "998901234567", Role::User);

        let conversation = submit_request(&backend, &me, &draft()).await.unwrap();

        assert_eq!(conversation.status, ConversationStatus::Pending);
        assert_eq!(conversation.requester_id, me.id);
        assert_eq!(conversation.lat, 41.3);
    }

    #[tokio::test]
    async fn invalid_draft_is_not_sent() {
        let backend = LocalBackend::in_memory().await.unwrap();
        let me = Actor::new("u1", "Dilnoza", "998901234567", Role::User);
        let mut d = draft();
        d.location = None;

        let err = submit_request(&backend, &me, &d).await.unwrap_err();
        assert_eq!(err, PortalError::Request(RequestError::MissingLocation));
        assert!(backend
            .store()
            .list_conversations(&Default::default())
            .await
            .unwrap()
            .is_empty());
    }
}
