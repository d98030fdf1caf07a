use crate::entity::{ActorId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text prefix staff use when a request is rejected; the rest of the
/// message is the reason shown to the resident.
pub const REJECTION_PREFIX: &str = "RAD ETILDI:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// First six characters, the way request numbers are displayed.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(6) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Pending,
    Progress,
    Done,
    Rejected,
}

impl ConversationStatus {
    pub const ALL: [ConversationStatus; 4] = [
        ConversationStatus::Pending,
        ConversationStatus::Progress,
        ConversationStatus::Done,
        ConversationStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Pending => "pending",
            ConversationStatus::Progress => "progress",
            ConversationStatus::Done => "done",
            ConversationStatus::Rejected => "rejected",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConversationStatus::Pending => "Kutilmoqda",
            ConversationStatus::Progress => "Jarayonda",
            ConversationStatus::Done => "Bajarildi",
            ConversationStatus::Rejected => "Rad etildi",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, ConversationStatus::Done | ConversationStatus::Rejected)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConversationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// A resident's request; the thread chat messages belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub requester_id: ActorId,
    /// Requester's name, when the backend joined the profile.
    #[serde(default)]
    pub requester_name: Option<String>,
    pub target_role: Role,
    pub title: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new request. Status always starts as pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub requester_id: ActorId,
    pub target_role: Role,
    pub title: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
}

/// Filters for listing requests. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub requester_id: Option<ActorId>,
    pub target_role: Option<Role>,
    pub status: Option<ConversationStatus>,
    pub limit: Option<i64>,
}

/// A persisted chat message. Id and timestamp are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: ConversationId,
    pub sender_id: ActorId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: ActorId,
    pub text: String,
}

/// A message joined with what the backend knows about its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoredMessage {
    pub message: Message,
    pub author_name: Option<String>,
    pub author_role: Option<Role>,
}
