//! Lifecycle of one locally composed message.
//!
//! ```text
//! Composed -> Provisional -> Persisting -> Confirmed
//!                  |              |
//!                  +--------------+-------> Failed
//! ```
//!
//! The owning surface keeps its send control disabled from `Provisional`
//! until the message settles, so at most one send is outstanding.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::chat::{ConversationId, NewMessage};
use crate::entity::ActorId;
use crate::sync::view::{Entry, TempId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingState {
    Composed,
    Provisional,
    Persisting,
    Confirmed,
    Failed,
}

impl OutgoingState {
    pub fn is_settled(self) -> bool {
        matches!(self, OutgoingState::Confirmed | OutgoingState::Failed)
    }

    fn can_become(self, next: OutgoingState) -> bool {
        use OutgoingState::*;
        matches!(
            (self, next),
            (Composed, Provisional)
                | (Provisional, Persisting)
                | (Provisional, Failed)
                | (Persisting, Confirmed)
                | (Persisting, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outgoing message cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: OutgoingState,
    pub to: OutgoingState,
}

#[derive(Debug, Clone)]
pub struct Outgoing {
    temp_id: TempId,
    conversation_id: ConversationId,
    sender_id: ActorId,
    text: String,
    client_ts: DateTime<Utc>,
    state: OutgoingState,
}

impl Outgoing {
    pub fn compose(
        temp_id: TempId,
        conversation_id: ConversationId,
        sender_id: ActorId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            temp_id,
            conversation_id,
            sender_id,
            text: text.into(),
            client_ts: Utc::now(),
            state: OutgoingState::Composed,
        }
    }

    pub fn temp_id(&self) -> TempId {
        self.temp_id
    }

    pub fn state(&self) -> OutgoingState {
        self.state
    }

    fn advance(&mut self, next: OutgoingState) -> Result<(), InvalidTransition> {
        if !self.state.can_become(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Composed -> Provisional. Returns the entry to render immediately.
    pub fn render(&mut self) -> Result<Entry, InvalidTransition> {
        self.advance(OutgoingState::Provisional)?;
        Ok(Entry::provisional(
            self.temp_id,
            self.sender_id.clone(),
            self.text.clone(),
            self.client_ts,
        ))
    }

    /// Provisional -> Persisting. Returns the insert payload; the backend
    /// assigns the authoritative id and timestamp.
    pub fn request_persist(&mut self) -> Result<NewMessage, InvalidTransition> {
        self.advance(OutgoingState::Persisting)?;
        Ok(NewMessage {
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone(),
            text: self.text.clone(),
        })
    }

    pub fn confirm(&mut self) -> Result<(), InvalidTransition> {
        self.advance(OutgoingState::Confirmed)
    }

    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        self.advance(OutgoingState::Failed)
    }
}
