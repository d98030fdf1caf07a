//! Backend collaborators consumed by the chat engine and the portal.
//!
//! The hosted backend is only known through these traits. [`LocalBackend`]
//! implements all of them over the SQLite [`Store`] and publishes inserts on
//! the [`EventBus`], which stands in for the realtime change feed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bus::{Event, EventBus, MessageFeed};
use crate::chat::{
    AuthoredMessage, Conversation, ConversationId, ConversationQuery, ConversationStatus,
    Message, NewConversation, NewMessage,
};
use crate::entity::{Actor, ActorId};
use crate::error::BackendError;
use crate::store::Store;

/// Query, insert and realtime capabilities over the messages collection.
#[async_trait]
pub trait MessageBackend: Send + Sync {
    /// All messages of a conversation, oldest first, ties in insertion order.
    async fn fetch_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, BackendError>;

    /// Same ordering as [`MessageBackend::fetch_messages`], with author
    /// attributes joined.
    async fn fetch_authored(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuthoredMessage>, BackendError>;

    /// Persist one message; returns the stored row.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, BackendError>;

    /// Open a push feed of inserts for one conversation.
    async fn subscribe(&self, conversation_id: &ConversationId)
        -> Result<MessageFeed, BackendError>;

    /// Tear a feed down. Nothing is delivered through it afterwards.
    async fn release(&self, feed: MessageFeed);
}

#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn create_conversation(
        &self,
        new: NewConversation,
    ) -> Result<Conversation, BackendError>;

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, BackendError>;

    /// Newest first.
    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, BackendError>;

    async fn update_status(
        &self,
        id: &ConversationId,
        status: ConversationStatus,
    ) -> Result<(), BackendError>;

    /// Messages in the conversation not written by `actor_id`.
    async fn count_received(
        &self,
        id: &ConversationId,
        actor_id: &ActorId,
    ) -> Result<u64, BackendError>;
}

#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn get_profile(&self, id: &ActorId) -> Result<Option<Actor>, BackendError>;

    async fn save_profile(&self, actor: &Actor) -> Result<(), BackendError>;
}

fn query_err(err: anyhow::Error) -> BackendError {
    BackendError::Query(format!("{:#}", err))
}

fn insert_err(err: anyhow::Error) -> BackendError {
    BackendError::Insert(format!("{:#}", err))
}

/// Self-hosted backend: SQLite rows plus in-process change notifications.
#[derive(Clone)]
pub struct LocalBackend {
    store: Store,
    bus: Arc<EventBus>,
}

impl LocalBackend {
    pub fn new(store: Store, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Fresh in-memory backend with the schema applied.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let store = Store::in_memory().await?;
        store.init().await?;
        Ok(Self::new(store, Arc::new(EventBus::new())))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[async_trait]
impl MessageBackend for LocalBackend {
    async fn fetch_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, BackendError> {
        self.store.messages_for(conversation_id).await.map_err(query_err)
    }

    async fn fetch_authored(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuthoredMessage>, BackendError> {
        self.store
            .authored_messages_for(conversation_id)
            .await
            .map_err(query_err)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, BackendError> {
        let stored = self.store.insert_message(&message).await.map_err(insert_err)?;
        debug!(id = %stored.id, conversation_id = %stored.conversation_id, "message persisted");
        self.bus.publish(Event::MessageInserted(stored.clone()));
        Ok(stored)
    }

    async fn subscribe(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<MessageFeed, BackendError> {
        Ok(self.bus.subscribe_messages(conversation_id.clone()))
    }

    async fn release(&self, feed: MessageFeed) {
        feed.release();
    }
}

#[async_trait]
impl ConversationBackend for LocalBackend {
    async fn create_conversation(
        &self,
        new: NewConversation,
    ) -> Result<Conversation, BackendError> {
        let conversation = self
            .store
            .insert_conversation(&new)
            .await
            .map_err(insert_err)?;
        info!(id = %conversation.id, role = %conversation.target_role, "request created");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, BackendError> {
        self.store
            .get_conversation(id)
            .await
            .map_err(query_err)?
            .ok_or_else(|| BackendError::NotFound(format!("request {}", id)))
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, BackendError> {
        self.store.list_conversations(query).await.map_err(query_err)
    }

    async fn update_status(
        &self,
        id: &ConversationId,
        status: ConversationStatus,
    ) -> Result<(), BackendError> {
        let updated = self
            .store
            .update_status(id, status)
            .await
            .map_err(query_err)?;
        if !updated {
            return Err(BackendError::NotFound(format!("request {}", id)));
        }
        info!(%id, %status, "request status updated");
        Ok(())
    }

    async fn count_received(
        &self,
        id: &ConversationId,
        actor_id: &ActorId,
    ) -> Result<u64, BackendError> {
        let count = self
            .store
            .count_messages_not_from(id, actor_id)
            .await
            .map_err(query_err)?;
        u64::try_from(count).map_err(|_| BackendError::Decode(format!("negative count {}", count)))
    }
}

#[async_trait]
impl ProfileBackend for LocalBackend {
    async fn get_profile(&self, id: &ActorId) -> Result<Option<Actor>, BackendError> {
        self.store.get_profile(id).await.map_err(query_err)
    }

    async fn save_profile(&self, actor: &Actor) -> Result<(), BackendError> {
        self.store.save_profile(actor).await.map_err(insert_err)
    }
}
