//! In-memory `MessageBackend` that records every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::MessageBackend;
use crate::bus::{Event, EventBus, MessageFeed, SubscriptionId};
use crate::chat::{AuthoredMessage, ConversationId, Message, NewMessage};
use crate::entity::{ActorId, Role};
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(ConversationId),
    FetchAuthored(ConversationId),
    Insert(NewMessage),
    Subscribe(ConversationId, SubscriptionId),
    Release(SubscriptionId),
}

#[derive(Default)]
pub struct RecordingBackend {
    bus: Mutex<EventBus>,
    calls: Mutex<Vec<Call>>,
    rows: Mutex<HashMap<ConversationId, Vec<Message>>>,
    authors: Mutex<HashMap<ActorId, (String, Role)>>,
    next_id: AtomicU64,
    fail_fetch: AtomicBool,
    fail_insert: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn fail_fetch(&self, on: bool) {
        self.fail_fetch.store(on, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, on: bool) {
        self.fail_subscribe.store(on, Ordering::SeqCst);
    }

    /// Drop the bus behind every open feed, as a lost realtime connection
    /// would. Later subscriptions use a fresh bus.
    pub fn close_feeds(&self) {
        *self.bus.lock().unwrap() = EventBus::new();
    }

    pub fn with_author(&self, id: &str, name: &str, role: Role) {
        self.authors
            .lock()
            .unwrap()
            .insert(ActorId::new(id), (name.to_string(), role));
    }

    fn stored(&self, conversation: &str, sender: &str, text: &str, at: DateTime<Utc>) -> Message {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Message {
            id: format!("m-{}", n),
            conversation_id: ConversationId::new(conversation),
            sender_id: ActorId::new(sender),
            text: text.to_string(),
            created_at: at,
        }
    }

    /// Append a row without notifying anyone. Rows come back in seed order.
    pub fn seed(&self, conversation: &str, sender: &str, text: &str, at: DateTime<Utc>) -> Message {
        let message = self.stored(conversation, sender, text, at);
        self.rows
            .lock()
            .unwrap()
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        message
    }

    /// Store a row and push it, as if another client inserted it.
    pub fn push_remote(&self, conversation: &str, sender: &str, text: &str) -> Message {
        let message = self.seed(conversation, sender, text, Utc::now());
        self.bus
            .lock()
            .unwrap()
            .publish(Event::MessageInserted(message.clone()));
        message
    }

    /// What a successful insert does, without going through the trait.
    pub fn insert_now(&self, new: NewMessage) -> Message {
        self.push_remote(new.conversation_id.as_str(), new.sender_id.as_str(), &new.text)
    }
}

#[async_trait]
impl MessageBackend for RecordingBackend {
    async fn fetch_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, BackendError> {
        self.record(Call::Fetch(conversation_id.clone()));
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::Query("connection refused".to_string()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_authored(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<AuthoredMessage>, BackendError> {
        self.record(Call::FetchAuthored(conversation_id.clone()));
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::Query("connection refused".to_string()));
        }
        let rows = self
            .rows
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let authors = self.authors.lock().unwrap();
        Ok(rows
            .into_iter()
            .map(|message| {
                let author = authors.get(&message.sender_id).cloned();
                AuthoredMessage {
                    author_name: author.as_ref().map(|(name, _)| name.clone()),
                    author_role: author.map(|(_, role)| role),
                    message,
                }
            })
            .collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, BackendError> {
        self.record(Call::Insert(message.clone()));
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(BackendError::Insert("offline".to_string()));
        }
        Ok(self.insert_now(message))
    }

    async fn subscribe(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<MessageFeed, BackendError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BackendError::Subscribe("realtime unavailable".to_string()));
        }
        let feed = self.bus.lock().unwrap().subscribe_messages(conversation_id.clone());
        self.record(Call::Subscribe(conversation_id.clone(), feed.id()));
        Ok(feed)
    }

    async fn release(&self, feed: MessageFeed) {
        self.record(Call::Release(feed.id()));
        feed.release();
    }
}
