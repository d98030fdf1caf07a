use crate::chat::{ConversationId, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A message row was persisted
    MessageInserted(Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    next_subscription: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Open a feed of inserts for a single conversation.
    pub fn subscribe_messages(&self, conversation_id: ConversationId) -> MessageFeed {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        debug!(%id, %conversation_id, "opening message feed");
        MessageFeed {
            id,
            conversation_id,
            rx: self.tx.subscribe(),
        }
    }

    pub fn publish(&self, event: Event) {
        // We ignore the error if there are no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live stream of messages inserted into one conversation.
///
/// Dropping or releasing the feed detaches it from the bus; nothing is
/// delivered afterwards.
#[derive(Debug)]
pub struct MessageFeed {
    id: SubscriptionId,
    conversation_id: ConversationId,
    rx: broadcast::Receiver<Event>,
}

impl MessageFeed {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Wait for the next insert in this conversation. `None` once the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(Event::MessageInserted(msg)) => {
                    if msg.conversation_id == self.conversation_id {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(id = %self.id, skipped, "message feed lagged; reload to recover");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn release(self) {
        debug!(id = %self.id, conversation_id = %self.conversation_id, "releasing message feed");
    }
}
