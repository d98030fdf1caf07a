use std::fmt;

use chrono::{DateTime, Utc};

use crate::chat::{ConversationStatus, Message};
use crate::entity::ActorId;

/// Client-side id of a provisional message, unique within one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub u64);

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Provisional(TempId),
    Confirmed(String),
}

/// Delivery marker on the actor's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Single check: shown locally, not yet persisted.
    Sent,
    /// Double check: the backend stored it.
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: EntryKey,
    pub sender_id: ActorId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub mine: bool,
    /// `None` on other people's messages.
    pub delivery: Option<Delivery>,
}

impl Entry {
    pub fn confirmed(message: &Message, me: &ActorId) -> Self {
        let mine = message.sender_id == *me;
        Self {
            key: EntryKey::Confirmed(message.id.clone()),
            sender_id: message.sender_id.clone(),
            text: message.text.clone(),
            created_at: message.created_at,
            mine,
            delivery: mine.then_some(Delivery::Delivered),
        }
    }

    pub fn provisional(
        temp_id: TempId,
        sender_id: ActorId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: EntryKey::Provisional(temp_id),
            sender_id,
            text: text.into(),
            created_at,
            mine: true,
            delivery: Some(Delivery::Sent),
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self.key, EntryKey::Provisional(_))
    }
}

/// What an empty conversation shows instead of a blank list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    AwaitingFirstMessage,
    Closed,
}

impl Placeholder {
    pub fn for_status(status: ConversationStatus) -> Self {
        if status.is_closed() {
            Placeholder::Closed
        } else {
            Placeholder::AwaitingFirstMessage
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Placeholder::AwaitingFirstMessage => "Hali xabar yo'q. Birinchi yozing!",
            Placeholder::Closed => "Xabarlar yo'q",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Empty(Placeholder),
    Error(String),
    Ready,
}

/// Transient user-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    SendFailed,
}

impl Notice {
    pub fn text(self) -> &'static str {
        match self {
            Notice::SendFailed => "Xabar yuborilmadi",
        }
    }
}

/// Rendered state of one chat surface.
#[derive(Debug, Clone)]
pub struct ChatView {
    state: ViewState,
    entries: Vec<Entry>,
    placeholder: Placeholder,
    scroll_epoch: u64,
    notices: Vec<Notice>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            state: ViewState::Idle,
            entries: Vec::new(),
            placeholder: Placeholder::AwaitingFirstMessage,
            scroll_epoch: 0,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == *key)
    }

    /// Bumped every time the view should scroll to its newest entry.
    pub fn scroll_epoch(&self) -> u64 {
        self.scroll_epoch
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub(crate) fn reset(&mut self) {
        self.state = ViewState::Idle;
        self.entries.clear();
    }

    pub(crate) fn show_loading(&mut self) {
        self.state = ViewState::Loading;
        self.entries.clear();
    }

    pub(crate) fn show_error(&mut self, reason: impl Into<String>) {
        self.state = ViewState::Error(reason.into());
        self.entries.clear();
    }

    /// Replace everything with a freshly loaded history, keeping its order.
    pub(crate) fn show_history(&mut self, entries: Vec<Entry>, placeholder: Placeholder) {
        self.placeholder = placeholder;
        self.entries = entries;
        self.state = if self.entries.is_empty() {
            ViewState::Empty(placeholder)
        } else {
            ViewState::Ready
        };
        self.scroll_epoch += 1;
    }

    pub(crate) fn append(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.state = ViewState::Ready;
        self.scroll_epoch += 1;
    }

    pub(crate) fn remove(&mut self, key: &EntryKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != *key);
        let removed = self.entries.len() != before;
        if removed && self.entries.is_empty() && self.state == ViewState::Ready {
            self.state = ViewState::Empty(self.placeholder);
        }
        removed
    }

    pub(crate) fn mark_delivered(&mut self, key: &EntryKey) -> bool {
        match self.entries.iter_mut().find(|e| e.key == *key) {
            Some(entry) => {
                entry.delivery = Some(Delivery::Delivered);
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
