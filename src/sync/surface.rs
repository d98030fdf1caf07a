use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::MessageBackend;
use crate::bus::MessageFeed;
use crate::chat::{ConversationId, ConversationStatus, Message, NewMessage};
use crate::entity::Actor;
use crate::error::{BackendError, SyncError};
use crate::sync::outgoing::Outgoing;
use crate::sync::view::{ChatView, Entry, EntryKey, Notice, Placeholder, TempId};

/// A send that has been rendered provisionally and is waiting on the
/// backend. Hand `message` to [`MessageBackend::insert_message`] and the
/// result to [`ChatSurface::complete_send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub temp_id: TempId,
    pub message: NewMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Confirmed(Message),
    Failed(BackendError),
    /// The send no longer belongs to this surface, e.g. the conversation
    /// was switched while it was in flight.
    Stale,
}

/// One chat surface: a single active conversation, its push feed, its
/// rendered messages and at most one outstanding send.
///
/// Surfaces are independent. A citizen chat and a staff panel each own
/// their own `ChatSurface`, even over the same backend.
pub struct ChatSurface {
    actor: Actor,
    backend: Arc<dyn MessageBackend>,
    active: Option<ConversationId>,
    feed: Option<MessageFeed>,
    view: ChatView,
    outgoing: Option<Outgoing>,
    next_temp: u64,
}

impl ChatSurface {
    pub fn new(actor: Actor, backend: Arc<dyn MessageBackend>) -> Self {
        Self {
            actor,
            backend,
            active: None,
            feed: None,
            view: ChatView::new(),
            outgoing: None,
            next_temp: 1,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.view.take_notices()
    }

    /// Whether pushes are flowing for the active conversation.
    pub fn is_live(&self) -> bool {
        self.feed.is_some()
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        self.active.is_some() && self.outgoing.is_none()
    }

    /// Switch to `conversation_id`: release the previous feed, load the
    /// history, then subscribe to new inserts.
    ///
    /// A failed load leaves the surface in an error state with nothing
    /// rendered and no conversation active. A failed subscribe is logged
    /// and the conversation stays usable without live updates.
    pub async fn open(
        &mut self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), SyncError> {
        if conversation_id.is_empty() {
            return Err(SyncError::EmptyConversationId);
        }

        self.release_feed().await;
        self.outgoing = None;
        self.active = Some(conversation_id.clone());
        self.view.show_loading();

        let history = match self.backend.fetch_messages(&conversation_id).await {
            Ok(history) => history,
            Err(err) => {
                warn!(%conversation_id, error = %err, "failed to load chat history");
                self.active = None;
                self.view.show_error(err.to_string());
                return Err(err.into());
            }
        };

        debug!(%conversation_id, count = history.len(), "chat history loaded");
        let entries = history
            .iter()
            .map(|msg| Entry::confirmed(msg, &self.actor.id))
            .collect();
        self.view.show_history(entries, Placeholder::for_status(status));

        match self.backend.subscribe(&conversation_id).await {
            Ok(feed) => {
                info!(%conversation_id, subscription = %feed.id(), "live updates on");
                self.feed = Some(feed);
            }
            Err(err) => {
                warn!(%conversation_id, error = %err, "subscribe failed; continuing without live updates");
            }
        }

        Ok(())
    }

    /// Release the feed and forget the active conversation.
    pub async fn close(&mut self) {
        self.release_feed().await;
        self.active = None;
        self.outgoing = None;
        self.view.reset();
    }

    async fn release_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            info!(subscription = %feed.id(), conversation_id = %feed.conversation_id(), "live updates off");
            self.backend.release(feed).await;
        }
    }

    fn next_temp_id(&mut self) -> TempId {
        let id = TempId(self.next_temp);
        self.next_temp += 1;
        id
    }

    /// Render `text` as a provisional message and disable sending.
    ///
    /// Whitespace-only text is rejected without touching the view.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyText);
        }
        let conversation_id = self
            .active
            .clone()
            .ok_or(SyncError::NoActiveConversation)?;
        if self.outgoing.is_some() {
            return Err(SyncError::SendInFlight);
        }

        let temp_id = self.next_temp_id();
        let mut outgoing = Outgoing::compose(temp_id, conversation_id, self.actor.id.clone(), text);
        let entry = outgoing.render()?;
        let message = outgoing.request_persist()?;

        debug!(%temp_id, conversation_id = %message.conversation_id, "provisional message rendered");
        self.view.append(entry);
        self.outgoing = Some(outgoing);

        Ok(PendingSend { temp_id, message })
    }

    /// Settle the outstanding send: upgrade the provisional entry to
    /// delivered, or drop it and raise a notice. Sending is enabled again
    /// either way.
    pub fn complete_send(
        &mut self,
        temp_id: TempId,
        result: Result<Message, BackendError>,
    ) -> SendOutcome {
        let Some(mut outgoing) = self.outgoing.take() else {
            debug!(%temp_id, "completion for a send that is no longer tracked");
            return SendOutcome::Stale;
        };
        if outgoing.temp_id() != temp_id {
            debug!(%temp_id, current = %outgoing.temp_id(), "completion for a different send");
            self.outgoing = Some(outgoing);
            return SendOutcome::Stale;
        }

        let key = EntryKey::Provisional(temp_id);
        match result {
            Ok(message) => {
                if let Err(err) = outgoing.confirm() {
                    warn!(%temp_id, error = %err, "ignoring confirmation");
                    return SendOutcome::Stale;
                }
                self.view.mark_delivered(&key);
                debug!(%temp_id, id = %message.id, "message delivered");
                SendOutcome::Confirmed(message)
            }
            Err(err) => {
                if let Err(transition) = outgoing.fail() {
                    warn!(%temp_id, error = %transition, "ignoring failure");
                    return SendOutcome::Stale;
                }
                warn!(%temp_id, error = %err, "message send failed");
                self.view.remove(&key);
                self.view.push_notice(Notice::SendFailed);
                SendOutcome::Failed(err)
            }
        }
    }

    /// Optimistically send `text` to the active conversation.
    pub async fn send(&mut self, text: &str) -> Result<Message, SyncError> {
        let pending = self.begin_send(text)?;
        let result = self.backend.insert_message(pending.message).await;
        match self.complete_send(pending.temp_id, result) {
            SendOutcome::Confirmed(message) => Ok(message),
            SendOutcome::Failed(err) => Err(err.into()),
            SendOutcome::Stale => Err(SyncError::NoActiveConversation),
        }
    }

    /// Render a pushed message unless it belongs elsewhere or was written
    /// by this surface's actor, who already sees it as a provisional entry.
    /// Returns whether anything was rendered.
    pub fn apply_push(&mut self, message: Message) -> bool {
        if self.active.as_ref() != Some(&message.conversation_id) {
            debug!(id = %message.id, conversation_id = %message.conversation_id, "push for inactive conversation");
            return false;
        }
        if message.sender_id == self.actor.id {
            debug!(id = %message.id, "own message echoed; already rendered");
            return false;
        }

        self.view.append(Entry::confirmed(&message, &self.actor.id));
        true
    }

    /// Wait for the next pushed message of the active conversation. Never
    /// resolves while no feed is open.
    pub async fn next_push(&mut self) -> Option<Message> {
        let Some(feed) = self.feed.as_mut() else {
            return std::future::pending().await;
        };

        let next = feed.recv().await;
        if next.is_none() {
            warn!("push feed closed; reopen the conversation to resume live updates");
            self.release_feed().await;
        }
        next
    }

    /// Receive one push and apply it.
    pub async fn pump(&mut self) -> bool {
        match self.next_push().await {
            Some(message) => self.apply_push(message),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ConversationStatus::{Pending, Rejected};
    use crate::entity::{ActorId, Role};
    use crate::sync::testing::{Call, RecordingBackend};
    use crate::sync::view::{Delivery, ViewState};
    use std::time::Duration;

    fn citizen() -> Actor {
        Actor::new("citizen", "Dilnoza", "998901234567", Role::User)
    }

    fn surface(backend: &Arc<RecordingBackend>) -> ChatSurface {
        ChatSurface::new(citizen(), backend.clone())
    }

    async fn no_push(surface: &mut ChatSurface) -> bool {
        tokio::time::timeout(Duration::from_millis(20), surface.next_push())
            .await
            .is_err()
    }

    #[tokio::test]
    async fn renders_history_in_returned_order() {
        let backend = Arc::new(RecordingBackend::new());
        let t = chrono::Utc::now();
        backend.seed("c1", "staff", "b", t);
        backend.seed("c1", "citizen", "a", t);
        backend.seed("c1", "staff", "c", t - chrono::Duration::seconds(5));
        let mut surface = surface(&backend);

        surface.open("c1".into(), Pending).await.unwrap();

        let texts: Vec<_> = surface.view().entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a", "c"]);
        assert_eq!(surface.view().state(), &ViewState::Ready);
        assert!(surface.is_live());
    }

    #[tokio::test]
    async fn empty_conversation_shows_placeholder() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);

        surface.open("c1".into(), Pending).await.unwrap();
        assert_eq!(
            surface.view().state(),
            &ViewState::Empty(Placeholder::AwaitingFirstMessage)
        );

        surface.open("c2".into(), Rejected).await.unwrap();
        assert_eq!(surface.view().state(), &ViewState::Empty(Placeholder::Closed));
    }

    #[tokio::test]
    async fn rejects_empty_conversation_id_without_backend_calls() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);

        assert_eq!(
            surface.open(" ".into(), Pending).await,
            Err(SyncError::EmptyConversationId)
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn load_failure_hides_previous_conversation() {
        let backend = Arc::new(RecordingBackend::new());
        backend.seed("a", "staff", "secret of a", chrono::Utc::now());
        let mut surface = surface(&backend);
        surface.open("a".into(), Pending).await.unwrap();
        assert_eq!(surface.view().entries().len(), 1);

        backend.fail_fetch(true);
        let result = surface.open("b".into(), Pending).await;

        assert!(matches!(result, Err(SyncError::Backend(BackendError::Query(_)))));
        assert!(surface.view().entries().is_empty());
        assert!(matches!(surface.view().state(), ViewState::Error(_)));
        assert!(!surface.is_live());
        assert_eq!(surface.active(), None);
        assert!(!surface.can_send());
    }

    #[tokio::test]
    async fn switching_releases_previous_feed_before_fetching() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);

        surface.open("a".into(), Pending).await.unwrap();
        surface.open("b".into(), Pending).await.unwrap();

        let calls = backend.calls();
        let sub_a = calls
            .iter()
            .find_map(|c| match c {
                Call::Subscribe(conv, id) if conv.as_str() == "a" => Some(*id),
                _ => None,
            })
            .unwrap();
        let release_a = calls
            .iter()
            .position(|c| matches!(c, Call::Release(id) if *id == sub_a))
            .unwrap();
        let fetch_b = calls
            .iter()
            .position(|c| matches!(c, Call::Fetch(conv) if conv.as_str() == "b"))
            .unwrap();
        assert!(release_a < fetch_b);

        let open_feeds = calls.iter().filter(|c| matches!(c, Call::Subscribe(..))).count()
            - calls.iter().filter(|c| matches!(c, Call::Release(_))).count();
        assert_eq!(open_feeds, 1);
    }

    #[tokio::test]
    async fn subscribe_failure_degrades_to_no_live_updates() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_subscribe(true);
        let mut surface = surface(&backend);

        surface.open("c1".into(), Pending).await.unwrap();
        assert!(!surface.is_live());
        assert!(surface.can_send());

        surface.send("still works").await.unwrap();
        assert_eq!(surface.view().entries().len(), 1);
    }

    #[tokio::test]
    async fn successful_send_renders_once_and_ignores_echo() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let stored = surface.send("  Salom  ").await.unwrap();
        assert_eq!(stored.text, "Salom");

        // The backend echoed the insert on the feed.
        let echo = surface.next_push().await.unwrap();
        assert_eq!(echo.id, stored.id);
        assert!(!surface.apply_push(echo));

        let entries = surface.view().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delivery, Some(Delivery::Delivered));
        assert!(entries[0].is_provisional());
        assert!(surface.can_send());
    }

    #[tokio::test]
    async fn echo_before_confirmation_is_still_deduplicated() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let pending = surface.begin_send("tez").unwrap();
        assert!(!surface.can_send());
        assert_eq!(
            surface.view().entries()[0].delivery,
            Some(Delivery::Sent)
        );

        let stored = backend.insert_now(pending.message.clone());
        // Push arrives first...
        assert!(!surface.pump().await);
        assert_eq!(surface.view().entries().len(), 1);
        // ...then the insert response.
        let outcome = surface.complete_send(pending.temp_id, Ok(stored));

        assert!(matches!(outcome, SendOutcome::Confirmed(_)));
        assert_eq!(surface.view().entries().len(), 1);
        assert_eq!(
            surface.view().entries()[0].delivery,
            Some(Delivery::Delivered)
        );
    }

    #[tokio::test]
    async fn failed_send_removes_entry_and_notifies_once() {
        let backend = Arc::new(RecordingBackend::new());
        backend.seed("c1", "staff", "hello", chrono::Utc::now());
        backend.fail_insert(true);
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let result = surface.send("offline").await;

        assert!(matches!(result, Err(SyncError::Backend(BackendError::Insert(_)))));
        let entries = surface.view().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "hello");
        assert_eq!(surface.take_notices(), vec![Notice::SendFailed]);
        assert!(surface.take_notices().is_empty());
        assert!(surface.can_send());
        assert!(no_push(&mut surface).await);

        // Retry by resubmitting.
        backend.fail_insert(false);
        surface.send("offline").await.unwrap();
        assert_eq!(surface.view().entries().len(), 2);
    }

    #[tokio::test]
    async fn provisional_entry_is_visible_until_failure() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let pending = surface.begin_send("hi").unwrap();
        assert_eq!(surface.view().entries().len(), 1);

        let outcome = surface.complete_send(
            pending.temp_id,
            Err(BackendError::Insert("network down".to_string())),
        );

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(surface.view().entries().is_empty());
        assert_eq!(
            surface.view().state(),
            &ViewState::Empty(Placeholder::AwaitingFirstMessage)
        );
        assert_eq!(surface.view().notices(), &[Notice::SendFailed]);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_side_effects() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();
        let calls_before = backend.calls().len();
        let epoch = surface.view().scroll_epoch();

        assert_eq!(surface.send("   \n\t").await, Err(SyncError::EmptyText));

        assert_eq!(backend.calls().len(), calls_before);
        assert!(surface.view().entries().is_empty());
        assert_eq!(surface.view().scroll_epoch(), epoch);
    }

    #[tokio::test]
    async fn only_one_send_may_be_outstanding() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let first = surface.begin_send("one").unwrap();
        assert_eq!(surface.begin_send("two"), Err(SyncError::SendInFlight));
        assert_eq!(surface.view().entries().len(), 1);

        let stored = backend.insert_now(first.message);
        surface.complete_send(first.temp_id, Ok(stored));
        let second = surface.begin_send("two").unwrap();
        assert_ne!(first.temp_id, second.temp_id);
    }

    #[tokio::test]
    async fn sending_requires_an_open_conversation() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        assert_eq!(
            surface.send("hello").await,
            Err(SyncError::NoActiveConversation)
        );
    }

    #[tokio::test]
    async fn pushes_from_others_render_exactly_once() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();
        let epoch = surface.view().scroll_epoch();

        backend.push_remote("c1", "staff", "Ko'rib chiqamiz");
        backend.push_remote("c1", "citizen", "from my other tab");

        assert!(surface.pump().await);
        assert!(!surface.pump().await);

        let entries = surface.view().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender_id, ActorId::new("staff"));
        assert!(!entries[0].mine);
        assert_eq!(surface.view().state(), &ViewState::Ready);
        assert!(surface.view().scroll_epoch() > epoch);
    }

    #[tokio::test]
    async fn pushes_for_other_conversations_are_ignored() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        let stray = Message {
            id: "x".to_string(),
            conversation_id: "c2".into(),
            sender_id: ActorId::new("staff"),
            text: "wrong room".to_string(),
            created_at: chrono::Utc::now(),
        };
        assert!(!surface.apply_push(stray));
        assert!(surface.view().entries().is_empty());
    }

    #[tokio::test]
    async fn switch_mid_send_makes_completion_stale() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("a".into(), Pending).await.unwrap();
        let pending = surface.begin_send("for a").unwrap();

        surface.open("b".into(), Pending).await.unwrap();
        assert!(surface.can_send());
        let stored = backend.insert_now(pending.message);

        assert_eq!(
            surface.complete_send(pending.temp_id, Ok(stored)),
            SendOutcome::Stale
        );
        assert!(surface.view().entries().is_empty());
    }

    #[tokio::test]
    async fn close_releases_feed_and_stops_pushes() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();

        surface.close().await;
        backend.push_remote("c1", "staff", "late");

        assert!(!surface.is_live());
        assert_eq!(surface.view().state(), &ViewState::Idle);
        assert!(matches!(backend.calls().last(), Some(Call::Release(_))));
        assert!(no_push(&mut surface).await);
    }

    #[tokio::test]
    async fn closed_feed_is_released() {
        let backend = Arc::new(RecordingBackend::new());
        let mut surface = surface(&backend);
        surface.open("c1".into(), Pending).await.unwrap();
        let subscribed = match backend.calls().last() {
            Some(Call::Subscribe(_, id)) => *id,
            other => panic!("expected a subscribe call, got {:?}", other),
        };

        backend.close_feeds();

        assert_eq!(surface.next_push().await, None);
        assert!(!surface.is_live());
        assert_eq!(backend.calls().last(), Some(&Call::Release(subscribed)));
        assert!(no_push(&mut surface).await);
    }

    #[tokio::test]
    async fn surfaces_over_one_backend_do_not_share_feeds() {
        let backend = Arc::new(RecordingBackend::new());
        let mut citizen_surface = surface(&backend);
        let mut staff_surface = ChatSurface::new(
            Actor::new("staff", "Rais", "998900000000", Role::Rais),
            backend.clone(),
        );
        citizen_surface.open("c1".into(), Pending).await.unwrap();
        staff_surface.open("c1".into(), Pending).await.unwrap();

        citizen_surface.send("yordam kerak").await.unwrap();

        assert!(staff_surface.pump().await);
        assert!(!citizen_surface.pump().await);
        assert_eq!(staff_surface.view().entries().len(), 1);
        assert_eq!(citizen_surface.view().entries().len(), 1);

        staff_surface.close().await;
        assert!(citizen_surface.is_live());
    }
}
