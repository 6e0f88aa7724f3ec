//! Optimistic-send reconciliation for a client's local view of one chat
//!
//! A client shows its own message as soon as the user hits send. The same
//! message later comes back from the server as a broadcast. [`ChatView`]
//! keeps those two from rendering twice:
//!
//! 1. an incoming message whose id is already in the view is dropped;
//! 2. otherwise the earliest provisional entry with the same sender and
//!    content is removed before the confirmed message is appended;
//! 3. otherwise the message is appended as new.
//!
//! A failed send removes its provisional entry and puts the text back into the
//! compose field.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{Message, Sender};

/// Prefix marking an entry id as local and unconfirmed
pub const PROVISIONAL_PREFIX: &str = "temp_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    /// Server-assigned message id
    Confirmed(Uuid),
    /// Local temporary id, always starting with [`PROVISIONAL_PREFIX`]
    Provisional(String),
}

impl EntryId {
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed(id) => write!(f, "{}", id),
            Self::Provisional(temp_id) => write!(f, "{}", temp_id),
        }
    }
}

/// One rendered line in the chat view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntry {
    pub id: EntryId,
    pub sender: Sender,
    pub display_name: String,
    pub content: String,
    pub timestamp: OffsetDateTime,
}

impl ViewEntry {
    fn confirmed(message: Message) -> Self {
        Self {
            id: EntryId::Confirmed(message.id),
            sender: message.sender,
            display_name: message.display_name,
            content: message.content,
            timestamp: message.timestamp,
        }
    }

    fn is_provisional_for(&self, sender: Sender, content: &str) -> bool {
        self.id.is_provisional() && self.sender == sender && self.content == content
    }
}

/// What [`ChatView::apply`] did with an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Already present; view unchanged
    Duplicate,
    /// Took the place of a matching provisional entry
    ReplacedProvisional,
    /// Added as a new entry
    Appended,
    /// Belongs to a different chat; view unchanged
    ForeignChat,
}

/// A send the client has rendered but the server has not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub temp_id: String,
    pub content: String,
}

/// A client's ordered view of a single chat plus its compose field
#[derive(Debug, Default)]
pub struct ChatView {
    chat_id: Option<Uuid>,
    entries: Vec<ViewEntry>,
    compose: String,
    next_temp: u64,
}

impl ChatView {
    /// A view that accepts messages for any chat until one is bound
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_chat(chat_id: Uuid) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn chat_id(&self) -> Option<Uuid> {
        self.chat_id
    }

    /// Bind the view to a chat, e.g. once an anonymous widget learns its chat id
    pub fn bind_chat(&mut self, chat_id: Uuid) {
        self.chat_id = Some(chat_id);
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.id.is_provisional()).count()
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    /// Render the compose field as a provisional entry and clear it.
    ///
    /// Returns `None` when there is nothing to send.
    pub fn begin_send(
        &mut self,
        sender: Sender,
        display_name: &str,
        now: OffsetDateTime,
    ) -> Option<PendingSend> {
        let content = self.compose.trim().to_string();
        if content.is_empty() {
            return None;
        }

        self.next_temp += 1;
        let temp_id = format!("{}{}", PROVISIONAL_PREFIX, self.next_temp);

        self.entries.push(ViewEntry {
            id: EntryId::Provisional(temp_id.clone()),
            sender,
            display_name: display_name.to_string(),
            content: content.clone(),
            timestamp: now,
        });
        self.compose.clear();

        Some(PendingSend { temp_id, content })
    }

    /// Merge a server-confirmed message into the view
    pub fn apply(&mut self, message: Message) -> MergeOutcome {
        if self.chat_id.is_some_and(|id| id != message.chat_id) {
            return MergeOutcome::ForeignChat;
        }

        let id = EntryId::Confirmed(message.id);
        if self.entries.iter().any(|e| e.id == id) {
            return MergeOutcome::Duplicate;
        }

        let provisional = self
            .entries
            .iter()
            .position(|e| e.is_provisional_for(message.sender, &message.content));

        let outcome = match provisional {
            Some(index) => {
                self.entries.remove(index);
                MergeOutcome::ReplacedProvisional
            }
            None => MergeOutcome::Appended,
        };

        self.entries.push(ViewEntry::confirmed(message));
        outcome
    }

    /// Roll back a failed send: drop its provisional entry and restore the text.
    ///
    /// Returns `false` if the entry was already reconciled or rolled back.
    pub fn fail_send(&mut self, temp_id: &str) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|e| matches!(&e.id, EntryId::Provisional(t) if t == temp_id))
        else {
            return false;
        };

        let entry = self.entries.remove(index);
        self.compose = entry.content;
        true
    }

    /// Replace confirmed entries with a freshly listed history.
    ///
    /// A provisional entry whose message is already in the history is
    /// settled by it, one history message per entry, earliest first. Only
    /// messages that were not in the view before count. The remaining
    /// provisional entries stay at the end.
    pub fn load_history(&mut self, messages: Vec<Message>) {
        let chat_id = self.chat_id;
        let messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| chat_id.map_or(true, |id| id == m.chat_id))
            .collect();

        let mut unmatched: Vec<&Message> = messages
            .iter()
            .filter(|m| {
                let id = EntryId::Confirmed(m.id);
                !self.entries.iter().any(|e| e.id == id)
            })
            .collect();

        let pending: Vec<ViewEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.id.is_provisional())
            .filter(|e| {
                match unmatched
                    .iter()
                    .position(|m| e.is_provisional_for(m.sender, &m.content))
                {
                    Some(index) => {
                        unmatched.remove(index);
                        false
                    }
                    None => true,
                }
            })
            .collect();

        self.entries = messages.into_iter().map(ViewEntry::confirmed).collect();
        self.entries.extend(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed(chat_id: Uuid, sender: Sender, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id,
            sender,
            author_id: None,
            display_name: "alice".to_string(),
            content: content.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    fn send(view: &mut ChatView, text: &str) -> PendingSend {
        view.set_compose(text);
        view.begin_send(Sender::User, "alice", OffsetDateTime::now_utc())
            .unwrap()
    }

    #[test]
    fn test_provisional_appears_immediately_and_clears_compose() {
        let mut view = ChatView::for_chat(Uuid::new_v4());
        let pending = send(&mut view, "  test  ");

        assert_eq!(pending.content, "test");
        assert!(pending.temp_id.starts_with(PROVISIONAL_PREFIX));
        assert_eq!(view.len(), 1);
        assert_eq!(view.pending_count(), 1);
        assert_eq!(view.compose(), "");
    }

    #[test]
    fn test_blank_compose_sends_nothing() {
        let mut view = ChatView::new();
        view.set_compose("   ");
        assert!(view
            .begin_send(Sender::User, "alice", OffsetDateTime::now_utc())
            .is_none());
        assert!(view.is_empty());
    }

    #[test]
    fn test_confirmation_replaces_provisional() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "test");

        let echo = confirmed(chat_id, Sender::User, "test");
        assert_eq!(view.apply(echo.clone()), MergeOutcome::ReplacedProvisional);

        assert_eq!(view.len(), 1);
        assert_eq!(view.pending_count(), 0);
        assert_eq!(view.entries()[0].id, EntryId::Confirmed(echo.id));
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "test");

        let echo = confirmed(chat_id, Sender::User, "test");
        view.apply(echo.clone());
        assert_eq!(view.apply(echo.clone()), MergeOutcome::Duplicate);
        assert_eq!(view.apply(echo), MergeOutcome::Duplicate);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_same_content_from_other_sender_does_not_consume_provisional() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "ok");

        let admin_ok = confirmed(chat_id, Sender::Admin, "ok");
        assert_eq!(view.apply(admin_ok), MergeOutcome::Appended);
        assert_eq!(view.len(), 2);
        assert_eq!(view.pending_count(), 1);
    }

    #[test]
    fn test_repeated_text_consumes_one_provisional_per_echo() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "ok");
        send(&mut view, "ok");

        view.apply(confirmed(chat_id, Sender::User, "ok"));
        assert_eq!(view.len(), 2);
        assert_eq!(view.pending_count(), 1);

        view.apply(confirmed(chat_id, Sender::User, "ok"));
        assert_eq!(view.len(), 2);
        assert_eq!(view.pending_count(), 0);
    }

    #[test]
    fn test_failed_send_restores_compose() {
        let mut view = ChatView::for_chat(Uuid::new_v4());
        let pending = send(&mut view, "test");

        assert!(view.fail_send(&pending.temp_id));
        assert!(view.is_empty());
        assert_eq!(view.compose(), "test");

        // Second rollback of the same send is a no-op
        assert!(!view.fail_send(&pending.temp_id));
    }

    #[test]
    fn test_messages_for_other_chats_are_ignored() {
        let mut view = ChatView::for_chat(Uuid::new_v4());
        let other = confirmed(Uuid::new_v4(), Sender::Admin, "hi");
        assert_eq!(view.apply(other), MergeOutcome::ForeignChat);
        assert!(view.is_empty());
    }

    #[test]
    fn test_unbound_view_accepts_first_chat_then_binds() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::new();
        send(&mut view, "hello");

        assert_eq!(
            view.apply(confirmed(chat_id, Sender::User, "hello")),
            MergeOutcome::ReplacedProvisional
        );
        view.bind_chat(chat_id);
        assert_eq!(view.chat_id(), Some(chat_id));
    }

    #[test]
    fn test_load_history_keeps_pending_sends() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        view.apply(confirmed(chat_id, Sender::Admin, "stale"));
        send(&mut view, "still sending");

        let history = vec![
            confirmed(chat_id, Sender::User, "hello"),
            confirmed(chat_id, Sender::Admin, "hi"),
        ];
        view.load_history(history);

        let contents: Vec<&str> = view.entries().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi", "still sending"]);
        assert_eq!(view.pending_count(), 1);
    }

    #[test]
    fn test_history_settles_send_before_its_echo_arrives() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "test");

        let stored = confirmed(chat_id, Sender::User, "test");
        view.load_history(vec![stored.clone()]);
        assert_eq!(view.len(), 1);
        assert_eq!(view.pending_count(), 0);

        // The live echo lands after the backfill
        assert_eq!(view.apply(stored.clone()), MergeOutcome::Duplicate);
        assert_eq!(view.len(), 1);
        assert_eq!(view.entries()[0].id, EntryId::Confirmed(stored.id));
    }

    #[test]
    fn test_history_settles_one_pending_send_per_stored_message() {
        let chat_id = Uuid::new_v4();
        let mut view = ChatView::for_chat(chat_id);
        send(&mut view, "ok");
        send(&mut view, "ok");

        let first = confirmed(chat_id, Sender::User, "ok");
        view.load_history(vec![first.clone()]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.pending_count(), 1);

        // Reloading the same history does not settle the second send
        view.load_history(vec![first.clone()]);
        assert_eq!(view.pending_count(), 1);

        let second = confirmed(chat_id, Sender::User, "ok");
        assert_eq!(view.apply(second), MergeOutcome::ReplacedProvisional);
        assert_eq!(view.len(), 2);
        assert_eq!(view.pending_count(), 0);
    }
}
