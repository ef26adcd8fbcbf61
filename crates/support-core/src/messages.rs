//! Message list store
//!
//! Owns the loaded message window of the active conversation: the initial
//! page, older pages prepended on scroll, and live echoes appended from push
//! events. It also owns the pane's scroll bookkeeping (at-bottom, the
//! "new message available" flag, anchors for prepends).
//!
//! Two request slots exist, one for the initial page and one for older
//! pages. Both are invalidated when the active conversation changes, so a
//! page for the previous conversation never lands in the new window.

use parking_lot::RwLock;
use std::sync::Arc;
use support_state::load::{LoadState, LoadTicket, LoadTracker, PaginationCursor};
use support_state::unread::UnreadTracker;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::models::{LastMessage, MessageId, MessageRecord};
use crate::service::{MessagesPageRequest, SupportApi};
use crate::viewport::{ScrollAnchor, Viewport};

const EVENT_CAPACITY: usize = 64;

/// Change notifications for the message pane
#[derive(Debug, Clone, PartialEq)]
pub enum MessageListEvent {
    /// The window was cleared for another conversation
    Reset {
        /// Conversation now active
        conversation_id: String,
    },
    /// The first page was loaded
    InitialLoaded {
        /// Conversation loaded
        conversation_id: String,
        /// Messages in the window
        count: usize,
        /// Whether older messages exist
        has_more: bool,
    },
    /// Older messages were prepended; restore the scroll offset from the anchor
    Prepended {
        /// Messages added
        count: usize,
        /// Whether still older messages exist
        has_more: bool,
        /// Scroll position before the prepend
        anchor: ScrollAnchor,
    },
    /// A live message was added to the window
    Appended {
        /// Id assigned to it
        id: MessageId,
    },
    /// The pane should scroll to the latest message once rendered
    ScrollToBottom,
    /// The "new message available" indicator changed
    NewMessageAvailable(bool),
    /// The conversation's messages have been seen
    Read {
        /// Conversation read
        conversation_id: String,
    },
}

/// Result of a page request
#[derive(Debug, Clone, PartialEq)]
pub enum MessageLoadOutcome {
    /// The first page was applied
    Loaded {
        /// Messages in the window
        count: usize,
        /// Whether older messages exist
        has_more: bool,
    },
    /// An older page was prepended
    Prepended {
        /// Messages added
        count: usize,
        /// Whether still older messages exist
        has_more: bool,
        /// Scroll position before the prepend
        anchor: ScrollAnchor,
    },
    /// Preconditions not met; nothing was requested
    Skipped,
    /// The active conversation changed while the request was in flight
    Superseded,
    /// The request failed
    Failed,
}

/// Result of a live append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message does not belong to the active conversation
    Ignored,
    /// The message is already in the window
    Duplicate,
    /// The message was added
    Appended {
        /// Id assigned to it
        id: MessageId,
        /// Whether the pane should follow it to the bottom
        scroll_to_bottom: bool,
    },
}

#[derive(Debug)]
struct WindowState {
    active: Option<String>,
    messages: Vec<MessageRecord>,
    cursor: PaginationCursor,
    initial: LoadTracker,
    older: LoadTracker,
    at_bottom: bool,
    new_message_available: bool,
    read_signalled: bool,
    auto_fill_done: bool,
    next_local_id: u64,
    disposed: bool,
}

impl WindowState {
    fn is_active(&self, conversation_id: &str) -> bool {
        self.active.as_deref() == Some(conversation_id)
    }

    fn next_local_id(&mut self) -> String {
        self.next_local_id += 1;
        format!("local-{}", self.next_local_id)
    }
}

struct Shared {
    api: Arc<dyn SupportApi>,
    config: SyncConfig,
    unread: UnreadTracker,
    state: RwLock<WindowState>,
    events: broadcast::Sender<MessageListEvent>,
}

/// Message window of the active conversation
///
/// Cheap to clone; clones share the same window.
#[derive(Clone)]
pub struct MessageListStore {
    shared: Arc<Shared>,
}

impl MessageListStore {
    /// Create an empty store
    ///
    /// The read signal clears the conversation from `unread`.
    pub fn new(api: Arc<dyn SupportApi>, config: SyncConfig, unread: UnreadTracker) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = WindowState {
            active: None,
            messages: Vec::new(),
            cursor: PaginationCursor::new(config.message_page_size),
            initial: LoadTracker::new(),
            older: LoadTracker::new(),
            at_bottom: true,
            new_message_available: false,
            read_signalled: false,
            auto_fill_done: false,
            next_local_id: 0,
            disposed: false,
        };

        Self {
            shared: Arc::new(Shared {
                api,
                config,
                unread,
                state: RwLock::new(state),
                events,
            }),
        }
    }

    /// Subscribe to pane changes
    pub fn subscribe(&self) -> broadcast::Receiver<MessageListEvent> {
        self.shared.events.subscribe()
    }

    /// Conversation the window belongs to
    pub fn active_conversation(&self) -> Option<String> {
        self.shared.state.read().active.clone()
    }

    /// Snapshot of the window, oldest first
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.shared.state.read().messages.clone()
    }

    /// Number of messages in the window
    pub fn len(&self) -> usize {
        self.shared.state.read().messages.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.shared.state.read().messages.is_empty()
    }

    /// Pagination position
    pub fn cursor(&self) -> PaginationCursor {
        self.shared.state.read().cursor
    }

    /// Whether older messages exist
    pub fn has_more(&self) -> bool {
        self.shared.state.read().cursor.has_more
    }

    /// Whether the pane is at (or near) the latest message
    pub fn is_at_bottom(&self) -> bool {
        self.shared.state.read().at_bottom
    }

    /// Whether a live message arrived while scrolled up
    pub fn new_message_available(&self) -> bool {
        self.shared.state.read().new_message_available
    }

    /// State of the initial page request
    pub fn initial_state(&self) -> LoadState {
        self.shared.state.read().initial.state()
    }

    /// Whether an older page is in flight
    pub fn is_loading_older(&self) -> bool {
        self.shared.state.read().older.is_loading()
    }

    /// Bind the window to another conversation
    ///
    /// Synchronously stops older-page loads, clears the messages and
    /// `has_more`, rewinds the cursor, resets at-bottom and clears the
    /// new-message flag. The returned ticket must be passed to
    /// [`load_initial`](Self::load_initial).
    pub fn reset_for(&self, conversation_id: &str) -> LoadTicket {
        let ticket = {
            let mut state = self.shared.state.write();
            state.older.invalidate();
            state.messages.clear();
            state.cursor.reset();
            state.cursor.exhaust();
            state.at_bottom = true;
            state.new_message_available = false;
            state.read_signalled = false;
            state.auto_fill_done = false;
            state.active = Some(conversation_id.to_string());
            state.initial.restart()
        };

        tracing::debug!(conversation_id, "message window reset");
        self.emit(MessageListEvent::Reset {
            conversation_id: conversation_id.to_string(),
        });
        ticket
    }

    /// Fetch the newest page for the conversation bound by `reset_for`
    pub async fn load_initial(&self, ticket: LoadTicket) -> MessageLoadOutcome {
        let request = {
            let state = self.shared.state.read();
            let Some(conversation_id) = state.active.clone() else {
                return MessageLoadOutcome::Skipped;
            };
            if state.disposed || !state.initial.is_current(ticket) {
                return MessageLoadOutcome::Superseded;
            }
            MessagesPageRequest {
                conversation_id,
                skip: 0,
                limit: state.cursor.limit,
            }
        };

        tracing::debug!(conversation_id = %request.conversation_id, "fetching newest messages");
        let result = self.shared.api.fetch_messages_page(request.clone()).await;

        let conversation_id = request.conversation_id;
        let (outcome, events) = {
            let mut state = self.shared.state.write();
            if !state.initial.is_current(ticket) || !state.is_active(&conversation_id) {
                tracing::debug!(%conversation_id, "discarding messages for a superseded conversation");
                return MessageLoadOutcome::Superseded;
            }

            match result {
                Ok(page) => {
                    state.initial.finish(ticket);

                    let live = std::mem::take(&mut state.messages);
                    state.messages = reconcile(page.data, live);

                    let count = state.messages.len();
                    let has_more = page.has_next;
                    state.cursor.set_skip(count);
                    state.cursor.has_more = has_more;
                    state.at_bottom = true;

                    let mut events = vec![
                        MessageListEvent::InitialLoaded {
                            conversation_id: conversation_id.clone(),
                            count,
                            has_more,
                        },
                        MessageListEvent::ScrollToBottom,
                    ];

                    if count > 0 && !state.read_signalled {
                        state.read_signalled = true;
                        events.push(MessageListEvent::Read {
                            conversation_id: conversation_id.clone(),
                        });
                    }

                    (MessageLoadOutcome::Loaded { count, has_more }, events)
                }
                Err(e) => {
                    tracing::warn!(%conversation_id, "Failed to fetch messages: {}", e);
                    state.initial.fail(ticket, e.to_string());
                    state.cursor.exhaust();
                    (MessageLoadOutcome::Failed, Vec::new())
                }
            }
        };

        for event in events {
            if let MessageListEvent::Read { conversation_id } = &event {
                self.shared.unread.remove(conversation_id);
            }
            self.emit(event);
        }
        outcome
    }

    /// Bind to `conversation_id` and load its newest page
    pub async fn open(&self, conversation_id: &str) -> MessageLoadOutcome {
        let ticket = self.reset_for(conversation_id);
        self.load_initial(ticket).await
    }

    /// Record the pane's scroll position
    ///
    /// Recomputes at-bottom; reaching the bottom clears the new-message flag.
    pub fn update_viewport(&self, viewport: Viewport) {
        let cleared = {
            let mut state = self.shared.state.write();
            state.at_bottom = viewport.is_near_bottom(self.shared.config.at_bottom_threshold_px);
            if state.at_bottom && state.new_message_available {
                state.new_message_available = false;
                true
            } else {
                false
            }
        };

        if cleared {
            self.emit(MessageListEvent::NewMessageAvailable(false));
        }
    }

    /// React to the pane being scrolled
    ///
    /// Updates at-bottom and, near the top, loads the next older page.
    pub async fn on_scroll(&self, viewport: Viewport) -> MessageLoadOutcome {
        self.update_viewport(viewport);
        self.load_older(viewport).await
    }

    /// Load the next older page if the pane is near the top
    ///
    /// Requires the initial page to be loaded, `has_more`, and no older
    /// page in flight.
    pub async fn load_older(&self, viewport: Viewport) -> MessageLoadOutcome {
        if !viewport.is_near_top(self.shared.config.older_page_threshold_px) {
            return MessageLoadOutcome::Skipped;
        }
        self.fetch_older(viewport).await
    }

    /// Issue one older-page load when the content does not fill the pane
    ///
    /// Runs at most once per initial load.
    pub async fn fill_viewport(&self, viewport: Viewport) -> MessageLoadOutcome {
        {
            let mut state = self.shared.state.write();
            if viewport.is_filled() || !state.cursor.has_more || state.auto_fill_done {
                return MessageLoadOutcome::Skipped;
            }
            state.auto_fill_done = true;
        }
        tracing::debug!("content does not fill the pane, loading an older page");
        self.fetch_older(viewport).await
    }

    async fn fetch_older(&self, viewport: Viewport) -> MessageLoadOutcome {
        let (ticket, request, anchor) = {
            let mut state = self.shared.state.write();
            if state.disposed
                || state.initial.state() != LoadState::Loaded
                || !state.cursor.has_more
            {
                return MessageLoadOutcome::Skipped;
            }
            let Some(conversation_id) = state.active.clone() else {
                return MessageLoadOutcome::Skipped;
            };
            let Some(ticket) = state.older.begin() else {
                tracing::debug!("older page already in flight");
                return MessageLoadOutcome::Skipped;
            };

            let request = MessagesPageRequest {
                conversation_id,
                skip: state.messages.len(),
                limit: state.cursor.limit,
            };
            (ticket, request, ScrollAnchor::capture(&viewport))
        };

        tracing::debug!(
            conversation_id = %request.conversation_id,
            skip = request.skip,
            "fetching older messages"
        );
        let result = self.shared.api.fetch_messages_page(request.clone()).await;

        let outcome = {
            let mut state = self.shared.state.write();
            if !state.older.is_current(ticket) || !state.is_active(&request.conversation_id) {
                tracing::debug!(
                    conversation_id = %request.conversation_id,
                    "discarding older page for a superseded conversation"
                );
                return MessageLoadOutcome::Superseded;
            }

            match result {
                Ok(page) => {
                    state.older.finish(ticket);

                    let mut older: Vec<MessageRecord> = page
                        .data
                        .into_iter()
                        .filter(|m| !state.messages.iter().any(|known| known.id == m.id))
                        .collect();
                    let count = older.len();
                    older.append(&mut state.messages);
                    sort_by_created_at(&mut older);
                    state.messages = older;

                    let len = state.messages.len();
                    state.cursor.set_skip(len);
                    state.cursor.has_more = page.has_next;

                    MessageLoadOutcome::Prepended {
                        count,
                        has_more: page.has_next,
                        anchor,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %request.conversation_id,
                        "Failed to fetch older messages: {}",
                        e
                    );
                    state.older.fail(ticket, e.to_string());
                    state.cursor.exhaust();
                    MessageLoadOutcome::Failed
                }
            }
        };

        if let MessageLoadOutcome::Prepended {
            count,
            has_more,
            anchor,
        } = &outcome
        {
            self.emit(MessageListEvent::Prepended {
                count: *count,
                has_more: *has_more,
                anchor: *anchor,
            });
        }
        outcome
    }

    /// Add a live message pushed for `conversation_id`
    ///
    /// Only the active conversation is affected. The record gets a local
    /// pending id until a page load brings its confirmed copy.
    pub fn append_live(&self, conversation_id: &str, message: &LastMessage) -> AppendOutcome {
        let (outcome, events) = {
            let mut state = self.shared.state.write();
            if state.disposed || !state.is_active(conversation_id) {
                return AppendOutcome::Ignored;
            }

            let local_id = state.next_local_id();
            let record = MessageRecord::pending(conversation_id, local_id, message);

            let duplicate = state.messages.iter().any(|known| {
                let same_server_id = match (&known.id, &message.id) {
                    (MessageId::Confirmed(known), Some(pushed)) => known == pushed,
                    _ => false,
                };
                same_server_id || known.same_content(&record)
            });
            if duplicate {
                tracing::trace!(conversation_id, "live message already in window");
                return AppendOutcome::Duplicate;
            }

            let id = record.id.clone();
            let index = state
                .messages
                .partition_point(|m| m.created_at <= record.created_at);
            state.messages.insert(index, record);
            let len = state.messages.len();
            state.cursor.set_skip(len);

            let scroll_to_bottom = state.at_bottom;
            let mut events = vec![MessageListEvent::Appended { id: id.clone() }];
            if scroll_to_bottom {
                events.push(MessageListEvent::ScrollToBottom);
            } else if !state.new_message_available {
                state.new_message_available = true;
                events.push(MessageListEvent::NewMessageAvailable(true));
            }

            (
                AppendOutcome::Appended {
                    id,
                    scroll_to_bottom,
                },
                events,
            )
        };

        for event in events {
            self.emit(event);
        }
        outcome
    }

    /// Explicit jump to the latest message
    pub fn jump_to_bottom(&self) {
        let cleared = {
            let mut state = self.shared.state.write();
            state.at_bottom = true;
            std::mem::take(&mut state.new_message_available)
        };

        if cleared {
            self.emit(MessageListEvent::NewMessageAvailable(false));
        }
        self.emit(MessageListEvent::ScrollToBottom);
    }

    /// Drop responses still in flight and ignore further input
    pub fn dispose(&self) {
        let mut state = self.shared.state.write();
        state.disposed = true;
        state.initial.invalidate();
        state.older.invalidate();
    }

    fn emit(&self, event: MessageListEvent) {
        let _ = self.shared.events.send(event);
    }
}

/// Merge a freshly fetched page with messages appended while it was in flight
///
/// A pending echo whose content matches a confirmed message is dropped in
/// favour of the confirmed copy.
fn reconcile(page: Vec<MessageRecord>, live: Vec<MessageRecord>) -> Vec<MessageRecord> {
    let mut merged = page;
    for record in live {
        let known = merged
            .iter()
            .any(|m| m.id == record.id || (record.id.is_pending() && m.same_content(&record)));
        if !known {
            merged.push(record);
        }
    }
    sort_by_created_at(&mut merged);
    merged
}

/// Stable sort, oldest first
fn sort_by_created_at(messages: &mut [MessageRecord]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessagePayload, MessageSide, Page};
    use crate::service::{ApiError, MockSupportApi};
    use chrono::{DateTime, TimeZone, Utc};
    use support_client::rest::RestError;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn message(id: &str, secs: i64) -> MessageRecord {
        MessageRecord {
            id: MessageId::Confirmed(id.to_string()),
            conversation_id: "c1".to_string(),
            side: MessageSide::Customer,
            payload: MessagePayload::text(format!("text {}", id)),
            created_at: at(secs),
        }
    }

    fn echo(text: &str, secs: i64) -> LastMessage {
        LastMessage {
            id: None,
            side: MessageSide::Customer,
            payload: MessagePayload::text(text),
            created_at: at(secs),
        }
    }

    /// Twenty messages, newest page first, ids m{skip}..m{skip+19}
    fn newest_first_page(skip: usize, has_next: bool) -> Page<MessageRecord> {
        let data = (skip..skip + 20)
            .map(|i| message(&format!("m{}", i), 1_000 - i as i64))
            .collect();
        Page::new(data, has_next)
    }

    fn store(api: MockSupportApi) -> (MessageListStore, UnreadTracker) {
        let unread = UnreadTracker::new();
        let store = MessageListStore::new(Arc::new(api), SyncConfig::default(), unread.clone());
        (store, unread)
    }

    fn ids(store: &MessageListStore) -> Vec<String> {
        store
            .messages()
            .iter()
            .map(|m| m.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_initial_load_sorts_and_signals_read() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .withf(|req| req.conversation_id == "c1" && req.skip == 0 && req.limit == 20)
            .times(1)
            .returning(|_| Ok(Page::new(vec![message("b", 2), message("a", 1)], false)));

        let (store, unread) = store(api);
        unread.add("c1");
        let mut events = store.subscribe();

        let outcome = store.open("c1").await;

        assert_eq!(
            outcome,
            MessageLoadOutcome::Loaded {
                count: 2,
                has_more: false
            }
        );
        assert_eq!(ids(&store), vec!["a", "b"]);
        assert!(!unread.is_unread("c1"));
        assert!(store.is_at_bottom());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&MessageListEvent::ScrollToBottom));
        assert!(seen.contains(&MessageListEvent::Read {
            conversation_id: "c1".to_string()
        }));
    }

    #[tokio::test]
    async fn test_empty_conversation_is_not_marked_read() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|_| Ok(Page::empty()));

        let (store, unread) = store(api);
        unread.add("c1");
        store.open("c1").await;

        assert!(unread.is_unread("c1"));
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn test_reset_clears_window_synchronously() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|_| Ok(newest_first_page(0, true)));

        let (store, _) = store(api);
        store.open("c1").await;
        store.update_viewport(Viewport::new(0.0, 2000.0, 500.0));
        store.append_live("c1", &echo("late", 5_000));
        assert!(store.new_message_available());

        store.reset_for("c2");

        assert!(store.is_empty());
        assert!(!store.has_more());
        assert_eq!(store.cursor().skip, 0);
        assert!(store.is_at_bottom());
        assert!(!store.new_message_available());
        assert_eq!(store.active_conversation().as_deref(), Some("c2"));
        assert_eq!(store.initial_state(), LoadState::Loading);
    }

    #[tokio::test]
    async fn test_stale_initial_ticket_is_discarded() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|req| {
                let mut page = Page::new(vec![message("x", 1)], false);
                page.data[0].conversation_id = req.conversation_id;
                Ok(page)
            });

        let (store, _) = store(api);
        let stale = store.reset_for("c1");
        let fresh = store.reset_for("c2");

        assert_eq!(store.load_initial(stale).await, MessageLoadOutcome::Superseded);
        assert!(store.is_empty());
        assert!(matches!(
            store.load_initial(fresh).await,
            MessageLoadOutcome::Loaded { count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_older_page_prepends_with_anchor() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 0)
            .times(1)
            .returning(|_| Ok(newest_first_page(0, true)));
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 20 && req.limit == 20)
            .times(1)
            .returning(|_| Ok(newest_first_page(20, false)));

        let (store, _) = store(api);
        store.open("c1").await;

        let top = Viewport::new(10.0, 1200.0, 600.0);
        let outcome = store.on_scroll(top).await;

        assert_eq!(
            outcome,
            MessageLoadOutcome::Prepended {
                count: 20,
                has_more: false,
                anchor: ScrollAnchor::capture(&top),
            }
        );
        assert_eq!(store.len(), 40);
        assert_eq!(store.messages()[0].id.as_str(), "m39");
        assert_eq!(store.messages()[39].id.as_str(), "m0");
        assert!(!store.has_more());

        // Exhausted
        assert_eq!(store.load_older(top).await, MessageLoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_older_load_requires_top_and_initial_page() {
        let api = MockSupportApi::new();
        let (store, _) = store(api);

        // Not bound to a conversation yet
        let top = Viewport::new(0.0, 1200.0, 600.0);
        assert_eq!(store.load_older(top).await, MessageLoadOutcome::Skipped);

        store.reset_for("c1");
        // Initial page still pending
        assert_eq!(store.load_older(top).await, MessageLoadOutcome::Skipped);

        let middle = Viewport::new(400.0, 1200.0, 600.0);
        assert_eq!(store.load_older(middle).await, MessageLoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_fill_viewport_loads_once() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 0)
            .times(1)
            .returning(|_| Ok(Page::new(vec![message("a", 10)], true)));
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 1)
            .times(1)
            .returning(|_| Ok(Page::new(vec![message("z", 1)], true)));

        let (store, _) = store(api);
        store.open("c1").await;

        let short = Viewport::new(0.0, 100.0, 600.0);
        assert!(matches!(
            store.fill_viewport(short).await,
            MessageLoadOutcome::Prepended { count: 1, .. }
        ));
        assert_eq!(store.fill_viewport(short).await, MessageLoadOutcome::Skipped);
        assert_eq!(ids(&store), vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_failed_older_load_stops_pagination() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 0)
            .returning(|_| Ok(newest_first_page(0, true)));
        api.expect_fetch_messages_page()
            .withf(|req| req.skip == 20)
            .times(1)
            .returning(|_| Err(ApiError::Rest(RestError::new(503, "Unavailable", "down"))));

        let (store, _) = store(api);
        store.open("c1").await;

        let top = Viewport::new(0.0, 1200.0, 600.0);
        assert_eq!(store.load_older(top).await, MessageLoadOutcome::Failed);
        assert!(!store.has_more());
        assert!(!store.is_loading_older());
        assert_eq!(store.len(), 20);
    }

    #[tokio::test]
    async fn test_live_append_at_bottom_scrolls() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|_| Ok(Page::empty()));

        let (store, _) = store(api);
        store.open("c1").await;
        let mut events = store.subscribe();

        let outcome = store.append_live("c1", &echo("hello", 50));

        assert!(matches!(
            outcome,
            AppendOutcome::Appended {
                scroll_to_bottom: true,
                ..
            }
        ));
        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].id.is_pending());
        assert!(!store.new_message_available());

        assert!(matches!(events.try_recv().unwrap(), MessageListEvent::Appended { .. }));
        assert_eq!(events.try_recv().unwrap(), MessageListEvent::ScrollToBottom);
    }

    #[tokio::test]
    async fn test_live_append_scrolled_up_sets_flag() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|_| Ok(newest_first_page(0, false)));

        let (store, _) = store(api);
        store.open("c1").await;
        store.update_viewport(Viewport::new(100.0, 2000.0, 500.0));
        assert!(!store.is_at_bottom());

        let outcome = store.append_live("c1", &echo("are you there?", 5_000));
        assert!(matches!(
            outcome,
            AppendOutcome::Appended {
                scroll_to_bottom: false,
                ..
            }
        ));
        assert!(store.new_message_available());
        assert_eq!(store.len(), 21);

        // Scrolling back down clears it
        store.update_viewport(Viewport::at_bottom_of(2048.0, 500.0));
        assert!(!store.new_message_available());

        store.update_viewport(Viewport::new(0.0, 2048.0, 500.0));
        store.append_live("c1", &echo("hello?", 5_001));
        assert!(store.new_message_available());
        store.jump_to_bottom();
        assert!(!store.new_message_available());
        assert!(store.is_at_bottom());
    }

    #[tokio::test]
    async fn test_live_append_filters_other_conversations_and_duplicates() {
        let mut api = MockSupportApi::new();
        api.expect_fetch_messages_page()
            .returning(|_| Ok(Page::new(vec![message("m1", 10)], false)));

        let (store, _) = store(api);
        store.open("c1").await;

        assert_eq!(store.append_live("c2", &echo("x", 20)), AppendOutcome::Ignored);

        let mut known = echo("whatever", 30);
        known.id = Some("m1".to_string());
        assert_eq!(store.append_live("c1", &known), AppendOutcome::Duplicate);

        let fresh = echo("new", 40);
        assert!(matches!(store.append_live("c1", &fresh), AppendOutcome::Appended { .. }));
        assert_eq!(store.append_live("c1", &fresh), AppendOutcome::Duplicate);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_reconcile_replaces_pending_with_confirmed() {
        let echoed = MessageRecord::pending("c1", "local-1", &echo("ping", 5));
        let unrelated = MessageRecord::pending("c1", "local-2", &echo("pong", 7));
        let confirmed = MessageRecord {
            id: MessageId::Confirmed("m5".to_string()),
            ..echoed.clone()
        };

        let merged = reconcile(
            vec![message("m1", 1), confirmed.clone()],
            vec![echoed, unrelated.clone()],
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1], confirmed);
        assert_eq!(merged[2], unrelated);
    }
}
