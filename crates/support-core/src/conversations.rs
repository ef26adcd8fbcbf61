//! Conversation list store
//!
//! Holds the paginated, filterable list of conversation summaries shown in
//! the sidebar. Pages merge by id and the list stays ordered by recency,
//! most recent first. Live push events upsert rows without a refetch.
//!
//! Responses are tagged with the generation of the request that produced
//! them; a filter change bumps the generation so a late page for the old
//! filter is discarded instead of being merged into the new list.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use support_state::load::{LoadState, LoadTracker, PaginationCursor};
use support_state::timers::{Debouncer, Throttle};
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::models::{ConversationFilter, ConversationSummary};
use crate::service::{ConversationsPageRequest, SupportApi};
use crate::viewport::Viewport;

const EVENT_CAPACITY: usize = 64;

/// Change notifications for the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationListEvent {
    /// The list was emptied for a new filter
    Cleared {
        /// Filter now active
        filter: ConversationFilter,
    },
    /// A fetched page was merged
    PageMerged {
        /// Rows received
        received: usize,
        /// Whether the server reported more rows
        has_more: bool,
    },
    /// A row was inserted or moved by a live event
    Upserted {
        /// Conversation id
        id: String,
    },
    /// A row's content changed in place
    Updated {
        /// Conversation id
        id: String,
    },
    /// A row left the list because it no longer matches the filter
    Removed {
        /// Conversation id
        id: String,
    },
    /// The selection changed
    Selected {
        /// Selected conversation, if any
        id: Option<String>,
    },
}

/// Result of a page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListLoadOutcome {
    /// The page was merged
    Loaded {
        /// Rows received
        received: usize,
        /// Whether the server reported more rows
        has_more: bool,
        /// Conversation selected because nothing was selected yet
        auto_selected: Option<String>,
    },
    /// Nothing was requested (a load was in flight or the list is exhausted)
    Skipped,
    /// The response arrived after a filter change and was dropped
    Superseded,
    /// The request failed; pagination stops until the next reset
    Failed,
}

#[derive(Debug)]
struct ListState {
    items: Vec<ConversationSummary>,
    filter: ConversationFilter,
    cursor: PaginationCursor,
    load: LoadTracker,
    selected: Option<String>,
    disposed: bool,
}

struct Shared {
    api: Arc<dyn SupportApi>,
    config: SyncConfig,
    state: RwLock<ListState>,
    events: broadcast::Sender<ConversationListEvent>,
    scroll_debounce: Debouncer,
    scroll_throttle: Throttle,
}

/// Paginated, filterable conversation list
///
/// Cheap to clone; clones share the same list.
#[derive(Clone)]
pub struct ConversationListStore {
    shared: Arc<Shared>,
}

impl ConversationListStore {
    /// Create an empty list
    pub fn new(api: Arc<dyn SupportApi>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = ListState {
            items: Vec::new(),
            filter: ConversationFilter::default(),
            cursor: PaginationCursor::new(config.conversation_page_size),
            load: LoadTracker::new(),
            selected: None,
            disposed: false,
        };

        Self {
            shared: Arc::new(Shared {
                api,
                scroll_throttle: Throttle::new(config.load_more_interval()),
                scroll_debounce: Debouncer::new(),
                config,
                state: RwLock::new(state),
                events,
            }),
        }
    }

    /// Subscribe to list changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationListEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the rows, most recent first
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.shared.state.read().items.clone()
    }

    /// Ids of the rows, most recent first
    pub fn ids(&self) -> Vec<String> {
        self.shared
            .state
            .read()
            .items
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    /// Look up one row
    pub fn get(&self, id: &str) -> Option<ConversationSummary> {
        self.shared
            .state
            .read()
            .items
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.shared.state.read().items.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.shared.state.read().items.is_empty()
    }

    /// Active filter
    pub fn filter(&self) -> ConversationFilter {
        self.shared.state.read().filter
    }

    /// Pagination position
    pub fn cursor(&self) -> PaginationCursor {
        self.shared.state.read().cursor
    }

    /// Whether the server reported more rows
    pub fn has_more(&self) -> bool {
        self.shared.state.read().cursor.has_more
    }

    /// State of the page request slot
    pub fn load_state(&self) -> LoadState {
        self.shared.state.read().load.state()
    }

    /// Whether a page request is in flight
    pub fn is_loading(&self) -> bool {
        self.shared.state.read().load.is_loading()
    }

    /// Selected conversation
    pub fn selected(&self) -> Option<String> {
        self.shared.state.read().selected.clone()
    }

    /// Record the selected conversation
    pub fn set_selected(&self, id: Option<String>) {
        {
            let mut state = self.shared.state.write();
            if state.selected == id {
                return;
            }
            state.selected = id.clone();
        }
        self.emit(ConversationListEvent::Selected { id });
    }

    /// Fetch a page for `filter`
    ///
    /// With `reset` the first page is requested and replaces the rows;
    /// otherwise the next page (skip = current row count) is merged in.
    /// A different filter than the active one always resets.
    pub async fn load(&self, filter: ConversationFilter, reset: bool) -> ListLoadOutcome {
        let (ticket, request) = {
            let mut state = self.shared.state.write();
            if state.disposed {
                return ListLoadOutcome::Skipped;
            }

            let reset = if state.filter != filter {
                Self::clear_for_filter(&mut state, filter);
                self.emit(ConversationListEvent::Cleared { filter });
                true
            } else {
                reset
            };

            if !reset && !state.cursor.has_more {
                tracing::debug!("conversation list exhausted, not loading more");
                return ListLoadOutcome::Skipped;
            }

            let Some(ticket) = state.load.begin() else {
                tracing::debug!("conversation page already in flight");
                return ListLoadOutcome::Skipped;
            };

            let skip = if reset { 0 } else { state.items.len() };
            let request = ConversationsPageRequest {
                skip,
                limit: state.cursor.limit,
                filter: state.filter,
            };
            (ticket, request)
        };

        tracing::debug!(
            skip = request.skip,
            limit = request.limit,
            filter = %request.filter,
            "fetching conversation page"
        );
        let result = self
            .shared
            .api
            .fetch_conversations_page(request.clone())
            .await;

        let (outcome, events) = {
            let mut state = self.shared.state.write();
            if !state.load.is_current(ticket) {
                tracing::debug!(
                    filter = %request.filter,
                    "discarding conversation page for a superseded request"
                );
                return ListLoadOutcome::Superseded;
            }

            match result {
                Ok(page) => {
                    state.load.finish(ticket);
                    let received = page.data.len();
                    let has_more = page.has_next;

                    if request.skip == 0 {
                        let mut items = collapse_duplicates(page.data);
                        sort_by_recency(&mut items);
                        state.items = items;
                    } else {
                        merge_page(&mut state.items, page.data);
                        sort_by_recency(&mut state.items);
                    }

                    let len = state.items.len();
                    state.cursor.set_skip(len);
                    state.cursor.has_more = has_more;

                    let mut events = vec![ConversationListEvent::PageMerged { received, has_more }];
                    let mut auto_selected = None;
                    if request.skip == 0 && state.selected.is_none() {
                        if let Some(first) = state.items.first() {
                            let id = first.id.clone();
                            state.selected = Some(id.clone());
                            events.push(ConversationListEvent::Selected {
                                id: Some(id.clone()),
                            });
                            auto_selected = Some(id);
                        }
                    }

                    (
                        ListLoadOutcome::Loaded {
                            received,
                            has_more,
                            auto_selected,
                        },
                        events,
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        skip = request.skip,
                        "Failed to fetch conversation page: {}",
                        e
                    );
                    state.load.fail(ticket, e.to_string());
                    state.cursor.exhaust();
                    (ListLoadOutcome::Failed, Vec::new())
                }
            }
        };

        for event in events {
            self.emit(event);
        }
        outcome
    }

    /// Fetch the next page for the active filter
    pub async fn load_more(&self) -> ListLoadOutcome {
        let filter = self.filter();
        self.load(filter, false).await
    }

    /// Switch filters: clear the rows and fetch the first page
    ///
    /// A page still in flight for the previous filter is discarded on
    /// arrival.
    pub async fn set_filter(&self, filter: ConversationFilter) -> ListLoadOutcome {
        {
            let mut state = self.shared.state.write();
            if state.disposed {
                return ListLoadOutcome::Skipped;
            }
            Self::clear_for_filter(&mut state, filter);
        }
        self.emit(ConversationListEvent::Cleared { filter });
        self.load(filter, true).await
    }

    /// React to the list being scrolled
    ///
    /// Near the bottom, with more rows available and nothing in flight, a
    /// load-more is scheduled. Bursts collapse into one request and requests
    /// are at least the configured interval apart. Returns whether a request
    /// was scheduled.
    pub fn on_scroll(&self, viewport: Viewport) -> bool {
        {
            let state = self.shared.state.read();
            if state.disposed
                || !state.cursor.has_more
                || state.load.is_loading()
                || !viewport.is_near_bottom(self.shared.config.load_more_threshold_px)
            {
                return false;
            }
        }

        let delay = self
            .shared
            .config
            .scroll_debounce()
            .max(self.shared.scroll_throttle.remaining());
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);

        self.shared.scroll_debounce.schedule(delay, async move {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.scroll_throttle.try_acquire() {
                tracing::debug!("scroll load-more throttled");
                return;
            }
            ConversationListStore { shared }.load_more().await;
        });
        true
    }

    /// Insert or move a conversation carried by a live event
    ///
    /// Any existing row with the same id is removed and the summary is put
    /// at the front: the event is the conversation's latest activity. Rows
    /// that do not match the active filter are dropped from the list.
    pub fn live_insert(&self, summary: ConversationSummary) {
        let event = {
            let mut state = self.shared.state.write();
            if state.disposed {
                return;
            }

            let existing = state.items.iter().position(|c| c.id == summary.id);
            if let Some(index) = existing {
                state.items.remove(index);
            }

            if !state.filter.matches(&summary) {
                existing.map(|_| ConversationListEvent::Removed { id: summary.id })
            } else {
                let id = summary.id.clone();
                state.items.insert(0, summary);
                if existing.is_none() {
                    // Count the row so the next page does not repeat one
                    let len = state.items.len();
                    state.cursor.set_skip(len);
                }
                Some(ConversationListEvent::Upserted { id })
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Replace a row's content without moving it
    ///
    /// Used for results of updates made from this console. Returns false if
    /// the conversation is not in the list.
    pub fn apply_update(&self, summary: ConversationSummary) -> bool {
        let id = {
            let mut state = self.shared.state.write();
            let Some(row) = state.items.iter_mut().find(|c| c.id == summary.id) else {
                return false;
            };
            *row = summary;
            row.id.clone()
        };
        self.emit(ConversationListEvent::Updated { id });
        true
    }

    /// Stop timers and drop responses still in flight
    pub fn dispose(&self) {
        self.shared.scroll_debounce.cancel();
        let mut state = self.shared.state.write();
        state.disposed = true;
        state.load.invalidate();
    }

    /// Whether [`dispose`](Self::dispose) was called
    pub fn is_disposed(&self) -> bool {
        self.shared.state.read().disposed
    }

    fn clear_for_filter(state: &mut ListState, filter: ConversationFilter) {
        tracing::debug!(from = %state.filter, to = %filter, "changing conversation filter");
        state.filter = filter;
        state.items.clear();
        state.cursor.reset();
        state.load.invalidate();
    }

    fn emit(&self, event: ConversationListEvent) {
        // No receivers is fine
        let _ = self.shared.events.send(event);
    }
}

/// Keep the first occurrence of each id
fn collapse_duplicates(page: Vec<ConversationSummary>) -> Vec<ConversationSummary> {
    let mut items: Vec<ConversationSummary> = Vec::with_capacity(page.len());
    for summary in page {
        if !items.iter().any(|c| c.id == summary.id) {
            items.push(summary);
        }
    }
    items
}

/// Merge a later page: known ids take the newer instance, new ids append
///
/// The caller re-sorts, since a merged instance may carry newer activity.
fn merge_page(items: &mut Vec<ConversationSummary>, page: Vec<ConversationSummary>) {
    for summary in page {
        match items.iter_mut().find(|c| c.id == summary.id) {
            Some(existing) => *existing = summary,
            None => items.push(summary),
        }
    }
}

/// Stable sort, most recent first; rows without a timestamp go last
fn sort_by_recency(items: &mut [ConversationSummary]) {
    items.sort_by(|a, b| b.recency().cmp(&a.recency()));
}
