//! Unread conversation tracking
//!
//! This module keeps the set of conversation ids with activity the agent has
//! not seen yet, and derives the badge shown for it. Membership means "updated
//! while not active, not yet marked read".

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Largest count shown before the badge collapses to "99+"
pub const MAX_DISPLAY_COUNT: u32 = 99;

/// Unread badge value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnreadDisplay {
    /// No unread conversations
    #[default]
    None,
    /// Specific count (1-98)
    Count(u32),
    /// 99 or more unread conversations
    Many,
}

impl UnreadDisplay {
    /// Create from a numeric count
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => UnreadDisplay::None,
            n if n >= MAX_DISPLAY_COUNT => UnreadDisplay::Many,
            n => UnreadDisplay::Count(n),
        }
    }

    /// Check if there are any unread conversations
    pub fn has_unread(&self) -> bool {
        !matches!(self, UnreadDisplay::None)
    }
}

impl std::fmt::Display for UnreadDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnreadDisplay::None => Ok(()),
            UnreadDisplay::Count(n) => write!(f, "{}", n),
            UnreadDisplay::Many => write!(f, "{}+", MAX_DISPLAY_COUNT),
        }
    }
}

/// Events broadcast when the unread set changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreadEvent {
    /// Conversation became unread
    Marked(String),
    /// Conversation was read
    Cleared(String),
    /// Every conversation was cleared
    Reset,
}

/// Tracker for conversations with unseen activity
///
/// Cloning yields another handle to the same set. All operations are
/// synchronous so push handlers can call them directly.
///
/// # Example
///
/// ```
/// use support_state::unread::{UnreadTracker, UnreadDisplay};
///
/// let tracker = UnreadTracker::new();
/// assert!(tracker.add("conv-1"));
/// assert!(!tracker.add("conv-1"));
/// assert!(tracker.is_unread("conv-1"));
/// assert_eq!(tracker.display(), UnreadDisplay::Count(1));
///
/// assert!(tracker.remove("conv-1"));
/// assert!(!tracker.remove("conv-1"));
/// ```
#[derive(Clone)]
pub struct UnreadTracker {
    ids: Arc<RwLock<HashSet<String>>>,
    display_tx: Arc<watch::Sender<UnreadDisplay>>,
    events_tx: broadcast::Sender<UnreadEvent>,
}

impl UnreadTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        let (display_tx, _) = watch::channel(UnreadDisplay::None);
        let (events_tx, _) = broadcast::channel(64);

        Self {
            ids: Arc::new(RwLock::new(HashSet::new())),
            display_tx: Arc::new(display_tx),
            events_tx,
        }
    }

    /// Mark a conversation unread
    ///
    /// Returns false if it was already unread.
    pub fn add(&self, conversation_id: &str) -> bool {
        let mut ids = self.ids.write();
        if !ids.insert(conversation_id.to_string()) {
            return false;
        }
        let count = ids.len();
        drop(ids);

        tracing::trace!(conversation_id, count, "conversation marked unread");
        self.publish(count, UnreadEvent::Marked(conversation_id.to_string()));
        true
    }

    /// Mark a conversation read
    ///
    /// Returns false if it was not unread.
    pub fn remove(&self, conversation_id: &str) -> bool {
        let mut ids = self.ids.write();
        if !ids.remove(conversation_id) {
            return false;
        }
        let count = ids.len();
        drop(ids);

        tracing::trace!(conversation_id, count, "conversation marked read");
        self.publish(count, UnreadEvent::Cleared(conversation_id.to_string()));
        true
    }

    /// Set-membership query
    pub fn is_unread(&self, conversation_id: &str) -> bool {
        self.ids.read().contains(conversation_id)
    }

    /// Number of unread conversations
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Whether nothing is unread
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Snapshot of the unread ids
    pub fn ids(&self) -> HashSet<String> {
        self.ids.read().clone()
    }

    /// Current badge value
    pub fn display(&self) -> UnreadDisplay {
        self.display_tx.borrow().clone()
    }

    /// Clear every unread mark (e.g., on sign-out)
    pub fn reset(&self) {
        let mut ids = self.ids.write();
        if ids.is_empty() {
            return;
        }
        ids.clear();
        drop(ids);

        self.publish(0, UnreadEvent::Reset);
    }

    /// Subscribe to badge changes
    pub fn subscribe(&self) -> watch::Receiver<UnreadDisplay> {
        self.display_tx.subscribe()
    }

    /// Subscribe to per-conversation changes
    pub fn subscribe_events(&self) -> broadcast::Receiver<UnreadEvent> {
        self.events_tx.subscribe()
    }

    fn publish(&self, count: usize, event: UnreadEvent) {
        let display = UnreadDisplay::from_count(u32::try_from(count).unwrap_or(u32::MAX));
        self.display_tx.send_if_modified(|current| {
            if *current == display {
                false
            } else {
                *current = display;
                true
            }
        });
        let _ = self.events_tx.send(event);
    }
}

impl Default for UnreadTracker {
    fn default() -> Self {
        Self::new()
    }
}
