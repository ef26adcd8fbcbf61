//! Load state tracking
//!
//! Paginated stores issue fetches that resolve in any order. This module
//! provides the pieces they use to reconcile responses with current state:
//! an explicit per-request-kind state machine, generation tokens that mark
//! responses stale, and a pagination cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a load slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoadState {
    /// Nothing requested yet
    #[default]
    Idle,

    /// A request is in flight
    Loading,

    /// The last request resolved (successfully or degraded)
    Loaded,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Loaded => write!(f, "loaded"),
        }
    }
}

/// Token captured when a request is issued
///
/// A response is applied only if its ticket is still current for the tracker
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    /// Generation the request was issued under
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// In-flight guard plus staleness token for one kind of request
///
/// `begin` refuses while a request of the current generation is in flight.
/// `invalidate` bumps the generation so that anything already in flight
/// becomes stale and a new request may start immediately.
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    state: LoadState,
    generation: u64,
    last_error: Option<String>,
}

impl LoadTracker {
    /// Create an idle tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Whether a current-generation request is in flight
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Error message from the last failed request, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a request, or return `None` if one is already in flight
    pub fn begin(&mut self) -> Option<LoadTicket> {
        if self.is_loading() {
            return None;
        }
        self.state = LoadState::Loading;
        Some(LoadTicket {
            generation: self.generation,
        })
    }

    /// Whether a response for `ticket` may still be applied
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Mark the request for `ticket` as resolved
    ///
    /// Returns false (and changes nothing) when the ticket is stale.
    pub fn finish(&mut self, ticket: LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = LoadState::Loaded;
        self.last_error = None;
        true
    }

    /// Mark the request for `ticket` as failed
    ///
    /// Failures degrade to `Loaded`; the message is kept for diagnostics.
    pub fn fail(&mut self, ticket: LoadTicket, error: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = LoadState::Loaded;
        self.last_error = Some(error.into());
        true
    }

    /// Make every outstanding ticket stale and return to `Idle`
    pub fn invalidate(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.state = LoadState::Idle;
        self.last_error = None;
        self.generation
    }

    /// Invalidate everything outstanding and start a fresh request
    pub fn restart(&mut self) -> LoadTicket {
        self.invalidate();
        self.state = LoadState::Loading;
        LoadTicket {
            generation: self.generation,
        }
    }
}

/// `(skip, limit, has_more)` for one paginated list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    /// Number of items already loaded
    pub skip: usize,
    /// Page size
    pub limit: usize,
    /// Whether the server reported more items
    pub has_more: bool,
}

impl PaginationCursor {
    /// Cursor at the start of a list
    ///
    /// `has_more` starts true so the first page can be requested.
    pub fn new(limit: usize) -> Self {
        Self {
            skip: 0,
            limit,
            has_more: true,
        }
    }

    /// Return to the start of the list
    pub fn reset(&mut self) {
        self.skip = 0;
        self.has_more = true;
    }

    /// Record a page of `count` items
    pub fn advance(&mut self, count: usize, has_more: bool) {
        self.skip += count;
        self.has_more = has_more;
    }

    /// Set the position directly (e.g., to the current collection length)
    pub fn set_skip(&mut self, skip: usize) {
        self.skip = skip;
    }

    /// Stop paginating after a failed request
    pub fn exhaust(&mut self) {
        self.has_more = false;
    }
}
