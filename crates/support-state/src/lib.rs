//! Reactive state primitives for the support console
//!
//! This crate provides the shared building blocks the synchronization engine
//! is assembled from: topic-keyed push dispatch, unread tracking, explicit
//! load state machines with staleness tokens, and owned scroll timers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod load;
pub mod timers;
pub mod unread;

pub use dispatch::{DispatchError, EventRegistry, Subscription, SubscriptionHandle};
pub use load::{LoadState, LoadTicket, LoadTracker, PaginationCursor};
pub use timers::{Debouncer, Throttle};
pub use unread::{UnreadDisplay, UnreadEvent, UnreadTracker};
