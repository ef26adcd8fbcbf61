//! Conversation synchronization engine for the support console
//!
//! This crate reconciles the live push stream with paginated REST fetches:
//! the conversation list, the active conversation's message window, unread
//! state, and conversation switching.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod console;
pub mod conversations;
pub mod events;
pub mod messages;
pub mod models;
pub mod service;
pub mod switch;
pub mod viewport;

pub use config::SyncConfig;
pub use console::{MountedConsole, SupportConsole};
pub use conversations::{ConversationListEvent, ConversationListStore, ListLoadOutcome};
pub use events::{deliver_frame, EventError, PushEvent, PushRegistry, Topic};
pub use messages::{AppendOutcome, MessageListEvent, MessageListStore, MessageLoadOutcome};
pub use models::{
    Assignment, Attachment, ConversationFilter, ConversationSummary, GuestInfo, LastMessage,
    MessageId, MessagePayload, MessageRecord, MessageSide, Page, Sentiment,
};
pub use service::{ApiError, HttpSupportApi, SupportApi};
pub use switch::{ConversationSwitchController, PaneState, SwitchOutcome};
pub use viewport::{ScrollAnchor, Viewport};
