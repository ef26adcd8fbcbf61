//! Conversation switch controller
//!
//! Selecting a conversation rebinds the message pane. The pane is reset
//! synchronously before the first fetch is issued, and the fetch result is
//! only applied if the conversation is still active when it resolves.

use std::fmt;
use std::sync::Arc;
use support_state::unread::UnreadTracker;
use tokio::sync::watch;

use crate::conversations::ConversationListStore;
use crate::messages::{MessageListStore, MessageLoadOutcome};

/// Message pane lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaneState {
    /// No conversation selected
    #[default]
    Idle,
    /// Pane reset, first page in flight
    Switching {
        /// Conversation being opened
        conversation_id: String,
    },
    /// First page applied for a still-current conversation
    Loaded {
        /// Conversation shown
        conversation_id: String,
    },
    /// First page failed; the pane shows no messages
    Failed {
        /// Conversation that failed to load
        conversation_id: String,
    },
}

impl PaneState {
    /// Conversation the pane is bound to
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            PaneState::Idle => None,
            PaneState::Switching { conversation_id }
            | PaneState::Loaded { conversation_id }
            | PaneState::Failed { conversation_id } => Some(conversation_id),
        }
    }
}

impl fmt::Display for PaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaneState::Idle => write!(f, "idle"),
            PaneState::Switching { conversation_id } => write!(f, "switching({})", conversation_id),
            PaneState::Loaded { conversation_id } => write!(f, "loaded({})", conversation_id),
            PaneState::Failed { conversation_id } => write!(f, "failed({})", conversation_id),
        }
    }
}

/// Result of a switch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The conversation was already active; nothing happened
    AlreadyActive,
    /// The conversation's first page was applied
    Loaded {
        /// Messages in the window
        count: usize,
        /// Whether older messages exist
        has_more: bool,
    },
    /// Another switch happened before the first page arrived; it was discarded
    Superseded,
    /// The first page failed to load
    Failed,
}

/// Rebinds the message pane when the selected conversation changes
#[derive(Clone)]
pub struct ConversationSwitchController {
    conversations: ConversationListStore,
    messages: MessageListStore,
    unread: UnreadTracker,
    pane: Arc<watch::Sender<PaneState>>,
}

impl ConversationSwitchController {
    /// Create a controller over the two stores
    pub fn new(
        conversations: ConversationListStore,
        messages: MessageListStore,
        unread: UnreadTracker,
    ) -> Self {
        let (pane, _) = watch::channel(PaneState::Idle);
        Self {
            conversations,
            messages,
            unread,
            pane: Arc::new(pane),
        }
    }

    /// Active conversation
    pub fn active(&self) -> Option<String> {
        self.messages.active_conversation()
    }

    /// Current pane state
    pub fn pane_state(&self) -> PaneState {
        self.pane.borrow().clone()
    }

    /// Subscribe to pane state changes
    pub fn subscribe(&self) -> watch::Receiver<PaneState> {
        self.pane.subscribe()
    }

    /// Make `conversation_id` the active conversation
    ///
    /// Idempotent for the already-active conversation. Otherwise the
    /// selection is recorded, the conversation is marked read, the pane is
    /// reset, and its first page is fetched. If another switch happens
    /// before the page arrives, the page is dropped and nothing changes.
    pub async fn switch_to(&self, conversation_id: &str) -> SwitchOutcome {
        if self.messages.active_conversation().as_deref() == Some(conversation_id) {
            tracing::trace!(conversation_id, "conversation already active");
            return SwitchOutcome::AlreadyActive;
        }

        tracing::info!(conversation_id, "switching conversation");
        let ticket = self.messages.reset_for(conversation_id);
        self.unread.remove(conversation_id);
        self.conversations
            .set_selected(Some(conversation_id.to_string()));
        self.pane.send_replace(PaneState::Switching {
            conversation_id: conversation_id.to_string(),
        });

        let outcome = self.messages.load_initial(ticket).await;

        if self.messages.active_conversation().as_deref() != Some(conversation_id) {
            tracing::debug!(conversation_id, "switch superseded");
            return SwitchOutcome::Superseded;
        }

        match outcome {
            MessageLoadOutcome::Loaded { count, has_more } => {
                self.pane.send_replace(PaneState::Loaded {
                    conversation_id: conversation_id.to_string(),
                });
                SwitchOutcome::Loaded { count, has_more }
            }
            MessageLoadOutcome::Failed => {
                self.pane.send_replace(PaneState::Failed {
                    conversation_id: conversation_id.to_string(),
                });
                SwitchOutcome::Failed
            }
            MessageLoadOutcome::Superseded
            | MessageLoadOutcome::Skipped
            | MessageLoadOutcome::Prepended { .. } => SwitchOutcome::Superseded,
        }
    }
}
