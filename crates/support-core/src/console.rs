//! Support console facade
//!
//! Wires the stores, the unread tracker and the switch controller together
//! and exposes the operations the UI calls. Push handlers are attached with
//! [`SupportConsole::mount`] and detached when the returned guard drops.

use std::sync::Arc;
use support_state::dispatch::{DispatchError, Subscription};
use support_state::unread::{UnreadDisplay, UnreadTracker};

use crate::config::SyncConfig;
use crate::conversations::{ConversationListStore, ListLoadOutcome};
use crate::events::{PushEvent, PushRegistry, Topic};
use crate::messages::{AppendOutcome, MessageListStore, MessageLoadOutcome};
use crate::models::{Assignment, ConversationFilter, ConversationSummary, GuestInfo};
use crate::service::{self, SupportApi};
use crate::switch::{ConversationSwitchController, SwitchOutcome};
use crate::viewport::Viewport;

/// The synchronization engine behind one console window
#[derive(Clone)]
pub struct SupportConsole {
    api: Arc<dyn SupportApi>,
    unread: UnreadTracker,
    conversations: ConversationListStore,
    messages: MessageListStore,
    switcher: ConversationSwitchController,
}

impl SupportConsole {
    /// Create a console backed by `api`
    pub fn new(api: Arc<dyn SupportApi>, config: SyncConfig) -> Self {
        let unread = UnreadTracker::new();
        let conversations = ConversationListStore::new(Arc::clone(&api), config.clone());
        let messages = MessageListStore::new(Arc::clone(&api), config, unread.clone());
        let switcher = ConversationSwitchController::new(
            conversations.clone(),
            messages.clone(),
            unread.clone(),
        );

        Self {
            api,
            unread,
            conversations,
            messages,
            switcher,
        }
    }

    /// Conversation list store
    pub fn conversations(&self) -> &ConversationListStore {
        &self.conversations
    }

    /// Message list store
    pub fn messages(&self) -> &MessageListStore {
        &self.messages
    }

    /// Unread tracker
    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    /// Switch controller
    pub fn switcher(&self) -> &ConversationSwitchController {
        &self.switcher
    }

    /// Load the first page of the conversation list
    ///
    /// If this selects a conversation automatically, it is opened too.
    pub async fn load_conversations(&self) -> ListLoadOutcome {
        let filter = self.conversations.filter();
        let outcome = self.conversations.load(filter, true).await;
        self.open_auto_selected(&outcome).await;
        outcome
    }

    /// Load the next page of the conversation list
    pub async fn load_more_conversations(&self) -> ListLoadOutcome {
        self.conversations.load_more().await
    }

    /// Change the list filter
    pub async fn set_filter(&self, filter: ConversationFilter) -> ListLoadOutcome {
        let outcome = self.conversations.set_filter(filter).await;
        self.open_auto_selected(&outcome).await;
        outcome
    }

    /// Conversation list was scrolled
    pub fn on_conversation_scroll(&self, viewport: Viewport) -> bool {
        self.conversations.on_scroll(viewport)
    }

    /// Open a conversation in the message pane
    pub async fn select_conversation(&self, conversation_id: &str) -> SwitchOutcome {
        self.switcher.switch_to(conversation_id).await
    }

    /// Load older messages if the pane is near the top
    pub async fn load_older_messages(&self, viewport: Viewport) -> MessageLoadOutcome {
        self.messages.load_older(viewport).await
    }

    /// Message pane was scrolled
    pub async fn on_message_scroll(&self, viewport: Viewport) -> MessageLoadOutcome {
        self.messages.on_scroll(viewport).await
    }

    /// Message pane rendered its first page
    pub async fn on_messages_rendered(&self, viewport: Viewport) -> MessageLoadOutcome {
        self.messages.update_viewport(viewport);
        self.messages.fill_viewport(viewport).await
    }

    /// Jump to the latest message
    pub fn jump_to_bottom(&self) {
        self.messages.jump_to_bottom();
    }

    /// Mark a conversation read
    pub fn mark_read(&self, conversation_id: &str) -> bool {
        self.unread.remove(conversation_id)
    }

    /// Whether a conversation has unseen activity
    pub fn is_unread(&self, conversation_id: &str) -> bool {
        self.unread.is_unread(conversation_id)
    }

    /// Unread badge
    pub fn unread_display(&self) -> UnreadDisplay {
        self.unread.display()
    }

    /// Hand a conversation to the assistant or a human agent
    ///
    /// The updated summary replaces the list row in place.
    pub async fn update_assignment(
        &self,
        conversation_id: &str,
        assignment: Assignment,
    ) -> service::Result<ConversationSummary> {
        let summary = self
            .api
            .update_assignment(conversation_id.to_string(), assignment)
            .await?;
        self.conversations.apply_update(summary.clone());
        Ok(summary)
    }

    /// Edit the guest's details
    ///
    /// The updated summary replaces the list row in place.
    pub async fn update_guest_info(
        &self,
        conversation_id: &str,
        info: GuestInfo,
    ) -> service::Result<ConversationSummary> {
        let summary = self
            .api
            .update_guest_info(conversation_id.to_string(), info)
            .await?;
        self.conversations.apply_update(summary.clone());
        Ok(summary)
    }

    /// Apply one push event
    ///
    /// Every event upserts its conversation in the list. Inbox activity is
    /// appended to the pane when the conversation is active and marks it
    /// unread otherwise. Events without a last message never append.
    pub fn handle_push(&self, event: &PushEvent) {
        let summary = event.conversation();
        self.conversations.live_insert(summary.clone());

        let PushEvent::Inbox(summary) = event else {
            return;
        };

        let is_active = self.messages.active_conversation().as_deref() == Some(summary.id.as_str());
        if !is_active {
            self.unread.add(&summary.id);
            return;
        }

        if let Some(last_message) = &summary.last_message {
            if let AppendOutcome::Appended { id, .. } =
                self.messages.append_live(&summary.id, last_message)
            {
                tracing::debug!(conversation_id = %summary.id, message_id = %id, "live message appended");
            }
        }
    }

    /// Attach push handlers for both topics
    pub fn mount(&self, registry: &PushRegistry) -> Result<MountedConsole, DispatchError> {
        let console = self.clone();
        let inbox = registry.register(Topic::Inbox.as_str(), move |event: &PushEvent| {
            console.handle_push(event)
        })?;

        let console = self.clone();
        let sentiment = registry.register(Topic::UpdateSentiment.as_str(), move |event: &PushEvent| {
            console.handle_push(event)
        })?;

        tracing::info!("support console mounted");
        Ok(MountedConsole {
            console: self.clone(),
            subscriptions: vec![inbox, sentiment],
        })
    }

    /// Stop timers and drop in-flight responses in both stores
    pub fn dispose(&self) {
        self.conversations.dispose();
        self.messages.dispose();
    }

    async fn open_auto_selected(&self, outcome: &ListLoadOutcome) {
        if let ListLoadOutcome::Loaded {
            auto_selected: Some(conversation_id),
            ..
        } = outcome
        {
            self.switcher.switch_to(conversation_id).await;
        }
    }
}

/// Push handlers attached to a registry
///
/// Dropping the guard detaches them.
pub struct MountedConsole {
    console: SupportConsole,
    subscriptions: Vec<Subscription<PushEvent>>,
}

impl MountedConsole {
    /// Console the handlers feed
    pub fn console(&self) -> &SupportConsole {
        &self.console
    }

    /// Detach the handlers and dispose the stores
    pub fn unmount(self) {
        for subscription in self.subscriptions {
            subscription.unregister();
        }
        self.console.dispose();
        tracing::info!("support console unmounted");
    }
}
