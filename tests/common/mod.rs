//! Shared fixtures for the synchronization tests
//!
//! [`ScriptedApi`] answers collaborator calls from per-endpoint queues. A
//! queued reply is either ready, or gated behind a oneshot so a test decides
//! exactly when (and in which order) in-flight requests resolve.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use support_core::config::SyncConfig;
use support_core::console::SupportConsole;
use support_core::models::{
    Assignment, ConversationSummary, GuestInfo, LastMessage, MessageId, MessagePayload,
    MessageRecord, MessageSide, Page,
};
use support_core::service::{
    ApiError, ConversationsPageRequest, MessagesPageRequest, Result, SupportApi,
};
use tokio::sync::oneshot;

/// Route engine logs to the test harness; `RUST_LOG=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Reply<T> {
    Ready(Result<T>),
    Gated(oneshot::Receiver<Result<T>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T> {
        match self {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::InvalidInput("gate dropped".to_string()))),
        }
    }
}

/// Releases one gated reply
pub struct Gate<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Gate<T> {
    /// Resolve the request with `value`
    pub fn release(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    /// Resolve the request with an error
    pub fn fail(self, error: ApiError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Collaborator fake driven by queued replies
///
/// Calls with an empty queue get an empty final page.
#[derive(Default)]
pub struct ScriptedApi {
    conversation_replies: Mutex<VecDeque<Reply<Page<ConversationSummary>>>>,
    message_replies: Mutex<VecDeque<Reply<Page<MessageRecord>>>>,
    conversation_requests: Mutex<Vec<ConversationsPageRequest>>,
    message_requests: Mutex<Vec<MessagesPageRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_conversations(&self, page: Page<ConversationSummary>) {
        self.conversation_replies
            .lock()
            .push_back(Reply::Ready(Ok(page)));
    }

    pub fn fail_conversations(&self, error: ApiError) {
        self.conversation_replies.lock().push_back(Reply::Ready(Err(error)));
    }

    pub fn gate_conversations(&self) -> Gate<Page<ConversationSummary>> {
        let (tx, rx) = oneshot::channel();
        self.conversation_replies.lock().push_back(Reply::Gated(rx));
        Gate { tx }
    }

    pub fn push_messages(&self, page: Page<MessageRecord>) {
        self.message_replies.lock().push_back(Reply::Ready(Ok(page)));
    }

    pub fn gate_messages(&self) -> Gate<Page<MessageRecord>> {
        let (tx, rx) = oneshot::channel();
        self.message_replies.lock().push_back(Reply::Gated(rx));
        Gate { tx }
    }

    pub fn conversation_requests(&self) -> Vec<ConversationsPageRequest> {
        self.conversation_requests.lock().clone()
    }

    pub fn message_requests(&self) -> Vec<MessagesPageRequest> {
        self.message_requests.lock().clone()
    }

    /// Yield until `count` conversation page requests have been issued
    pub async fn wait_for_conversation_requests(&self, count: usize) {
        for _ in 0..1_000 {
            if self.conversation_requests.lock().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} conversation page requests");
    }

    /// Yield until `count` message page requests have been issued
    pub async fn wait_for_message_requests(&self, count: usize) {
        for _ in 0..1_000 {
            if self.message_requests.lock().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} message page requests");
    }
}

#[async_trait]
impl SupportApi for ScriptedApi {
    async fn fetch_conversations_page(
        &self,
        request: ConversationsPageRequest,
    ) -> Result<Page<ConversationSummary>> {
        self.conversation_requests.lock().push(request);
        let reply = self.conversation_replies.lock().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Page::empty()),
        }
    }

    async fn fetch_messages_page(&self, request: MessagesPageRequest) -> Result<Page<MessageRecord>> {
        self.message_requests.lock().push(request);
        let reply = self.message_replies.lock().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Page::empty()),
        }
    }

    async fn update_assignment(
        &self,
        conversation_id: String,
        assignment: Assignment,
    ) -> Result<ConversationSummary> {
        let mut summary = ConversationSummary::new(conversation_id);
        summary.assignment = assignment;
        Ok(summary)
    }

    async fn update_guest_info(
        &self,
        conversation_id: String,
        info: GuestInfo,
    ) -> Result<ConversationSummary> {
        let mut summary = ConversationSummary::new(conversation_id);
        summary.guest_name = info.name;
        summary.guest_email = info.email;
        Ok(summary)
    }
}

/// Console over a scripted API with default tuning
pub fn console(api: &Arc<ScriptedApi>) -> SupportConsole {
    init_tracing();
    let api: Arc<dyn SupportApi> = Arc::clone(api) as Arc<dyn SupportApi>;
    SupportConsole::new(api, SyncConfig::default())
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Summary whose latest activity is at `secs`
pub fn summary(id: &str, secs: i64) -> ConversationSummary {
    let mut summary = ConversationSummary::new(id);
    summary.last_message_at = Some(at(secs));
    summary
}

/// `count` summaries, most recent first, named `{prefix}{n}`
pub fn summaries(prefix: &str, from: usize, count: usize) -> Vec<ConversationSummary> {
    (from..from + count)
        .map(|n| summary(&format!("{prefix}{n}"), 10_000 - n as i64))
        .collect()
}

pub fn message(conversation_id: &str, id: &str, secs: i64) -> MessageRecord {
    MessageRecord {
        id: MessageId::Confirmed(id.to_string()),
        conversation_id: conversation_id.to_string(),
        side: MessageSide::Customer,
        payload: MessagePayload::text(format!("message {id}")),
        created_at: at(secs),
    }
}

/// One page of `count` messages as the backend returns it (newest first)
///
/// Message `m{n}` is the n-th newest, so pages at increasing skips go back
/// in time.
pub fn message_page(
    conversation_id: &str,
    skip: usize,
    count: usize,
    has_next: bool,
) -> Page<MessageRecord> {
    let data = (skip..skip + count)
        .map(|n| message(conversation_id, &format!("m{n}"), 5_000 - n as i64))
        .collect();
    Page::new(data, has_next)
}

pub fn live_message(text: &str, secs: i64) -> LastMessage {
    LastMessage {
        id: None,
        side: MessageSide::Customer,
        payload: MessagePayload::text(text),
        created_at: at(secs),
    }
}

/// INBOX frame as the push transport delivers it
pub fn inbox_frame(conversation_id: &str, text: Option<&str>, secs: i64) -> String {
    let mut summary = summary(conversation_id, secs);
    summary.last_message = text.map(|text| live_message(text, secs));
    serde_json::json!({ "topic": "INBOX", "payload": summary }).to_string()
}

pub fn sentiment_frame(conversation_id: &str, sentiment: &str, secs: i64) -> String {
    let mut payload = serde_json::to_value(summary(conversation_id, secs)).unwrap();
    payload["sentiment"] = serde_json::Value::String(sentiment.to_string());
    serde_json::json!({ "topic": "UPDATE_SENTIMENT", "payload": payload }).to_string()
}

pub fn ids(summaries: &[ConversationSummary]) -> Vec<String> {
    summaries.iter().map(|s| s.id.clone()).collect()
}
