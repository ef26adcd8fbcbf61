//! Support backend collaborator
//!
//! The synchronization engine depends only on the page-shaped contract of
//! [`SupportApi`]. [`HttpSupportApi`] implements it over the REST client.

use async_trait::async_trait;
use serde::Serialize;
use support_client::rest::{RestClient, RestError, RestRequest};
use thiserror::Error;

use crate::models::{
    Assignment, ConversationFilter, ConversationSummary, GuestInfo, MessageRecord, Page,
    ServerMessage,
};

/// Errors from collaborator calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport or backend error
    #[error("Request failed: {0}")]
    Rest(#[from] RestError),

    /// Request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller passed something the backend cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for collaborator calls
pub type Result<T> = std::result::Result<T, ApiError>;

/// Parameters for one page of the conversation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationsPageRequest {
    /// Items to skip
    pub skip: usize,
    /// Page size
    pub limit: usize,
    /// Active filter
    pub filter: ConversationFilter,
}

/// Parameters for one page of a conversation's messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesPageRequest {
    /// Conversation to read
    pub conversation_id: String,
    /// Messages to skip, counted from the newest
    pub skip: usize,
    /// Page size
    pub limit: usize,
}

/// Calls the synchronization engine makes against the support backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupportApi: Send + Sync {
    /// Fetch a page of conversation summaries, most recent first
    async fn fetch_conversations_page(
        &self,
        request: ConversationsPageRequest,
    ) -> Result<Page<ConversationSummary>>;

    /// Fetch a page of messages, newest page first
    async fn fetch_messages_page(&self, request: MessagesPageRequest)
        -> Result<Page<MessageRecord>>;

    /// Hand a conversation to the assistant or a human agent
    async fn update_assignment(
        &self,
        conversation_id: String,
        assignment: Assignment,
    ) -> Result<ConversationSummary>;

    /// Edit the guest's details
    async fn update_guest_info(
        &self,
        conversation_id: String,
        info: GuestInfo,
    ) -> Result<ConversationSummary>;
}

#[derive(Serialize)]
struct AssignmentBody {
    assignment: Assignment,
}

/// [`SupportApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpSupportApi {
    client: RestClient,
    max_retries: usize,
}

impl HttpSupportApi {
    /// Create an API bound to `client`
    ///
    /// Page reads are retried on network-class failures; updates are not.
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            max_retries: 2,
        }
    }

    /// Set how many times page reads are retried
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn conversation_path(conversation_id: &str, suffix: &str) -> Result<String> {
        if conversation_id.is_empty() || conversation_id.contains('/') {
            return Err(ApiError::InvalidInput(format!(
                "invalid conversation id: {:?}",
                conversation_id
            )));
        }
        Ok(format!("/conversations/{}/{}", conversation_id, suffix))
    }

    fn check_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(ApiError::InvalidInput("page limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SupportApi for HttpSupportApi {
    async fn fetch_conversations_page(
        &self,
        request: ConversationsPageRequest,
    ) -> Result<Page<ConversationSummary>> {
        Self::check_limit(request.limit)?;

        let rest = RestRequest::get("/conversations")
            .param("skip", request.skip)
            .param("limit", request.limit)
            .param("filter", request.filter);

        let response = self.client.send_with_retry(rest, self.max_retries).await?;
        Ok(response.data)
    }

    async fn fetch_messages_page(
        &self,
        request: MessagesPageRequest,
    ) -> Result<Page<MessageRecord>> {
        Self::check_limit(request.limit)?;
        let path = Self::conversation_path(&request.conversation_id, "messages")?;

        let rest = RestRequest::get(path)
            .param("skip", request.skip)
            .param("limit", request.limit);

        let response = self
            .client
            .send_with_retry::<Page<ServerMessage>>(rest, self.max_retries)
            .await?;

        let page = response.data;
        Ok(Page::new(
            page.data.into_iter().map(MessageRecord::from).collect(),
            page.has_next,
        ))
    }

    async fn update_assignment(
        &self,
        conversation_id: String,
        assignment: Assignment,
    ) -> Result<ConversationSummary> {
        let path = Self::conversation_path(&conversation_id, "assignment")?;
        let rest = RestRequest::patch(path).json_body(&AssignmentBody { assignment })?;

        Ok(self.client.send(rest).await?.data)
    }

    async fn update_guest_info(
        &self,
        conversation_id: String,
        info: GuestInfo,
    ) -> Result<ConversationSummary> {
        let path = Self::conversation_path(&conversation_id, "guest")?;
        let rest = RestRequest::patch(path).json_body(&info)?;

        Ok(self.client.send(rest).await?.data)
    }
}
