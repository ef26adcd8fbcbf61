//! Conversation and message models
//!
//! Wire shapes follow the support backend's JSON: snake_case fields,
//! pages wrapped as `{ "data": [...], "has_next": bool }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSide {
    /// The customer/guest
    #[serde(alias = "guest", alias = "user")]
    Customer,
    /// An agent or the assistant answering on the business's behalf
    #[serde(alias = "agent", alias = "assistant", alias = "bot")]
    Staff,
}

/// Sentiment tag computed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Positive
    Positive,
    /// Neutral
    Neutral,
    /// Negative
    Negative,
    /// Not computed yet, or a tag this client does not know
    #[default]
    #[serde(other)]
    Unknown,
}

/// Who is handling a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    /// Answered automatically
    Ai,
    /// Taken over by a human agent
    Human,
    /// Not assigned
    #[default]
    #[serde(other)]
    Unassigned,
}

/// Filter applied to the conversation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationFilter {
    /// Every conversation
    #[default]
    All,
    /// Conversations handled by the assistant
    Ai,
    /// Conversations handled by a human agent
    Human,
}

impl ConversationFilter {
    /// Value sent as the `filter` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationFilter::All => "all",
            ConversationFilter::Ai => "ai",
            ConversationFilter::Human => "human",
        }
    }

    /// Whether a conversation belongs in a list with this filter
    pub fn matches(&self, summary: &ConversationSummary) -> bool {
        match self {
            ConversationFilter::All => true,
            ConversationFilter::Ai => summary.assignment == Assignment::Ai,
            ConversationFilter::Human => summary.assignment == Assignment::Human,
        }
    }
}

impl fmt::Display for ConversationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Download URL
    pub url: String,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Text plus attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessagePayload {
    /// Message text
    #[serde(default)]
    pub text: String,
    /// Attached files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl MessagePayload {
    /// Text-only payload
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Snapshot of the latest message carried on a conversation summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    /// Server id, when the backend includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Origin
    pub side: MessageSide,
    /// Content
    #[serde(flatten)]
    pub payload: MessagePayload,
    /// When it was sent
    pub created_at: DateTime<Utc>,
}

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Guest display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    /// Guest email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    /// Channel the conversation arrived on (widget, email, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Latest message, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    /// Timestamp of the latest message as reported by the list endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Sentiment tag
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Assignment tag
    #[serde(default)]
    pub assignment: Assignment,
}

impl ConversationSummary {
    /// Create a summary with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            guest_name: None,
            guest_email: None,
            channel: None,
            last_message: None,
            last_message_at: None,
            sentiment: Sentiment::Unknown,
            assignment: Assignment::Unassigned,
        }
    }

    /// Ordering key: the latest of the last message and `last_message_at`
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        let from_message = self.last_message.as_ref().map(|m| m.created_at);
        from_message.max(self.last_message_at)
    }

    /// Name shown in the list
    pub fn display_name(&self) -> &str {
        self.guest_name
            .as_deref()
            .or(self.guest_email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Identity of a message in the loaded window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum MessageId {
    /// Known to the server
    Confirmed(String),
    /// Manufactured locally for a live echo the server has not confirmed
    Pending(String),
}

impl MessageId {
    /// Underlying id string
    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Confirmed(id) | MessageId::Pending(id) => id,
        }
    }

    /// Whether this is a local placeholder
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Confirmed(id) => write!(f, "{}", id),
            MessageId::Pending(id) => write!(f, "pending:{}", id),
        }
    }
}

/// A message in the active conversation's window
///
/// Records are immutable once created; a pending record is only ever replaced
/// wholesale by its confirmed counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Identity
    pub id: MessageId,
    /// Owning conversation
    pub conversation_id: String,
    /// Origin
    pub side: MessageSide,
    /// Content
    pub payload: MessagePayload,
    /// When it was sent
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Build a placeholder from a live echo
    pub fn pending(
        conversation_id: impl Into<String>,
        local_id: impl Into<String>,
        message: &LastMessage,
    ) -> Self {
        Self {
            id: MessageId::Pending(local_id.into()),
            conversation_id: conversation_id.into(),
            side: message.side,
            payload: message.payload.clone(),
            created_at: message.created_at,
        }
    }

    /// Whether two records describe the same message content
    ///
    /// Used to match a pending echo against its confirmed copy.
    pub fn same_content(&self, other: &MessageRecord) -> bool {
        self.side == other.side
            && self.created_at == other.created_at
            && self.payload.text == other.payload.text
    }
}

/// Message as returned by the messages endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Server id
    pub id: String,
    /// Owning conversation
    pub conversation_id: String,
    /// Origin
    pub side: MessageSide,
    /// Content
    #[serde(flatten)]
    pub payload: MessagePayload,
    /// When it was sent
    pub created_at: DateTime<Utc>,
}

impl From<ServerMessage> for MessageRecord {
    fn from(message: ServerMessage) -> Self {
        Self {
            id: MessageId::Confirmed(message.id),
            conversation_id: message.conversation_id,
            side: message.side,
            payload: message.payload,
            created_at: message.created_at,
        }
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in server order
    pub data: Vec<T>,
    /// Whether another page follows
    #[serde(default)]
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Create a page
    pub fn new(data: Vec<T>, has_next: bool) -> Self {
        Self { data, has_next }
    }

    /// Empty final page
    pub fn empty() -> Self {
        Self::new(Vec::new(), false)
    }
}

/// Guest details editable from the conversation header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GuestInfo {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_summary_from_backend_json() {
        let json = serde_json::json!({
            "id": "c1",
            "guest_name": "Dana",
            "last_message": {
                "id": "m9",
                "side": "guest",
                "text": "where is my order?",
                "created_at": "2024-03-01T10:00:00Z"
            },
            "sentiment": "negative",
            "assignment": "ai"
        });

        let summary: ConversationSummary = serde_json::from_value(json).unwrap();
        let last = summary.last_message.as_ref().unwrap();

        assert_eq!(last.side, MessageSide::Customer);
        assert_eq!(last.payload.text, "where is my order?");
        assert_eq!(summary.sentiment, Sentiment::Negative);
        assert_eq!(summary.assignment, Assignment::Ai);
        assert_eq!(summary.display_name(), "Dana");
    }

    #[test]
    fn test_unknown_tags_fall_back() {
        let json = serde_json::json!({ "id": "c1", "sentiment": "ecstatic", "assignment": "robot" });
        let summary: ConversationSummary = serde_json::from_value(json).unwrap();

        assert_eq!(summary.sentiment, Sentiment::Unknown);
        assert_eq!(summary.assignment, Assignment::Unassigned);
        assert!(summary.last_message.is_none());
        assert_eq!(summary.display_name(), "c1");
    }

    #[test]
    fn test_recency_prefers_latest_timestamp() {
        let mut summary = ConversationSummary::new("c1");
        assert_eq!(summary.recency(), None);

        summary.last_message_at = Some(at(10));
        assert_eq!(summary.recency(), Some(at(10)));

        summary.last_message = Some(LastMessage {
            id: None,
            side: MessageSide::Customer,
            payload: MessagePayload::text("hi"),
            created_at: at(20),
        });
        assert_eq!(summary.recency(), Some(at(20)));
    }

    #[test]
    fn test_server_message_becomes_confirmed() {
        let json = serde_json::json!({
            "id": "m1",
            "conversation_id": "c1",
            "side": "staff",
            "text": "Hello!",
            "attachments": [{ "url": "https://cdn.example.com/a.png", "mime_type": "image/png" }],
            "created_at": "2024-03-01T10:00:00Z"
        });

        let record: MessageRecord = serde_json::from_value::<ServerMessage>(json).unwrap().into();

        assert_eq!(record.id, MessageId::Confirmed("m1".to_string()));
        assert!(!record.id.is_pending());
        assert_eq!(record.payload.attachments.len(), 1);
    }

    #[test]
    fn test_pending_matches_confirmed_content() {
        let last = LastMessage {
            id: None,
            side: MessageSide::Customer,
            payload: MessagePayload::text("ping"),
            created_at: at(5),
        };
        let pending = MessageRecord::pending("c1", "local-1", &last);
        assert_eq!(pending.id.to_string(), "pending:local-1");

        let confirmed = MessageRecord {
            id: MessageId::Confirmed("m1".to_string()),
            ..pending.clone()
        };
        assert!(pending.same_content(&confirmed));

        let other = MessageRecord {
            side: MessageSide::Staff,
            ..confirmed
        };
        assert!(!pending.same_content(&other));
    }

    #[test]
    fn test_page_has_next_defaults_false() {
        let page: Page<String> = serde_json::from_str(r#"{ "data": ["a"] }"#).unwrap();
        assert!(!page.has_next);
        assert_eq!(ConversationFilter::Ai.to_string(), "ai");
    }

    #[test]
    fn test_filter_matches_assignment() {
        let mut summary = ConversationSummary::new("c1");
        assert!(ConversationFilter::All.matches(&summary));
        assert!(!ConversationFilter::Ai.matches(&summary));

        summary.assignment = Assignment::Human;
        assert!(ConversationFilter::Human.matches(&summary));
        assert!(!ConversationFilter::Ai.matches(&summary));
    }
}
