//! Inbound push events
//!
//! The push transport delivers JSON frames shaped as
//! `{ "topic": "INBOX", "payload": { ...conversation summary... } }`.
//! Frames for known topics decode into a [`PushEvent`]; anything else is
//! dropped without error.

use serde::Deserialize;
use std::fmt;
use support_state::dispatch::EventRegistry;
use thiserror::Error;

use crate::models::ConversationSummary;

/// Push decoding errors
#[derive(Debug, Error)]
pub enum EventError {
    /// Frame is not a JSON envelope
    #[error("Malformed push frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Known topic with a payload that does not decode
    #[error("Invalid payload for {topic}: {source}")]
    InvalidPayload {
        /// Topic of the frame
        topic: Topic,
        /// Decode failure
        #[source]
        source: serde_json::Error,
    },
}

/// Topics the console understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Full updated conversation, possibly with a new last message
    Inbox,
    /// Conversation whose sentiment tag changed
    UpdateSentiment,
}

impl Topic {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Inbox => "INBOX",
            Topic::UpdateSentiment => "UPDATE_SENTIMENT",
        }
    }

    /// Parse a wire name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "INBOX" => Some(Topic::Inbox),
            "UPDATE_SENTIMENT" => Some(Topic::UpdateSentiment),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded push event
///
/// Both variants carry a full summary; there are no delta payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Inbox activity
    Inbox(ConversationSummary),
    /// Sentiment tag changed
    SentimentUpdated(ConversationSummary),
}

impl PushEvent {
    /// Topic this event is delivered on
    pub fn topic(&self) -> Topic {
        match self {
            PushEvent::Inbox(_) => Topic::Inbox,
            PushEvent::SentimentUpdated(_) => Topic::UpdateSentiment,
        }
    }

    /// Conversation carried by the event
    pub fn conversation(&self) -> &ConversationSummary {
        match self {
            PushEvent::Inbox(summary) | PushEvent::SentimentUpdated(summary) => summary,
        }
    }

    /// Decode one transport frame
    ///
    /// Returns `Ok(None)` for topics this client does not handle.
    pub fn from_json(frame: &str) -> Result<Option<Self>, EventError> {
        #[derive(Deserialize)]
        struct Envelope {
            topic: String,
            #[serde(default, alias = "data")]
            payload: serde_json::Value,
        }

        let envelope: Envelope = serde_json::from_str(frame).map_err(EventError::Malformed)?;

        let Some(topic) = Topic::parse(&envelope.topic) else {
            tracing::trace!(topic = %envelope.topic, "ignoring push frame with unknown topic");
            return Ok(None);
        };

        let summary: ConversationSummary = serde_json::from_value(envelope.payload)
            .map_err(|source| EventError::InvalidPayload { topic, source })?;

        Ok(Some(match topic {
            Topic::Inbox => PushEvent::Inbox(summary),
            Topic::UpdateSentiment => PushEvent::SentimentUpdated(summary),
        }))
    }
}

/// Registry carrying decoded push events
pub type PushRegistry = EventRegistry<PushEvent>;

/// Decode a transport frame and fan it out
///
/// Returns how many handlers received the event (0 for unknown topics).
pub fn deliver_frame(registry: &PushRegistry, frame: &str) -> Result<usize, EventError> {
    match PushEvent::from_json(frame)? {
        Some(event) => Ok(registry.dispatch(event.topic().as_str(), &event)),
        None => Ok(0),
    }
}
