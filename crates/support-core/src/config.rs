//! Synchronization engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for paging, scroll thresholds and load-more rate limiting
///
/// Every field has a default, so partial JSON documents are accepted:
///
/// ```
/// use support_core::config::SyncConfig;
///
/// let config = SyncConfig::from_json_str(r#"{ "message_page_size": 50 }"#).unwrap();
/// assert_eq!(config.message_page_size, 50);
/// assert_eq!(config.conversation_page_size, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Conversations requested per page
    pub conversation_page_size: usize,

    /// Messages requested per page
    pub message_page_size: usize,

    /// Distance from the bottom of the conversation list that triggers load-more (px)
    pub load_more_threshold_px: f64,

    /// Distance from the top of the message pane that triggers an older-page load (px)
    pub older_page_threshold_px: f64,

    /// Distance from the bottom of the message pane still counted as at-bottom (px)
    pub at_bottom_threshold_px: f64,

    /// Minimum time between scroll-triggered load-more requests (ms)
    pub load_more_interval_ms: u64,

    /// Quiet period that collapses a burst of scroll events (ms)
    pub scroll_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conversation_page_size: 20,
            message_page_size: 20,
            load_more_threshold_px: 50.0,
            older_page_threshold_px: 50.0,
            at_bottom_threshold_px: 20.0,
            load_more_interval_ms: 1_000,
            scroll_debounce_ms: 300,
        }
    }
}

impl SyncConfig {
    /// Parse a (possibly partial) JSON document
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the conversation page size
    pub fn with_conversation_page_size(mut self, size: usize) -> Self {
        self.conversation_page_size = size;
        self
    }

    /// Set the message page size
    pub fn with_message_page_size(mut self, size: usize) -> Self {
        self.message_page_size = size;
        self
    }

    /// Set the load-more interval and debounce
    pub fn with_scroll_timing(mut self, interval: Duration, debounce: Duration) -> Self {
        self.load_more_interval_ms = interval.as_millis() as u64;
        self.scroll_debounce_ms = debounce.as_millis() as u64;
        self
    }

    /// Minimum time between scroll-triggered load-more requests
    pub fn load_more_interval(&self) -> Duration {
        Duration::from_millis(self.load_more_interval_ms)
    }

    /// Debounce applied to scroll-triggered load-more requests
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }
}
