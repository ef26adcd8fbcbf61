//! Scroll geometry reported by the UI
//!
//! The stores never touch widgets. The UI reports its scroll container's
//! metrics as a [`Viewport`]; the stores answer with what to do (load, stay,
//! scroll to bottom, restore an anchor).

use serde::{Deserialize, Serialize};

/// Scroll container metrics, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Viewport {
    /// Offset of the visible area from the top of the content
    pub scroll_top: f64,
    /// Total content height
    pub scroll_height: f64,
    /// Visible height
    pub client_height: f64,
}

impl Viewport {
    /// Create a viewport
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Viewport scrolled all the way down
    pub fn at_bottom_of(scroll_height: f64, client_height: f64) -> Self {
        Self::new((scroll_height - client_height).max(0.0), scroll_height, client_height)
    }

    /// Pixels between the bottom of the visible area and the end of the content
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    /// Whether the visible area is within `threshold` of the end
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() < threshold
    }

    /// Whether the visible area is within `threshold` of the start
    pub fn is_near_top(&self, threshold: f64) -> bool {
        self.scroll_top < threshold
    }

    /// Whether the content is taller than the visible area
    pub fn is_filled(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

/// Scroll position captured before prepending older content
///
/// After the prepended rows render, [`restore`](ScrollAnchor::restore) gives
/// the offset that keeps the previously visible rows where they were.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollAnchor {
    /// Offset before the prepend
    pub scroll_top: f64,
    /// Content height before the prepend
    pub scroll_height: f64,
}

impl ScrollAnchor {
    /// Capture the anchor from the current viewport
    pub fn capture(viewport: &Viewport) -> Self {
        Self {
            scroll_top: viewport.scroll_top,
            scroll_height: viewport.scroll_height,
        }
    }

    /// Offset to apply once the content has grown to `new_scroll_height`
    pub fn restore(&self, new_scroll_height: f64) -> f64 {
        self.scroll_top + (new_scroll_height - self.scroll_height)
    }
}
