//! # Viewport
//!
//! Decides whether new content should pull the view to the bottom.
//!
//! The controller keeps an explicit "auto-follow" flag. Every user scroll
//! recomputes it from the distance to the bottom of the content; every
//! content change scrolls only while following. When the user has scrolled
//! away, new content leaves the position alone and raises a "jump to latest"
//! affordance instead.
//!
//! ```text
//!   ┌────────────────┐ 0
//!   │                │
//!   │   transcript   │
//!   ├────────────────┤ offset
//!   │    visible     │ viewport_height
//!   ├────────────────┤
//!   │                │ } distance_to_bottom
//!   └────────────────┘ content_height
//! ```
//!
//! Units are abstract (lines, pixels); only the ratios matter.

/// Distance below which the view counts as "at the bottom".
pub const NEAR_BOTTOM_THRESHOLD: u32 = 100;

/// What the render layer should do after a content change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    /// Move the view so its top edge is at this offset.
    ScrollTo(u32),
    /// Leave the view where it is.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    auto_follow: bool,
    show_jump: bool,
    offset: u32,
    content_height: u32,
    viewport_height: u32,
    threshold: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(NEAR_BOTTOM_THRESHOLD)
    }
}

impl Viewport {
    pub fn new(threshold: u32) -> Self {
        Self {
            auto_follow: true, // Start attached to bottom
            show_jump: false,
            offset: 0,
            content_height: 0,
            viewport_height: 0,
            threshold,
        }
    }

    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    /// True while new content has arrived below a scrolled-away view.
    pub fn show_jump(&self) -> bool {
        self.show_jump
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn content_height(&self) -> u32 {
        self.content_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    fn max_offset(&self) -> u32 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn distance_to_bottom(&self) -> u32 {
        self.max_offset().saturating_sub(self.offset)
    }

    /// The visible area changed size. Followers stay pinned.
    pub fn resize(&mut self, viewport_height: u32) -> ScrollCommand {
        self.viewport_height = viewport_height;
        if self.auto_follow {
            self.offset = self.max_offset();
            return ScrollCommand::ScrollTo(self.offset);
        }
        self.offset = self.offset.min(self.max_offset());
        ScrollCommand::Hold
    }

    /// The user scrolled to `offset`.
    pub fn on_scroll(&mut self, offset: u32) {
        self.offset = offset.min(self.max_offset());
        self.auto_follow = self.distance_to_bottom() < self.threshold;
        if self.auto_follow {
            self.show_jump = false;
        }
    }

    /// Content grew or shrank (new message, streaming delta).
    pub fn content_changed(&mut self, content_height: u32) -> ScrollCommand {
        let grew = content_height > self.content_height;
        self.content_height = content_height;
        if self.auto_follow {
            self.offset = self.max_offset();
            return ScrollCommand::ScrollTo(self.offset);
        }
        self.offset = self.offset.min(self.max_offset());
        if grew {
            self.show_jump = true;
        }
        ScrollCommand::Hold
    }

    /// "Jump to latest": follow again and scroll once.
    pub fn jump_to_latest(&mut self) -> ScrollCommand {
        self.auto_follow = true;
        self.show_jump = false;
        self.offset = self.max_offset();
        ScrollCommand::ScrollTo(self.offset)
    }
}
