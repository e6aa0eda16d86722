//! Tail pagination for the message list.
//!
//! The viewport always shows the newest `displayed_count` messages. Paging
//! back reveals older ones a page at a time. New arrivals only extend the
//! window when it was already showing everything ("stick to bottom"), so an
//! operator reading history is not yanked around by a live session.

/// Default number of messages per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    page_size: usize,
    displayed_count: usize,
}

impl Viewport {
    /// Creates a viewport showing one page. A zero page size is bumped to 1.
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self { page_size, displayed_count: page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn displayed_count(&self) -> usize {
        self.displayed_count
    }

    /// The newest `displayed_count` items of `items`.
    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = items.len().saturating_sub(self.displayed_count);
        &items[start..]
    }

    /// Whether older items exist beyond the window.
    pub fn has_more(&self, total: usize) -> bool {
        self.displayed_count < total
    }

    /// Pages one more batch of older items into view.
    pub fn load_more(&mut self, total: usize) {
        self.displayed_count = (self.displayed_count + self.page_size).min(total);
    }

    /// Follows new content only when the window was already at the bottom.
    pub fn on_messages_changed(&mut self, old_total: usize, new_total: usize) {
        if self.displayed_count >= old_total && new_total > old_total {
            self.displayed_count = new_total;
        }
    }

    /// Back to a single page, e.g. when a different session is shown.
    pub fn reset(&mut self) {
        self.displayed_count = self.page_size;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
