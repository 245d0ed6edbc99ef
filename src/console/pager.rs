//! Fixed-size pagination over an ordered list.

/// Entries per page; the chat select menu caps out at this many options.
pub const PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct Pager<T> {
    items: Vec<T>,
    index: usize,
}

/// A borrowed view of one page.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Zero-based page index.
    pub index: usize,
    pub count: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<'a, T> Page<'a, T> {
    /// "Page X/Y" with X one-based. An empty list shows as page 1/1.
    pub fn indicator(&self) -> String {
        format!("Page {}/{}", self.index + 1, self.count.max(1))
    }
}

impl<T> Pager<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, index: 0 }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `ceil(len / PAGE_SIZE)`.
    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(PAGE_SIZE)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Page `n` (zero-based). Out-of-range pages are empty slices.
    pub fn page(&self, n: usize) -> Page<'_, T> {
        let start = (n * PAGE_SIZE).min(self.items.len());
        let end = (start + PAGE_SIZE).min(self.items.len());
        let count = self.page_count();
        Page {
            items: &self.items[start..end],
            index: n,
            count,
            has_prev: n > 0,
            has_next: n + 1 < count,
        }
    }

    pub fn current(&self) -> Page<'_, T> {
        self.page(self.index)
    }

    /// Advance one page; returns false when already on the last page.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.page_count() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Replace the contents, keeping the current page when it still exists.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        let last = self.page_count().saturating_sub(1);
        self.index = self.index.min(last);
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}
