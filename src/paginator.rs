/// One page cut out of a filtered result.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub rows: &'a [T],
    /// Number of pages of the full result. Zero when the result is empty.
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<'_, T> {
    /// Page count as shown to the user. An empty result still has one (empty) page.
    pub fn display_pages(&self) -> usize {
        std::cmp::max(1, self.total_pages)
    }
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size)
}

/// Largest valid page index for a result of `len` items.
pub fn last_page_index(len: usize, page_size: usize) -> usize {
    total_pages(len, page_size).saturating_sub(1)
}

/// Slices `items` into the page at `page_index`.
///
/// Out of range indices give an empty page instead of failing.
pub fn paginate<T>(items: &[T], page_index: usize, page_size: usize) -> Page<'_, T> {
    let total_pages = total_pages(items.len(), page_size);
    let rbegin = std::cmp::min(page_index.saturating_mul(page_size), items.len());
    let rend = std::cmp::min(rbegin.saturating_add(page_size), items.len());

    Page {
        rows: &items[rbegin..rend],
        total_pages,
        has_prev: page_index > 0,
        has_next: page_index < total_pages.saturating_sub(1),
    }
}
