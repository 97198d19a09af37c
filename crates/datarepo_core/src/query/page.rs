use crate::query::spec::PageRequest;

/// One slice of an ordered result set plus navigation flags.
///
/// Only the query executor builds pages; the total is counted with the same
/// filter as the slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<E> {
    content: Vec<E>,
    request: PageRequest,
    total_elements: u64,
}

impl<E> Page<E> {
    pub(crate) fn new(content: Vec<E>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            request,
            total_elements,
        }
    }

    pub fn content(&self) -> &[E] {
        &self.content
    }

    pub fn into_content(self) -> Vec<E> {
        self.content
    }

    pub fn index(&self) -> u32 {
        self.request.index()
    }

    pub fn size(&self) -> u32 {
        self.request.size()
    }

    /// Rows matching the filter across all pages.
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(u64::from(self.request.size()))
    }

    pub fn has_previous(&self) -> bool {
        self.request.index() > 0
    }

    pub fn has_next(&self) -> bool {
        let seen = self
            .request
            .offset()
            .saturating_add(self.content.len() as u64);
        seen < self.total_elements
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Page;
    use crate::query::spec::PageRequest;

    #[test]
    fn first_of_two_pages() {
        let page = Page::new(vec![1, 2], PageRequest::of(0, 2).unwrap(), 3);
        assert!(!page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.total_pages(), 2);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::new(vec![3], PageRequest::of(1, 2).unwrap(), 3);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let page: Page<i32> = Page::new(Vec::new(), PageRequest::of(7, 2).unwrap(), 3);
        assert!(page.is_empty());
        assert!(page.has_previous());
        assert!(!page.has_next());
        assert_eq!(page.index(), 7);
    }

    #[test]
    fn last_possible_page_has_no_next() {
        let page: Page<i32> =
            Page::new(Vec::new(), PageRequest::of(u32::MAX, u32::MAX).unwrap(), 3);
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page: Page<i32> = Page::new(Vec::new(), PageRequest::of(0, 5).unwrap(), 0);
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }
}
