use serde::Serialize;

use crate::record::RecordInstance;

/// Rows skipped before `page` when pages hold `page_size` rows. Pages start at 1.
pub fn offset_for(page_size: u64, page: u64) -> u64 {
    page_size.saturating_mul(page.max(1) - 1)
}

/// Number of pages needed for `total_count` rows; 0 when `page_size` is 0.
pub fn total_pages(total_count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        total_count.div_ceil(page_size)
    }
}

/// One page of records together with the size of the whole result.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResultSet {
    pub items: Vec<RecordInstance>,
    pub page_number: u64,
    pub page_size: u64,
    pub total_count: u64,
}

/// Serializable page summary without the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page_number: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl PagedResultSet {
    pub fn total_pages(&self) -> u64 {
        total_pages(self.total_count, self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn info(&self) -> PageInfo {
        PageInfo {
            page_number: self.page_number,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages(),
        }
    }
}

impl IntoIterator for PagedResultSet {
    type Item = RecordInstance;
    type IntoIter = std::vec::IntoIter<RecordInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_arithmetic() {
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(5, 0), 0);
        assert_eq!(offset_for(10, 3), 20);
        assert_eq!(offset_for(10, 1), 0);
        assert_eq!(offset_for(10, 0), 0);
    }

    #[test]
    fn test_navigation() {
        let page = PagedResultSet {
            items: Vec::new(),
            page_number: 2,
            page_size: 10,
            total_count: 25,
        };
        assert!(page.has_next());
        assert!(page.has_previous());
        assert_eq!(page.info().total_pages, 3);
    }
}
