use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PageContext<T> {
    pub results: Vec<T>,
    pub count: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, count: i64, page_size: i64, offset: i64) -> Self {
        if results.is_empty() {
            return Self::no_rows();
        }

        let next_offset = (offset + page_size < count).then(|| offset + page_size);
        let prev_offset = (offset > 0).then(|| (offset - page_size).max(0));

        Self {
            results,
            count,
            next_offset,
            prev_offset,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            results: vec![],
            count: 0,
            next_offset: None,
            prev_offset: None,
        }
    }
}

/// Normalizes a client-supplied page size against a default and a hard cap.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page_links_both_ways() {
        let page = PageContext::from_rows(vec![1, 2, 3], 30, 3, 6);
        assert_eq!(page.count, 30);
        assert_eq!(page.next_offset, Some(9));
        assert_eq!(page.prev_offset, Some(3));
    }

    #[test]
    fn first_page_has_no_prev() {
        let page = PageContext::from_rows(vec![1, 2, 3], 9, 3, 0);
        assert_eq!(page.prev_offset, None);
        assert_eq!(page.next_offset, Some(3));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PageContext::from_rows(vec![1], 7, 3, 6);
        assert_eq!(page.next_offset, None);
        assert_eq!(page.prev_offset, Some(3));
    }

    #[test]
    fn empty_result_is_empty_page() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 10, 0);
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn short_prev_page_clamps_to_zero() {
        let page = PageContext::from_rows(vec![1, 2], 12, 10, 2);
        assert_eq!(page.prev_offset, Some(0));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None, 10, 100), 10);
        assert_eq!(clamp_limit(Some(25), 10, 100), 25);
        assert_eq!(clamp_limit(Some(0), 10, 100), 1);
        assert_eq!(clamp_limit(Some(5000), 10, 100), 100);
        assert_eq!(clamp_offset(Some(-3)), 0);
    }
}
