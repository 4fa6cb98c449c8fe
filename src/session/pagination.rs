//! Page navigation rules

use crate::error::SearchError;

/// Tracks what is known about the extent of a result set and validates
/// navigation against it.
///
/// With a known total the last page is `ceil(total / page_size)`. Without
/// one, navigation moves forward one page at a time until a fetch comes
/// back empty.
#[derive(Debug, Clone)]
pub struct PaginationController {
    page_size: u32,
    /// Highest page that returned items
    highest_seen: u32,
    /// Lowest page known to be empty
    empty_floor: Option<u32>,
}

impl PaginationController {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            highest_seen: 0,
            empty_floor: None,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Forget everything learned about the previous result set
    pub fn reset(&mut self) {
        self.highest_seen = 0;
        self.empty_floor = None;
    }

    /// Remember how many items a fetch of `page` produced
    pub fn record_fetch(&mut self, page: u32, count: usize) {
        if count > 0 {
            self.highest_seen = self.highest_seen.max(page);
        } else {
            self.empty_floor = Some(self.empty_floor.map_or(page, |f| f.min(page)));
        }
    }

    /// Last page for a known total; never less than 1
    pub fn last_page(&self, estimated_total: Option<u64>) -> Option<u32> {
        estimated_total.map(|total| {
            let pages = total.div_ceil(self.page_size as u64).max(1);
            pages.min(u32::MAX as u64) as u32
        })
    }

    pub fn can_go_next(&self, current: u32, estimated_total: Option<u64>) -> bool {
        self.check(current as i64 + 1, current, estimated_total).is_ok()
    }

    pub fn can_go_prev(&self, current: u32) -> bool {
        current > 1
    }

    pub fn can_go_to(&self, target: i64, current: u32, estimated_total: Option<u64>) -> bool {
        self.check(target, current, estimated_total).is_ok()
    }

    /// Validate a navigation target, returning it as a page number
    pub fn check(
        &self,
        target: i64,
        current: u32,
        estimated_total: Option<u64>,
    ) -> Result<u32, SearchError> {
        if target < 1 {
            return Err(SearchError::invalid_page(target, "pages start at 1"));
        }

        if let Some(last) = self.last_page(estimated_total) {
            if target > last as i64 {
                return Err(SearchError::invalid_page(
                    target,
                    format!("last page is {}", last),
                ));
            }
            return Ok(target as u32);
        }

        if let Some(floor) = self.empty_floor {
            if target >= floor as i64 {
                return Err(SearchError::invalid_page(
                    target,
                    format!("no results beyond page {}", floor.saturating_sub(1).max(1)),
                ));
            }
        }

        let reachable = self.highest_seen.max(current) as i64 + 1;
        if target > reachable {
            return Err(SearchError::invalid_page(
                target,
                format!("total unknown, furthest reachable page is {}", reachable),
            ));
        }

        Ok(target as u32)
    }
}
