//! Pagination arithmetic for product listings.

use serde::Serialize;

use super::filter::FilterError;

/// Pagination block returned next to a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Build the pagination block for a 1-indexed `page`.
    ///
    /// Pages beyond `total_pages` are valid; they simply hold no rows.
    pub fn new(page: u32, limit: u32, total: u64) -> Result<Self, FilterError> {
        Ok(Self {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit)?,
        })
    }

    /// Number of rows the requested page holds for this total.
    pub fn expected_rows(&self) -> u64 {
        let offset = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit);
        self.total
            .saturating_sub(offset)
            .min(u64::from(self.limit))
    }
}

/// `ceil(total / limit)`.
pub fn total_pages(total: u64, limit: u32) -> Result<u64, FilterError> {
    if limit == 0 {
        return Err(FilterError::ZeroLimit);
    }
    Ok(total.div_ceil(u64::from(limit)))
}
