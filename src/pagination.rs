//! Page/limit pagination arithmetic shared by listings and search.
//!
//! Input is lenient: a page or limit that is missing, non-numeric or out of
//! range falls back to the default instead of failing the request.

use serde::{Deserialize, Serialize};

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Fallback page and limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefaults {
    /// Page used when none or an invalid one is given.
    pub page: u32,
    /// Page size used when none or an invalid one is given.
    pub limit: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub limit: u32,
}

impl PageRequest {
    /// Build a request, replacing out-of-range values with the defaults.
    pub fn new(page: u32, limit: u32) -> Self {
        let defaults = PageDefaults::default();
        Self {
            page: if page >= 1 { page } else { defaults.page },
            limit: if (1..=MAX_PAGE_LIMIT).contains(&limit) { limit } else { defaults.limit },
        }
    }

    /// First page with the given limit.
    pub fn first(limit: u32) -> Self {
        Self::new(1, limit)
    }

    /// Number of rows to skip. Page 0 reads like page 1.
    pub fn skip(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Total pages for a row count at this request's limit.
    pub fn total_pages(&self, total_count: u64) -> u32 {
        total_pages(total_count, self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        let defaults = PageDefaults::default();
        Self {
            page: defaults.page,
            limit: defaults.limit,
        }
    }
}

/// Resolve raw page/limit parameters against defaults.
pub fn resolve(page: Option<&str>, limit: Option<&str>, defaults: PageDefaults) -> PageRequest {
    let page = page
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(defaults.page);
    let limit = limit
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
        .unwrap_or(defaults.limit);
    PageRequest { page, limit }
}

/// `ceil(total_count / limit)`, never less than one page.
pub fn total_pages(total_count: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 1;
    }
    let pages = total_count.div_ceil(u64::from(limit));
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}
