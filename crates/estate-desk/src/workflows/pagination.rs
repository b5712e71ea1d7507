use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Default and maximum page size for one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl PageLimits {
    pub const BUYER_LEADS: Self = Self::new(20, 50);
    pub const AGENT_LEADS: Self = Self::new(20, 50);
    pub const ADMIN_LEADS: Self = Self::new(50, 100);
    pub const VISITS: Self = Self::new(50, 500);
    pub const DEALS: Self = Self::new(50, 100);

    pub const fn new(default_limit: u32, max_limit: u32) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn resolve(
        page: Option<u32>,
        limit: Option<u32>,
        limits: PageLimits,
    ) -> Result<Self, PipelineError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(PipelineError::validation("page", "page must be at least 1"));
        }

        let limit = limit.unwrap_or(limits.default_limit);
        if limit == 0 || limit > limits.max_limit {
            return Err(PipelineError::validation(
                "limit",
                format!("limit must be between 1 and {}", limits.max_limit),
            ));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Slice an already ordered result set.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest) -> Self {
        Self {
            items,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            page: self.page,
            limit: self.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_listing_limits() {
        let request = PageRequest::resolve(None, None, PageLimits::ADMIN_LEADS).expect("defaults");
        assert_eq!(request, PageRequest { page: 1, limit: 50 });
    }

    #[test]
    fn rejects_zero_page_and_oversized_limit() {
        assert!(matches!(
            PageRequest::resolve(Some(0), None, PageLimits::DEALS),
            Err(PipelineError::Validation { field: "page", .. })
        ));
        assert!(matches!(
            PageRequest::resolve(None, Some(51), PageLimits::BUYER_LEADS),
            Err(PipelineError::Validation { field: "limit", .. })
        ));
        assert!(PageRequest::resolve(None, Some(500), PageLimits::VISITS).is_ok());
    }

    #[test]
    fn apply_skips_earlier_pages() {
        let request = PageRequest { page: 2, limit: 2 };
        assert_eq!(request.apply(1..=5), vec![3, 4]);
    }
}
