use crate::error::{Result, StreamError};
use serde::Serialize;
use std::fmt;

/// Shallowest crawl the server accepts.
pub const MIN_DEPTH: u8 = 1;
/// Deepest crawl the server accepts.
pub const MAX_DEPTH: u8 = 3;

/// Identity of one logical crawl: the `(page, depth, max_pages)` triple.
///
/// Construction validates the triple, so every value that exists can be sent
/// as-is. Retries re-send the same value; nothing mutates it after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CrawlRequest {
    page: String,
    depth: u8,
    max_pages: u32,
}

impl CrawlRequest {
    pub fn new(page: impl Into<String>, depth: u8, max_pages: u32) -> Result<Self> {
        let page = page.into().trim().to_string();

        if page.is_empty() {
            return Err(StreamError::InvalidRequest(
                "page must not be empty".to_string(),
            ));
        }
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(StreamError::InvalidRequest(format!(
                "depth must be between {} and {}, got {}",
                MIN_DEPTH, MAX_DEPTH, depth
            )));
        }
        if max_pages == 0 {
            return Err(StreamError::InvalidRequest(
                "max_pages must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            page,
            depth,
            max_pages,
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Query parameters in the order the crawler API documents them.
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("page", self.page.clone()),
            ("depth", self.depth.to_string()),
            ("max_pages", self.max_pages.to_string()),
        ]
    }
}

impl fmt::Display for CrawlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (depth {}, max {} pages)",
            self.page, self.depth, self.max_pages
        )
    }
}
