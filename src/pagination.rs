use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Largest row offset a store query accepts.
pub const MAX_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Bounds applied to client supplied page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: 100,
        }
    }
}

/// A resolved page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub per_page: u64,
    pub page: u64,
}

impl PageRequest {
    /// Resolves raw query values the way integer coercion of a query string would:
    /// unparsable or zero page sizes fall back to the default, oversized ones are capped,
    /// and page 0 means page 1.
    #[must_use]
    pub fn resolve(per_page: Option<&str>, page: Option<&str>, limits: PageLimits) -> Self {
        let per_page = match per_page.map(parse_count).unwrap_or(0) {
            0 => limits.default_per_page,
            n => n.min(limits.max_per_page),
        };
        Self {
            per_page,
            page: page.map(parse_count).unwrap_or(1),
        }
        .bounded()
    }

    /// Keeps `per_page` at least 1 and `page` between 1 and the last page whose offset
    /// stays within [`MAX_OFFSET`]. Pages past that are empty anyway.
    #[must_use]
    pub fn bounded(self) -> Self {
        let per_page = self.per_page.max(1);
        Self {
            per_page,
            page: self.page.clamp(1, MAX_OFFSET / per_page + 1),
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// Reads the leading digits of `raw`, yielding 0 when there are none. Values too large
/// for a `u64` saturate.
#[must_use]
pub fn parse_count(raw: &str) -> u64 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u64::MAX)
}

/// One page of results with length-aware metadata.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let last_page = total.div_ceil(request.per_page.max(1)).max(1);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = request.offset().saturating_add(1);
            (Some(from), Some(from.saturating_add(data.len() as u64 - 1)))
        };
        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
            from,
            to,
        }
    }
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

/// Builds the `Content-Range` header describing a page, e.g. `people 0-9/25`.
///
/// An empty page is reported as `people */25`.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    limit: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let safe_name = sanitize_resource_name(resource_name);
    let last = offset.saturating_add(limit).min(total_count);

    let content_range = if last > offset {
        format!("{safe_name} {offset}-{}/{total_count}", last - 1)
    } else {
        format!("{safe_name} */{total_count}")
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) = content_range.parse() {
        headers.insert("Content-Range", value);
    }
    headers
}
