//! Offset pagination query parameters and page envelope.

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::domain::crud::{Page, PageRequest};
use crate::error::AppError;

/// Pagination query parameters.
///
/// Uses `serde_with` to parse numbers from query strings, which keeps
/// working when the struct is flattened into a larger query.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub skip: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PaginationParams {
    /// Validates the parameters and converts them to a [`PageRequest`].
    ///
    /// # Defaults
    ///
    /// - `skip`: 0
    /// - `limit`: 100
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `skip` is negative or `limit` is
    /// outside `1..=1000`.
    pub fn to_page_request(&self) -> Result<PageRequest, AppError> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT);

        if skip < 0 {
            return Err(AppError::validation(
                "skip must not be negative",
                json!({ "skip": skip }),
            ));
        }

        if !(1..=PageRequest::MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(
                format!("limit must be between 1 and {}", PageRequest::MAX_LIMIT),
                json!({ "limit": limit }),
            ));
        }

        Ok(PageRequest::new(skip, limit))
    }
}

/// One page of results.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> PageResponse<T> {
    pub fn from_page<E>(page: Page<E>, request: PageRequest, f: impl FnMut(E) -> T) -> Self {
        let page = page.map(f);
        Self {
            items: page.items,
            total: page.total,
            skip: request.skip,
            limit: request.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(skip: Option<i64>, limit: Option<i64>) -> PaginationParams {
        PaginationParams { skip, limit }
    }

    #[test]
    fn test_defaults() {
        let page = params(None, None).to_page_request().unwrap();
        assert_eq!(page, PageRequest::new(0, 100));
    }

    #[test]
    fn test_negative_skip_is_error() {
        assert!(params(Some(-1), None).to_page_request().is_err());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(params(None, Some(0)).to_page_request().is_err());
        assert!(params(None, Some(1)).to_page_request().is_ok());
        assert!(params(None, Some(1000)).to_page_request().is_ok());
        assert!(params(None, Some(1001)).to_page_request().is_err());
    }

    #[test]
    fn test_parses_from_query_string() {
        let p: PaginationParams = parse_query("skip=20&limit=10");
        assert_eq!(p.to_page_request().unwrap(), PageRequest::new(20, 10));
    }

    fn parse_query(query: &str) -> PaginationParams {
        let uri: axum::http::Uri = format!("/?{}", query).parse().unwrap();
        axum::extract::Query::<PaginationParams>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[test]
    fn test_page_response_keeps_request_window() {
        let page = Page {
            items: vec![1, 2],
            total: 15,
        };
        let response = PageResponse::from_page(page, PageRequest::new(10, 2), |n| n * 2);
        assert_eq!(response.items, vec![2, 4]);
        assert_eq!(response.total, 15);
        assert_eq!(response.skip, 10);
        assert_eq!(response.limit, 2);
    }
}
