pub mod tenable;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, FetchParams};
use crate::config::ApiConfig;
use crate::error::{Result, SyncError};

/// One page of the remote catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    pub total_count: u64,
}

/// Anything that can serve numbered pages of the catalog.
pub trait PageSource {
    fn fetch_page(&self, params: &FetchParams) -> Result<CatalogPage>;
}

/// What `fetch_all` does when a page request fails with a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per page. `None` retries until the page succeeds.
    pub max_retries: Option<u32>,
    pub delay: Duration,
}

/// Pacing for a paginated fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Pause between successful pages
    pub interval: Duration,
    pub retry: RetryPolicy,
}

impl Pagination {
    pub fn from_config(api: &ApiConfig) -> Self {
        Pagination {
            interval: api.request_interval(),
            retry: RetryPolicy {
                max_retries: api.max_retries(),
                delay: api.retry_delay(),
            },
        }
    }
}

/// Fetch pages starting at `params.page` until the last one is consumed.
///
/// `params.page` is advanced in place; on return it holds the last page
/// requested. Transport failures re-request the same page per the retry
/// policy; anything else aborts.
pub fn fetch_all<S: PageSource + ?Sized>(
    source: &S,
    params: &mut FetchParams,
    pacing: &Pagination,
) -> Result<Vec<CatalogEntry>> {
    if params.page_size == 0 {
        return Err(SyncError::InvalidParams("page size must be at least 1".into()));
    }
    if params.page == 0 {
        return Err(SyncError::InvalidParams("pages are numbered from 1".into()));
    }

    let mut entries = Vec::new();
    let mut failures: u32 = 0;

    loop {
        info!("Requesting plugin page {}", params.page);
        let page = match source.fetch_page(params) {
            Ok(page) => page,
            Err(e) if e.is_retryable() => {
                failures += 1;
                if let Some(max) = pacing.retry.max_retries {
                    if failures > max {
                        return Err(SyncError::RetriesExhausted {
                            page: params.page,
                            attempts: failures,
                            last_error: Box::new(e),
                        });
                    }
                }
                warn!("Failed to fetch plugin page {} (attempt {}): {}", params.page, failures, e);
                sleep(pacing.retry.delay);
                continue;
            }
            Err(e) => return Err(e),
        };
        failures = 0;

        debug!(
            "Page {} returned {} entries (total_count {})",
            params.page,
            page.entries.len(),
            page.total_count
        );
        entries.extend(page.entries);

        if params.is_last_page(page.total_count) {
            break;
        }
        params.page += 1;
        sleep(pacing.interval);
    }

    Ok(entries)
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn transport_error() -> SyncError {
        SyncError::transport("http://test/plugins/plugin", "connection reset")
    }

    #[test]
    fn stops_after_last_page() {
        let source = ScriptedSource::new(catalog(25));
        let mut params = FetchParams::new(10, None);

        let entries = fetch_all(&source, &mut params, &no_wait(Some(3))).unwrap();
        assert_eq!(entries.len(), 25);
        assert_eq!(source.requested_pages(), vec![1, 2, 3]);
        assert_eq!(params.page, 3);
    }

    #[test]
    fn exact_multiple_requests_one_trailing_page() {
        let source = ScriptedSource::new(catalog(20));
        let mut params = FetchParams::new(10, None);

        let entries = fetch_all(&source, &mut params, &no_wait(None)).unwrap();
        assert_eq!(entries.len(), 20);
        assert_eq!(source.requested_pages(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_catalog_is_one_request() {
        let source = ScriptedSource::new(Vec::new());
        let mut params = FetchParams::new(10, None);
        let entries = fetch_all(&source, &mut params, &no_wait(None)).unwrap();
        assert!(entries.is_empty());
        assert_eq!(source.requested_pages(), vec![1]);
    }

    #[test]
    fn transport_failure_retries_same_page() {
        let source = ScriptedSource::new(catalog(25))
            .fail_page(2, transport_error())
            .fail_page(2, transport_error());
        let mut params = FetchParams::new(10, None);

        let entries = fetch_all(&source, &mut params, &no_wait(None)).unwrap();
        assert_eq!(entries.len(), 25);
        assert_eq!(source.requested_pages(), vec![1, 2, 2, 2, 3]);
    }

    #[test]
    fn retry_cap_is_per_page() {
        let source = ScriptedSource::new(catalog(25))
            .fail_page(1, transport_error())
            .fail_page(2, transport_error())
            .fail_page(3, transport_error());
        let mut params = FetchParams::new(10, None);

        let entries = fetch_all(&source, &mut params, &no_wait(Some(1))).unwrap();
        assert_eq!(entries.len(), 25);
    }

    #[test]
    fn gives_up_once_retries_are_spent() {
        let source = ScriptedSource::new(catalog(25))
            .fail_page(2, transport_error())
            .fail_page(2, transport_error())
            .fail_page(2, transport_error());
        let mut params = FetchParams::new(10, None);

        match fetch_all(&source, &mut params, &no_wait(Some(2))) {
            Err(SyncError::RetriesExhausted { page, attempts, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(source.requested_pages(), vec![1, 2, 2, 2]);
    }

    #[test]
    fn non_transport_errors_are_fatal() {
        let bad_body = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let source = ScriptedSource::new(catalog(5)).fail_page(
            1,
            SyncError::Decode {
                url: "http://test".into(),
                source: bad_body,
            },
        );
        let mut params = FetchParams::new(10, None);

        let err = fetch_all(&source, &mut params, &no_wait(None)).unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
        assert_eq!(source.requested_pages(), vec![1]);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let source = ScriptedSource::new(catalog(5));
        let mut params = FetchParams::new(0, None);
        let err = fetch_all(&source, &mut params, &no_wait(None)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidParams(_)));
        assert!(source.requested_pages().is_empty());
    }

    #[test]
    fn filter_is_sent_on_every_page() {
        let since = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let source = ScriptedSource::new(catalog(7));
        let mut params = FetchParams::new(3, Some(since));
        fetch_all(&source, &mut params, &no_wait(None)).unwrap();
        assert!(source
            .requests
            .borrow()
            .iter()
            .all(|p| p.last_updated == Some(since)));
    }
}
