//! Pagination engine
//!
//! Maps the abstract `(page, size)` request from [`ListOptions`] onto the
//! native primitive of each backend:
//!
//! * continuation tokens (Kubernetes): sequential walk, `page + 1` calls;
//! * `LIMIT/OFFSET` (PostgreSQL): a single window;
//! * full enumeration (Vault): slicing a client-side filtered list.
//!
//! A page past the last one is an empty list on every backend.
//!
//! None of these models gives snapshot isolation. Writes landing between the
//! calls of a continuation walk, or between two page requests, may shift items
//! across page boundaries so that an item shows up twice or not at all.

use std::future::Future;

use odahuflow_core::{ListOptions, ResourceFilter, ResourceResult};
use tracing::debug;

/// One chunk returned by a continuation-token backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPage<T> {
    pub items: Vec<T>,
    /// Cursor for the next chunk, `None` once the listing is exhausted
    pub continue_token: Option<String>,
}

impl<T> TokenPage<T> {
    pub fn new(items: Vec<T>, continue_token: Option<String>) -> Self {
        Self {
            items,
            continue_token: continue_token.filter(|token| !token.is_empty()),
        }
    }
}

/// Fetch logical page `page` from a backend that only hands out opaque
/// continuation tokens.
///
/// Chunk `i + 1` can only be obtained by presenting the token of chunk `i`,
/// so reaching page `P` costs `P + 1` backend calls. Only the items of the
/// final call are returned. If the backend runs out of tokens before page `P`
/// is reached, the result is empty.
pub async fn walk_continuation<T, F, Fut>(page: usize, mut fetch: F) -> ResourceResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ResourceResult<TokenPage<T>>>,
{
    let mut token: Option<String> = None;

    for i in 0..=page {
        let chunk = fetch(token.take()).await?;
        if i == page {
            return Ok(chunk.items);
        }

        match chunk.continue_token {
            Some(next) => token = Some(next),
            None => {
                debug!(page, last_page = i, "requested page is past the end of the listing");
                return Ok(Vec::new());
            }
        }
    }

    Ok(Vec::new())
}

/// `(LIMIT, OFFSET)` pair for an offset-capable backend
pub fn offset_window<F: ResourceFilter>(options: &ListOptions<F>) -> (i64, i64) {
    let limit = i64::try_from(options.page_size()).unwrap_or(i64::MAX);
    let offset = i64::try_from(options.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

/// Cut the requested page out of an already filtered, ordered result set
pub fn slice_page<T, F: ResourceFilter>(items: Vec<T>, options: &ListOptions<F>) -> Vec<T> {
    items
        .into_iter()
        .skip(options.offset())
        .take(options.page_size())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use odahuflow_core::{NoFilter, ResourceError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend holding `total` numbered items, served `size` at a time
    async fn numbered(total: usize, size: usize, token: Option<String>) -> ResourceResult<TokenPage<usize>> {
        let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + size).min(total);
        let next = (end < total).then(|| end.to_string());
        Ok(TokenPage::new((start..end).collect(), next))
    }

    #[tokio::test]
    async fn test_walk_reaches_each_page() {
        for page in 0..5 {
            let items = walk_continuation(page, |token| numbered(5, 1, token)).await.unwrap();
            assert_eq!(items, vec![page]);
        }
    }

    #[tokio::test]
    async fn test_walk_costs_page_plus_one_calls() {
        let calls = AtomicUsize::new(0);
        let items = walk_continuation(3, |token| {
            calls.fetch_add(1, Ordering::SeqCst);
            numbered(10, 2, token)
        })
        .await
        .unwrap();

        assert_eq!(items, vec![6, 7]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_walk_past_the_end_is_empty() {
        let items = walk_continuation(5, |token| numbered(5, 1, token)).await.unwrap();
        assert!(items.is_empty());

        let items = walk_continuation(7, |token| numbered(5, 2, token)).await.unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_walk_propagates_backend_errors() {
        let result: ResourceResult<Vec<usize>> = tokio_test::block_on(walk_continuation(0, |_| async {
            Err(ResourceError::unavailable("boom"))
        }));
        assert_eq!(result, Err(ResourceError::Unavailable("boom".to_string())));
    }

    #[test]
    fn test_empty_token_means_exhausted() {
        let page = TokenPage::new(vec![1], Some(String::new()));
        assert_eq!(page.continue_token, None);
    }

    #[test]
    fn test_offset_window_and_slice() {
        let options = ListOptions::<NoFilter>::new().page(2).size(3);
        assert_eq!(offset_window(&options), (3, 6));

        let items: Vec<usize> = (0..8).collect();
        assert_eq!(slice_page(items.clone(), &options), vec![6, 7]);
        assert!(slice_page(items, &options.clone().page(3)).is_empty());
    }

    #[test]
    fn test_zero_size_pages_hold_one_item() {
        let options = ListOptions::<NoFilter>::new().size(0).page(2);
        assert_eq!(offset_window(&options), (1, 2));

        let items: Vec<usize> = (0..5).collect();
        assert_eq!(slice_page(items, &options), vec![2]);
    }
}
