use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;

/// Opaque value returned by a paginated read when more results exist
pub trait ContinuationToken {
    /// Whether the token carries no position at all (empty string, empty key map).
    ///
    /// An exhausted token is terminal, exactly like an absent one.
    fn is_exhausted(&self) -> bool;
}

impl ContinuationToken for String {
    fn is_exhausted(&self) -> bool {
        self.is_empty()
    }
}

impl ContinuationToken for &str {
    fn is_exhausted(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> ContinuationToken for HashMap<K, V, S> {
    fn is_exhausted(&self) -> bool {
        self.is_empty()
    }
}

/// One bounded response from a paginated read
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, K> {
    /// Records in the order the service returned them
    pub items: Vec<T>,
    /// Present iff more pages remain
    pub continuation: Option<K>,
}

impl<T, K: ContinuationToken> Page<T, K> {
    pub fn new(items: Vec<T>, continuation: Option<K>) -> Self {
        Self {
            items,
            continuation: continuation.filter(|token| !token.is_exhausted()),
        }
    }

    /// Build a page from a raw service response.
    ///
    /// A missing items field is reported as [`Error::MalformedPage`] rather than
    /// read as an empty page, so results are never silently under-reported.
    pub fn from_parts(items: Option<Vec<T>>, continuation: Option<K>) -> Result<Self, Error> {
        let items = items
            .ok_or_else(|| Error::MalformedPage("Missing 'items' field".to_string()))?;
        Ok(Self::new(items, continuation))
    }

    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// A paginated read operation against an external service
#[async_trait]
pub trait PageFetcher<Q: ?Sized + Sync>: Send + Sync {
    type Item: Send;
    type Token: ContinuationToken + Send;
    type Error: Send;

    /// Fetch the page following `continuation`, or the first page when it is `None`
    async fn fetch_page(
        &self,
        query: &Q,
        continuation: Option<Self::Token>,
    ) -> Result<Page<Self::Item, Self::Token>, Self::Error>;
}

/// Drive `fetch` until a page arrives without a continuation token and
/// return every item in page-arrival order.
///
/// `query` is forwarded unchanged on every call and each token is handed back
/// verbatim. A failed fetch ends the loop and its error is returned as-is;
/// items gathered from earlier pages are dropped with it.
pub async fn fetch_all<'a, Q, T, K, E, F, Fut>(query: &'a Q, mut fetch: F) -> Result<Vec<T>, E>
where
    Q: ?Sized,
    K: ContinuationToken,
    F: FnMut(&'a Q, Option<K>) -> Fut,
    Fut: Future<Output = Result<Page<T, K>, E>>,
{
    let mut items = Vec::new();
    let mut continuation = None;

    loop {
        let page = fetch(query, continuation.take()).await?;
        items.extend(page.items);

        match page.continuation.filter(|token| !token.is_exhausted()) {
            Some(token) => continuation = Some(token),
            None => return Ok(items),
        }
    }
}

/// [`fetch_all`] over a [`PageFetcher`]
pub async fn fetch_all_pages<'a, Q, P>(fetcher: &'a P, query: &'a Q) -> Result<Vec<P::Item>, P::Error>
where
    Q: ?Sized + Sync,
    P: PageFetcher<Q>,
{
    fetch_all(query, |query, continuation| fetcher.fetch_page(query, continuation)).await
}
