//! Debounced, latest-only search for clients of `/api/users/search`.
//!
//! Each call takes a ticket. A call that is no longer the newest after the
//! debounce delay never fetches; one that is superseded while its request is
//! in flight has its result dropped.

use std::future::Future;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct LatestSearch {
    latest: Arc<AtomicU64>,
    delay: Duration,
}

impl Default for LatestSearch {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl LatestSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Invalidates every call still pending, e.g. when the search box is cleared.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// `None` when a newer call superseded this one.
    pub async fn run<F, Fut, T>(&self, query: String, fetch: F) -> Option<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.delay).await;
        if !self.is_current(ticket) {
            return None;
        }

        let result = fetch(query).await;
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(ticket, "discarding stale search result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn single_search_returns_its_result() {
        let search = LatestSearch::default();
        let result = search.run("jo".into(), |q| async move { q.len() }).await;
        assert_eq!(result, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_search_never_fetches() {
        let search = LatestSearch::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let search = search.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                search
                    .run("j".into(), |q| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        q
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls2 = calls.clone();
        let second = search
            .run("jo".into(), |q| async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                q
            })
            .await;

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.as_deref(), Some("jo"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stale_response_is_dropped() {
        let search = LatestSearch::new(Duration::from_millis(10));

        let slow = {
            let search = search.clone();
            tokio::spawn(async move {
                search
                    .run("jo".into(), |q| async move {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        q
                    })
                    .await
            })
        };
        // let the first call get past its debounce and start fetching
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fresh = search.run("joh".into(), |q| async move { q }).await;
        assert_eq!(fresh.as_deref(), Some("joh"));
        assert_eq!(slow.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_calls() {
        let search = LatestSearch::default();
        let pending = {
            let search = search.clone();
            tokio::spawn(async move { search.run("jo".into(), |q| async move { q }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        search.cancel();
        assert_eq!(pending.await.unwrap(), None);
    }
}
