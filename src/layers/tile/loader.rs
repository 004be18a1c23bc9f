use super::cache::TileCache;
use crate::core::geo::TileCoord;
use crate::data::fetch::{AssetFetcher, HttpFetcher};
use crate::runtime;
use fxhash::FxHashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Fetches tiles in the background and stores them in a [`TileCache`].
///
/// Each coordinate is requested at most once while pending. A failed request
/// is logged and remembered, and the tile is not requested again until the
/// loader is reset.
pub struct TileLoader {
    fetcher: Arc<dyn AssetFetcher>,
    cache: TileCache,
    pending: Arc<Mutex<FxHashSet<TileCoord>>>,
    failed: Arc<Mutex<FxHashSet<TileCoord>>>,
    token: CancellationToken,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, cache: TileCache) -> Self {
        Self {
            fetcher,
            cache,
            pending: Arc::new(Mutex::new(FxHashSet::default())),
            failed: Arc::new(Mutex::new(FxHashSet::default())),
            token: CancellationToken::new(),
        }
    }

    /// Loader fetching absolute tile URLs over the shared HTTP client
    pub fn http() -> Self {
        Self::new(Arc::new(HttpFetcher::shared()), TileCache::default())
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn get(&self, coord: &TileCoord) -> Option<Arc<Vec<u8>>> {
        self.cache.get(coord)
    }

    pub fn is_pending(&self, coord: &TileCoord) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains(coord))
            .unwrap_or(false)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    pub fn has_failed(&self, coord: &TileCoord) -> bool {
        self.failed
            .lock()
            .map(|failed| failed.contains(coord))
            .unwrap_or(false)
    }

    /// Starts fetching `coord` from `url` unless it is cached, pending or failed
    pub fn request(&self, coord: TileCoord, url: String) {
        if self.cache.contains(&coord) || self.has_failed(&coord) {
            return;
        }
        match self.pending.lock() {
            Ok(mut pending) => {
                if !pending.insert(coord) {
                    return;
                }
            }
            Err(_) => return,
        }

        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let pending = self.pending.clone();
        let failed = self.failed.clone();
        let token = self.token.clone();

        runtime::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => None,
                result = fetcher.fetch(&url) => Some(result),
            };

            match result {
                Some(Ok(data)) => {
                    log::trace!("tile {} loaded ({} bytes)", coord, data.len());
                    cache.insert(coord, Arc::new(data));
                }
                Some(Err(err)) => {
                    log::debug!("tile {} failed: {}", coord, err);
                    if let Ok(mut failed) = failed.lock() {
                        failed.insert(coord);
                    }
                }
                None => log::trace!("tile {} request cancelled", coord),
            }

            if let Ok(mut pending) = pending.lock() {
                pending.remove(&coord);
            }
        });
    }

    /// Cancels in-flight requests and forgets failures. Cached tiles stay.
    pub fn reset(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
        if let Ok(mut failed) = self.failed.lock() {
            failed.clear();
        }
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AssetFetcher for CountingFetcher {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                Err(MapError::Http {
                    status: 404,
                    url: path.to_string(),
                })
            } else {
                Ok(path.as_bytes().to_vec())
            }
        }
    }

    fn loader(fail: bool) -> (TileLoader, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail,
        });
        (TileLoader::new(fetcher.clone(), TileCache::new(16)), fetcher)
    }

    #[tokio::test]
    async fn test_requests_are_deduplicated_and_cached() {
        let (loader, fetcher) = loader(false);
        let coord = TileCoord::new(1, 2, 3);

        loader.request(coord, "3/2/1".to_string());
        loader.request(coord, "3/2/1".to_string());
        assert!(loader.is_pending(&coord));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.pending_count(), 0);
        assert_eq!(loader.get(&coord).as_deref(), Some(&b"3/2/1".to_vec()));

        loader.request(coord, "3/2/1".to_string());
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_dropped_without_retry() {
        let (loader, fetcher) = loader(true);
        let coord = TileCoord::new(0, 0, 0);

        loader.request(coord, "0/0/0".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(loader.get(&coord).is_none());
        assert!(loader.has_failed(&coord));

        loader.request(coord, "0/0/0".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_cancels_in_flight() {
        let (mut loader, _fetcher) = loader(false);
        let coord = TileCoord::new(0, 0, 0);

        loader.request(coord, "0/0/0".to_string());
        loader.reset();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(loader.get(&coord).is_none());
        assert_eq!(loader.pending_count(), 0);
    }
}
