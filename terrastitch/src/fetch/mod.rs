//! Tile fetcher: cache-or-download per coordinate.
//!
//! [`TileFetcher::fetch`] returns the cached bytes of a tile when present and
//! otherwise downloads it once from the provider, retrying transient failures
//! per the configured [`RetryPolicy`], and stores it atomically in the cache.
//!
//! # Idempotence
//!
//! Concurrent fetches of the same coordinate are serialized on a per-key
//! async mutex. The first caller downloads and writes; the others wake up to
//! a cache hit. Combined with atomic cache writes, a coordinate is never
//! downloaded twice and a partial file is never observed.
//!
//! # Batches
//!
//! [`TileFetcher::fetch_all`] runs many fetches on a [`JoinSet`], bounded by a
//! shared [`Semaphore`]. The first failure cancels the remaining work and is
//! returned once every spawned task has finished.

mod policy;

pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TileCache;
use crate::coord::{TileCoord, TileKey};
use crate::error::{StitchError, StitchResult};
use crate::provider::{ProviderError, TileProvider, DEFAULT_TIMEOUT_SECS};

/// Default number of concurrent downloads.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Fetcher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
    /// Upper bound on simultaneous downloads in a batch.
    pub max_concurrent: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Where a tile's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    /// Already present in the cache; no network call.
    Cached,
    /// Downloaded during this call.
    Downloaded,
}

impl fmt::Display for TileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileOrigin::Cached => write!(f, "cached"),
            TileOrigin::Downloaded => write!(f, "downloaded"),
        }
    }
}

/// Raw bytes of one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    pub coord: TileCoord,
    pub data: Vec<u8>,
    pub origin: TileOrigin,
}

/// Outcome of one tile within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedTile {
    pub coord: TileCoord,
    pub origin: TileOrigin,
    pub size_bytes: usize,
}

/// Progress event emitted after each completed tile in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub completed: usize,
    pub total: usize,
    pub tile: FetchedTile,
}

/// Aggregated result of a batch, tiles sorted by coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub tiles: Vec<FetchedTile>,
}

impl FetchSummary {
    /// Tiles downloaded during the batch.
    pub fn downloaded(&self) -> usize {
        self.count(TileOrigin::Downloaded)
    }

    /// Tiles served from the cache.
    pub fn cached(&self) -> usize {
        self.count(TileOrigin::Cached)
    }

    /// Bytes downloaded during the batch.
    pub fn downloaded_bytes(&self) -> u64 {
        self.tiles
            .iter()
            .filter(|t| t.origin == TileOrigin::Downloaded)
            .map(|t| t.size_bytes as u64)
            .sum()
    }

    fn count(&self, origin: TileOrigin) -> usize {
        self.tiles.iter().filter(|t| t.origin == origin).count()
    }
}

/// Downloads tiles through a cache.
///
/// Cloning is cheap; clones share the provider, cache and in-flight table.
pub struct TileFetcher<P: TileProvider> {
    provider: Arc<P>,
    cache: Arc<dyn TileCache>,
    config: FetchConfig,
    in_flight: Arc<DashMap<TileKey, Arc<Mutex<()>>>>,
}

impl<P: TileProvider> Clone for TileFetcher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<P: TileProvider + 'static> TileFetcher<P> {
    /// Creates a fetcher with default settings.
    pub fn new(provider: P, cache: Arc<dyn TileCache>) -> Self {
        Self::with_config(provider, cache, FetchConfig::default())
    }

    /// Creates a fetcher with custom settings.
    pub fn with_config(provider: P, cache: Arc<dyn TileCache>, config: FetchConfig) -> Self {
        Self::with_shared_provider(Arc::new(provider), cache, config)
    }

    /// Creates a fetcher around a provider shared with other fetchers.
    pub fn with_shared_provider(
        provider: Arc<P>,
        cache: Arc<dyn TileCache>,
        config: FetchConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Fetcher settings.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Returns the tile at `coord`, from cache or network.
    ///
    /// # Errors
    ///
    /// - [`StitchError::FetchFailed`] when the download fails permanently or
    ///   retries are exhausted
    /// - [`StitchError::CacheDirError`] when the cache cannot be read or
    ///   written
    pub async fn fetch(&self, coord: TileCoord) -> StitchResult<TileImage> {
        let key = TileKey::from(coord);

        if let Some(data) = self.cache.get(&key).await? {
            debug!(tile = %coord, bytes = data.len(), "Tile cache hit");
            return Ok(TileImage {
                coord,
                data,
                origin: TileOrigin::Cached,
            });
        }

        let lock = Arc::clone(
            self.in_flight
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(coord, key).await
        };

        // Map entry plus our clone means nobody else is waiting on this key.
        self.in_flight
            .remove_if(&key, |_, entry| Arc::strong_count(entry) <= 2);

        result
    }

    async fn fetch_locked(&self, coord: TileCoord, key: TileKey) -> StitchResult<TileImage> {
        // Another caller may have finished while we waited for the lock.
        if let Some(data) = self.cache.get(&key).await? {
            debug!(tile = %coord, "Tile cached by concurrent fetch");
            return Ok(TileImage {
                coord,
                data,
                origin: TileOrigin::Cached,
            });
        }

        let data = self.download(coord).await?;
        self.cache.put(&key, data.clone()).await?;

        Ok(TileImage {
            coord,
            data,
            origin: TileOrigin::Downloaded,
        })
    }

    async fn download(&self, coord: TileCoord) -> StitchResult<Vec<u8>> {
        let policy = &self.config.retry;
        let timeout = self.config.request_timeout;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                provider = self.provider.name(),
                tile = %coord,
                attempt,
                "Tile download attempt"
            );

            let outcome = match tokio::time::timeout(timeout, self.provider.fetch_tile(coord)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::HttpError(format!(
                    "timed out after {}s",
                    timeout.as_secs_f64()
                ))),
            };

            let error = match outcome {
                Ok(data) => {
                    debug!(tile = %coord, bytes = data.len(), attempt, "Tile downloaded");
                    return Ok(data);
                }
                Err(e) => e,
            };

            let retryable = error.is_retryable();
            warn!(
                provider = self.provider.name(),
                tile = %coord,
                attempt,
                retryable,
                error = %error,
                "Tile download error"
            );

            match policy.delay_for_attempt(attempt) {
                Some(delay) if retryable => tokio::time::sleep(delay).await,
                _ => {
                    return Err(StitchError::FetchFailed {
                        coord,
                        attempts: attempt,
                        reason: error.to_string(),
                    })
                }
            }
        }
    }

    /// Fetches every coordinate with bounded concurrency.
    ///
    /// `cancel` is checked before each tile starts; tiles already cached
    /// stay cached. `on_progress` runs on the calling task after each
    /// completed tile.
    ///
    /// # Errors
    ///
    /// The first fetch error, or [`StitchError::Cancelled`]. Either way the
    /// call returns only after all spawned tasks have finished.
    pub async fn fetch_all<I, F>(
        &self,
        coords: I,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> StitchResult<FetchSummary>
    where
        I: IntoIterator<Item = TileCoord>,
        F: FnMut(FetchProgress),
    {
        let mut coords: Vec<TileCoord> = coords.into_iter().collect();
        coords.sort_unstable();
        coords.dedup();

        let total = coords.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let batch = cancel.child_token();
        let mut tasks = JoinSet::new();

        info!(
            tiles = total,
            max_concurrent = self.config.max_concurrent,
            provider = self.provider.name(),
            "Fetching tiles"
        );

        for coord in coords {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let batch = batch.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = batch.cancelled() => return Err(StitchError::Cancelled),
                    permit = semaphore.acquire_owned() => {
                        permit.map_err(|_| StitchError::Cancelled)?
                    }
                };
                if batch.is_cancelled() {
                    return Err(StitchError::Cancelled);
                }

                let image = fetcher.fetch(coord).await?;
                Ok(FetchedTile {
                    coord,
                    origin: image.origin,
                    size_bytes: image.data.len(),
                })
            });
        }

        let mut tiles = Vec::with_capacity(total);
        let mut failure: Option<StitchError> = None;

        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok(Ok(tile)) => {
                    tiles.push(tile);
                    on_progress(FetchProgress {
                        completed: tiles.len(),
                        total,
                        tile,
                    });
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_err) => StitchError::TaskFailed(join_err.to_string()),
            };

            let replace = match &failure {
                None => true,
                Some(StitchError::Cancelled) => !matches!(error, StitchError::Cancelled),
                Some(_) => false,
            };
            if replace {
                if !matches!(error, StitchError::Cancelled) {
                    warn!(error = %error, "Aborting tile batch");
                }
                batch.cancel();
                failure = Some(error);
            }
        }

        if let Some(error) = failure {
            return Err(error);
        }

        tiles.sort_unstable_by_key(|t| t.coord);
        let summary = FetchSummary { tiles };
        info!(
            downloaded = summary.downloaded(),
            cached = summary.cached(),
            bytes = summary.downloaded_bytes(),
            "Tile fetch complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoxFuture, CacheError, MemoryTileCache};
    use crate::provider::{MapboxTerrainProvider, MockHttpClient};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(attempts: u32) -> FetchConfig {
        FetchConfig {
            retry: RetryPolicy::fixed(attempts, Duration::ZERO),
            max_concurrent: 4,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn mock_fetcher(
        mock: &MockHttpClient,
        attempts: u32,
    ) -> (TileFetcher<MapboxTerrainProvider<MockHttpClient>>, Arc<MemoryTileCache>) {
        let cache = Arc::new(MemoryTileCache::default());
        let provider = MapboxTerrainProvider::new(mock.clone(), "pk.test").unwrap();
        let fetcher = TileFetcher::with_config(provider, cache.clone(), fast_config(attempts));
        (fetcher, cache)
    }

    fn http_status(status: u16) -> ProviderError {
        ProviderError::HttpStatus {
            status,
            url: "u".to_string(),
        }
    }

    /// Provider that tracks peak concurrency and can fail one coordinate.
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        current: AtomicUsize,
        peak: Arc<AtomicUsize>,
        fail_on: Option<TileCoord>,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(delay: Duration) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                current: AtomicUsize::new(0),
                peak: Arc::new(AtomicUsize::new(0)),
                fail_on: None,
                delay,
            }
        }
    }

    impl TileProvider for CountingProvider {
        async fn fetch_tile(&self, coord: TileCoord) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(coord) {
                return Err(http_status(404));
            }
            Ok(vec![coord.x as u8, coord.y as u8])
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn min_zoom(&self) -> u8 {
            0
        }

        fn max_zoom(&self) -> u8 {
            24
        }
    }

    /// Cache whose writes always fail.
    struct ReadOnlyCache;

    impl TileCache for ReadOnlyCache {
        fn has(&self, _key: &TileKey) -> BoxFuture<'_, Result<bool, CacheError>> {
            Box::pin(async { Ok(false) })
        }

        fn get(&self, _key: &TileKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
            Box::pin(async { Ok(None) })
        }

        fn put(&self, _key: &TileKey, _data: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
            Box::pin(async {
                Err(CacheError::Io {
                    path: PathBuf::from("/readonly/1x1.png"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                })
            })
        }
    }

    fn grid(width: u32, height: u32, zoom: u8) -> Vec<TileCoord> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| TileCoord::new(x, y, zoom)))
            .collect()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let mock = MockHttpClient::new(Ok(vec![1]));
        let (fetcher, cache) = mock_fetcher(&mock, 3);
        cache.put(&TileKey::new(5, 6), vec![9, 9]).await.unwrap();

        let tile = fetcher.fetch(TileCoord::new(5, 6, 10)).await.unwrap();
        assert_eq!(tile.origin, TileOrigin::Cached);
        assert_eq!(tile.data, vec![9, 9]);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_downloads_once_then_hits() {
        let mock = MockHttpClient::new(Ok(vec![1, 2, 3]));
        let (fetcher, cache) = mock_fetcher(&mock, 3);
        let coord = TileCoord::new(512, 340, 10);

        let first = fetcher.fetch(coord).await.unwrap();
        assert_eq!(first.origin, TileOrigin::Downloaded);
        assert_eq!(cache.get(&TileKey::from(coord)).await.unwrap(), Some(vec![1, 2, 3]));

        let second = fetcher.fetch(coord).await.unwrap();
        assert_eq!(second.origin, TileOrigin::Cached);
        assert_eq!(mock.call_count(), 1);
        assert!(mock.urls()[0].contains("/10/512/340.pngraw"));
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let mock = MockHttpClient::sequence(vec![Err(http_status(503)), Ok(vec![4])]);
        let (fetcher, _cache) = mock_fetcher(&mock, 3);

        let tile = fetcher.fetch(TileCoord::new(1, 1, 3)).await.unwrap();
        assert_eq!(tile.data, vec![4]);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let mock = MockHttpClient::new(Err(http_status(404)));
        let (fetcher, _cache) = mock_fetcher(&mock, 3);

        let err = fetcher.fetch(TileCoord::new(1, 1, 3)).await.unwrap_err();
        match err {
            StitchError::FetchFailed {
                coord,
                attempts,
                reason,
            } => {
                assert_eq!(coord, TileCoord::new(1, 1, 3));
                assert_eq!(attempts, 1);
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_leaves_cache_untouched() {
        let mock = MockHttpClient::new(Err(http_status(503)));
        let (fetcher, cache) = mock_fetcher(&mock, 3);
        let coord = TileCoord::new(2, 2, 4);

        let err = fetcher.fetch(coord).await.unwrap_err();
        assert!(matches!(err, StitchError::FetchFailed { attempts: 3, .. }));
        assert_eq!(mock.call_count(), 3);
        assert!(!cache.has(&TileKey::from(coord)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_cache_dir_error() {
        let mock = MockHttpClient::new(Ok(vec![1]));
        let provider = MapboxTerrainProvider::new(mock, "pk.test").unwrap();
        let fetcher = TileFetcher::with_config(provider, Arc::new(ReadOnlyCache), fast_config(1));

        let err = fetcher.fetch(TileCoord::new(1, 1, 2)).await.unwrap_err();
        assert!(matches!(err, StitchError::CacheDirError { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_download_once() {
        let mock = MockHttpClient::new(Ok(vec![7])).with_delay(Duration::from_millis(50));
        let (fetcher, _cache) = mock_fetcher(&mock, 1);
        let coord = TileCoord::new(3, 3, 5);

        let (a, b) = tokio::join!(fetcher.fetch(coord), fetcher.fetch(coord));
        let mut origins = vec![a.unwrap().origin, b.unwrap().origin];
        origins.sort_by_key(|o| *o == TileOrigin::Cached);

        assert_eq!(origins, vec![TileOrigin::Downloaded, TileOrigin::Cached]);
        assert_eq!(mock.call_count(), 1);
        assert!(fetcher.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_reports_progress_and_sorts() {
        let provider = CountingProvider::new(Duration::from_millis(1));
        let calls = Arc::clone(&provider.calls);
        let cache = Arc::new(MemoryTileCache::default());
        let fetcher = TileFetcher::with_config(provider, cache.clone(), fast_config(1));
        cache.put(&TileKey::new(0, 0), vec![0]).await.unwrap();

        let mut coords = grid(3, 2, 6);
        coords.reverse();
        coords.push(TileCoord::new(1, 1, 6));

        let mut events = Vec::new();
        let summary = fetcher
            .fetch_all(coords, &CancellationToken::new(), |p| events.push(p))
            .await
            .unwrap();

        assert_eq!(summary.tiles.len(), 6);
        assert_eq!(summary.cached(), 1);
        assert_eq!(summary.downloaded(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let order: Vec<TileCoord> = summary.tiles.iter().map(|t| t.coord).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);

        assert_eq!(events.len(), 6);
        assert_eq!(events.last().map(|e| (e.completed, e.total)), Some((6, 6)));
    }

    #[tokio::test]
    async fn test_fetch_all_respects_concurrency_limit() {
        let provider = CountingProvider::new(Duration::from_millis(20));
        let peak = Arc::clone(&provider.peak);
        let config = FetchConfig {
            max_concurrent: 2,
            ..fast_config(1)
        };
        let fetcher =
            TileFetcher::with_config(provider, Arc::new(MemoryTileCache::default()), config);

        fetcher
            .fetch_all(grid(4, 3, 8), &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_fetch_all_cancelled_before_start() {
        let provider = CountingProvider::new(Duration::ZERO);
        let calls = Arc::clone(&provider.calls);
        let fetcher = TileFetcher::with_config(
            provider,
            Arc::new(MemoryTileCache::default()),
            fast_config(1),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch_all(grid(3, 3, 5), &cancel, |_| {}).await;
        assert!(matches!(result, Err(StitchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_first_error_aborts_batch() {
        let mut provider = CountingProvider::new(Duration::from_millis(5));
        provider.fail_on = Some(TileCoord::new(1, 0, 7));
        let config = FetchConfig {
            max_concurrent: 1,
            ..fast_config(1)
        };
        let fetcher =
            TileFetcher::with_config(provider, Arc::new(MemoryTileCache::default()), config);

        let err = fetcher
            .fetch_all(grid(10, 10, 7), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        match err {
            StitchError::FetchFailed { coord, .. } => assert_eq!(coord, TileCoord::new(1, 0, 7)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.retry.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
