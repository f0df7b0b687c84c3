//! Asset loader with a process-wide, coalescing model cache
//!
//! Each locator maps to one cache slot. The first request for a locator
//! starts a fetch and parks a shared future in the slot; every concurrent
//! request awaits that same future, so a locator is fetched at most once at a
//! time. A successful fetch promotes the slot to a ready template. A failed
//! fetch empties the slot again so the next request retries.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::asset::{parse_gltf, ModelAsset};
use crate::error::AssetLoadError;

/// Transport that turns a locator into raw bytes
pub trait AssetSource: Send + Sync {
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetLoadError>>;
}

/// Reads locators as local file paths
#[derive(Debug, Clone, Default)]
pub struct FileSource;

impl AssetSource for FileSource {
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetLoadError>> {
        async move {
            tokio::fs::read(locator).await.map_err(|e| AssetLoadError::Io {
                locator: locator.to_string(),
                reason: e.to_string(),
            })
        }
        .boxed()
    }
}

/// Fetches locators over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl AssetSource for HttpSource {
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetLoadError>> {
        async move {
            let fetch_error = |reason: String| AssetLoadError::Fetch {
                locator: locator.to_string(),
                reason,
            };

            let response = self
                .client
                .get(locator)
                .send()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;

            if !response.status().is_success() {
                return Err(fetch_error(format!("HTTP {}", response.status())));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;
            Ok(bytes.to_vec())
        }
        .boxed()
    }
}

/// Dispatches `http://` and `https://` locators to HTTP, everything else to
/// the filesystem
#[derive(Debug, Clone)]
pub struct LocatorSource {
    file: FileSource,
    http: HttpSource,
}

impl LocatorSource {
    pub fn new(http_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            file: FileSource,
            http: HttpSource::new(http_timeout)?,
        })
    }
}

/// Whether a locator names an HTTP(S) resource rather than a file
pub fn is_remote_locator(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

impl AssetSource for LocatorSource {
    fn fetch<'a>(&'a self, locator: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AssetLoadError>> {
        if is_remote_locator(locator) {
            self.http.fetch(locator)
        } else {
            self.file.fetch(locator)
        }
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<ModelAsset>, AssetLoadError>>>;

enum CacheSlot {
    Ready(Arc<ModelAsset>),
    Pending { id: u64, load: SharedLoad },
}

/// Coalescing model cache. Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    slots: Arc<Mutex<HashMap<String, CacheSlot>>>,
    next_id: Arc<AtomicU64>,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Load a model, returning an independently owned copy of the cached
    /// template
    pub async fn load(&self, locator: &str) -> Result<ModelAsset, AssetLoadError> {
        let template = self.load_shared(locator).await?;
        Ok(ModelAsset::clone(&template))
    }

    /// Load a model, returning the shared cached template
    pub async fn load_shared(&self, locator: &str) -> Result<Arc<ModelAsset>, AssetLoadError> {
        let pending = {
            let mut slots = self.lock();
            match slots.get(locator) {
                Some(CacheSlot::Ready(asset)) => {
                    debug!(locator = %locator, "Model cache hit");
                    return Ok(Arc::clone(asset));
                }
                Some(CacheSlot::Pending { load, .. }) => {
                    debug!(locator = %locator, "Joining in-flight model fetch");
                    load.clone()
                }
                None => {
                    let (id, load) = self.start_fetch(locator);
                    slots.insert(
                        locator.to_string(),
                        CacheSlot::Pending {
                            id,
                            load: load.clone(),
                        },
                    );
                    load
                }
            }
        };
        pending.await
    }

    /// Warm the cache in the background. Returns false when no Tokio runtime
    /// is available to run the fetch.
    pub fn preload(&self, locator: &str) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(locator = %locator, "No async runtime, skipping preload");
                return false;
            }
        };

        let loader = self.clone();
        let locator = locator.to_string();
        handle.spawn(async move {
            if let Err(e) = loader.load_shared(&locator).await {
                warn!(locator = %locator, error = %e, "Preload failed");
            }
        });
        true
    }

    /// Drop a cached or in-flight entry. Waiters on an in-flight fetch still
    /// receive its result, but it is not cached.
    pub fn evict(&self, locator: &str) -> bool {
        let removed = self.lock().remove(locator).is_some();
        if removed {
            info!(locator = %locator, "Evicted model from cache");
        }
        removed
    }

    /// True once a template for `locator` is fully loaded
    pub fn is_cached(&self, locator: &str) -> bool {
        matches!(self.lock().get(locator), Some(CacheSlot::Ready(_)))
    }

    /// Number of fully loaded templates
    pub fn cached_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, CacheSlot::Ready(_)))
            .count()
    }

    fn start_fetch(&self, locator: &str) -> (u64, SharedLoad) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let source = Arc::clone(&self.source);
        let slots = Arc::clone(&self.slots);
        let locator = locator.to_string();

        let load = async move {
            info!(locator = %locator, "Fetching model asset");
            let result = match source.fetch(&locator).await {
                Ok(bytes) => parse_gltf(&locator, &bytes).map(Arc::new),
                Err(e) => Err(e),
            };

            let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
            let still_pending = matches!(
                slots.get(&locator),
                Some(CacheSlot::Pending { id: pending, .. }) if *pending == id
            );
            if still_pending {
                match &result {
                    Ok(asset) => {
                        info!(
                            locator = %locator,
                            meshes = asset.meshes.len(),
                            bytes = asset.byte_size,
                            "Model cached"
                        );
                        slots.insert(locator.clone(), CacheSlot::Ready(Arc::clone(asset)));
                    }
                    Err(e) => {
                        warn!(locator = %locator, error = %e, "Model fetch failed");
                        slots.remove(&locator);
                    }
                }
            } else {
                debug!(locator = %locator, "Fetch finished for an evicted slot");
            }
            result
        }
        .boxed()
        .shared();

        (id, load)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("cached", &self.cached_count())
            .finish()
    }
}
