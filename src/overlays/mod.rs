//! Overlays: data-backed layers that attach themselves to a map
//!
//! An overlay fetches its asset once per mount, builds a layer from it and
//! attaches that layer to the map it was mounted on. Failures are logged and
//! leave the overlay in [`LoadState::Loading`]; no error reaches the caller.
//!
//! Lock order is overlay state first, then the map. The background task
//! holds the state lock across its cancellation check and the attach, and
//! `unmount` holds it across cancel and detach, so a stale result is never
//! attached after teardown.

pub mod points;
pub mod raster;
#[cfg(feature = "vector-tiles")]
pub mod vector;

pub use points::PointFeatureOverlay;
pub use raster::RasterOverlay;
#[cfg(feature = "vector-tiles")]
pub use vector::VectorOverlay;

use crate::core::map::{MapHandle, WeakMapHandle};
use crate::data::fetch::AssetFetcher;
use crate::layers::base::LayerTrait;
use crate::runtime::{self, TaskHandle};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

/// A layer source that can be attached to and detached from a map
pub trait Overlay: Send {
    /// Id of the layer this overlay attaches
    fn layer_id(&self) -> &str;

    fn state(&self) -> LoadState;

    /// Starts loading and attaches the layer to `map` once ready. Mounting an
    /// already mounted overlay unmounts it first.
    fn mount(&mut self, map: &MapHandle);

    /// Cancels pending work, detaches the layer and returns to `Unloaded`
    fn unmount(&mut self);

    fn is_attached(&self) -> bool;
}

/// Builds the overlay's data and layer from the fetched bytes
pub(crate) type BuildFn<T> =
    Box<dyn FnOnce(&[u8]) -> Result<(Arc<T>, Box<dyn LayerTrait>)> + Send + 'static>;

struct Slot<T> {
    state: LoadState,
    attached: bool,
    map: WeakMapHandle,
    token: CancellationToken,
    data: Option<Arc<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: LoadState::Unloaded,
            attached: false,
            map: WeakMapHandle::default(),
            token: CancellationToken::new(),
            data: None,
        }
    }
}

/// Fetch-once-then-attach machinery shared by the asset-backed overlays
pub(crate) struct OverlayCore<T> {
    layer_id: String,
    path: String,
    fetcher: Arc<dyn AssetFetcher>,
    slot: Arc<Mutex<Slot<T>>>,
    task: Option<TaskHandle>,
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    // A poisoned slot only means a builder panicked; the state is still usable
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + Sync + 'static> OverlayCore<T> {
    pub(crate) fn new(layer_id: String, path: String, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            layer_id,
            path,
            fetcher,
            slot: Arc::new(Mutex::new(Slot::default())),
            task: None,
        }
    }

    pub(crate) fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn state(&self) -> LoadState {
        lock(&self.slot).state
    }

    pub(crate) fn is_attached(&self) -> bool {
        lock(&self.slot).attached
    }

    pub(crate) fn data(&self) -> Option<Arc<T>> {
        lock(&self.slot).data.clone()
    }

    /// True while the background fetch has not settled
    pub(crate) fn is_fetching(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub(crate) fn mount(&mut self, map: &MapHandle, build: BuildFn<T>) {
        self.unmount();

        let token = CancellationToken::new();
        {
            let mut slot = lock(&self.slot);
            slot.state = LoadState::Loading;
            slot.map = map.downgrade();
            slot.token = token.clone();
        }
        log::debug!(
            "overlay {} loading {} via {}",
            self.layer_id,
            self.path,
            self.fetcher.describe()
        );

        let layer_id = self.layer_id.clone();
        let path = self.path.clone();
        let fetcher = self.fetcher.clone();
        let slot = self.slot.clone();

        self.task = Some(runtime::spawn(async move {
            let fetched = tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("overlay {}: fetch of {} cancelled", layer_id, path);
                    return;
                }
                fetched = fetcher.fetch(&path) => fetched,
            };

            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("overlay {}: could not load {}: {}", layer_id, path, err);
                    return;
                }
            };

            // Decoding a large raster is CPU bound
            let Some(built) = runtime::run_blocking(move || build(&bytes)).await else {
                return;
            };
            let (data, layer) = match built {
                Ok(built) => built,
                Err(err) => {
                    log::warn!("overlay {}: could not load {}: {}", layer_id, path, err);
                    return;
                }
            };

            let mut guard = lock(&slot);
            if token.is_cancelled() {
                log::debug!("overlay {}: discarding stale result", layer_id);
                return;
            }
            let Some(map) = guard.map.upgrade() else {
                log::debug!("overlay {}: map dropped before load finished", layer_id);
                return;
            };
            let attached = map.write().and_then(|mut map| map.add_layer(layer));
            match attached {
                Ok(_) => {
                    guard.attached = true;
                    guard.data = Some(data);
                    guard.state = LoadState::Ready;
                    log::info!("overlay {} ready", layer_id);
                }
                Err(err) => log::warn!("overlay {}: could not attach layer: {}", layer_id, err),
            }
        }));
    }

    pub(crate) fn unmount(&mut self) {
        let mut slot = lock(&self.slot);
        slot.token.cancel();

        if slot.attached {
            match slot.map.upgrade() {
                Some(map) => {
                    if let Err(err) = map
                        .write()
                        .and_then(|mut map| map.remove_layer(&self.layer_id))
                    {
                        log::warn!("overlay {}: detach failed: {}", self.layer_id, err);
                    }
                }
                None => log::trace!("overlay {}: map already gone", self.layer_id),
            }
        }

        *slot = Slot::default();
        self.task = None;
    }
}

impl<T> Drop for OverlayCore<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.token.cancel();
        if slot.attached {
            if let Some(map) = slot.map.upgrade() {
                let detached = map
                    .write()
                    .and_then(|mut map| map.remove_layer(&self.layer_id));
                if let Err(err) = detached {
                    log::debug!("overlay {}: detach on drop failed: {}", self.layer_id, err);
                }
            }
        }
        slot.attached = false;
    }
}
