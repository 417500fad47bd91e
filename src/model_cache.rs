//! Process-wide cache of loaded models
//!
//! Each model is loaded lazily, at most once per key, and never mutated after
//! load. Concurrent first requests for the same key serialize on that key's
//! slot so only one of them performs the load. Failed loads are not cached and
//! are retried by the next request.
//!
//! Handles given out are `Arc`s: [`ModelCache::release`] and [`ModelCache::clear`]
//! drop the cache's reference, and the model memory is freed once in-flight
//! invocations holding a handle finish.

use crate::{
    error::BackendError,
    inference::{LoadedModel, ModelRuntime},
    models::ModelProfile,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

type Slot = Arc<Mutex<Option<Arc<dyn LoadedModel>>>>;

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCacheStats {
    /// Number of currently loaded models
    pub loaded_models: usize,
    /// Requests served from an already loaded model
    pub hits: u64,
    /// Requests that triggered a load attempt
    pub misses: u64,
}

/// Read-only model handle cache
#[derive(Default)]
pub struct ModelCache {
    slots: Mutex<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ModelCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every pipeline in this process
    pub fn global() -> Arc<ModelCache> {
        static GLOBAL: OnceLock<Arc<ModelCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ModelCache::new())))
    }

    /// Cache key for a runtime + asset path pair
    #[must_use]
    pub fn key(runtime: &dyn ModelRuntime, path: &Path) -> String {
        format!("{}:{}", runtime.name(), path.display())
    }

    /// Return the cached model or load it through `runtime`
    ///
    /// # Errors
    /// Whatever `runtime.load_model` reports; the failure is not cached.
    pub fn get_or_load(
        &self,
        runtime: &dyn ModelRuntime,
        profile: &ModelProfile,
        path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError> {
        let key = Self::key(runtime, path);
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| BackendError::model_unavailable("model cache lock poisoned"))?;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut guard = slot
            .lock()
            .map_err(|_| BackendError::model_unavailable("model slot lock poisoned"))?;
        if let Some(model) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(model));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Loading model into cache");
        let model = match runtime.load_model(profile, path) {
            Ok(model) => model,
            Err(err) => {
                drop(guard);
                self.forget_empty(&key, &slot);
                return Err(err);
            },
        };
        *guard = Some(Arc::clone(&model));
        info!(key = %key, "Model cached");
        Ok(model)
    }

    /// Remove `slot` from the map if it is still the entry for `key` and holds nothing
    fn forget_empty(&self, key: &str, slot: &Slot) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let idle = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
            && slot.try_lock().is_ok_and(|loaded| loaded.is_none());
        if idle {
            slots.remove(key);
        }
    }

    /// Drop the cached model for `key`; returns whether one was loaded
    pub fn release(&self, key: &str) -> bool {
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        slots
            .remove(key)
            .is_some_and(|slot| slot.lock().map(|s| s.is_some()).unwrap_or(false))
    }

    /// Drop every cached model
    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            let count = slots.len();
            slots.clear();
            debug!(count, "Model cache cleared");
        }
    }

    #[must_use]
    pub fn stats(&self) -> ModelCacheStats {
        let loaded_models = self.slots.lock().map_or(0, |slots| {
            slots
                .values()
                .filter(|slot| slot.lock().map(|s| s.is_some()).unwrap_or(false))
                .count()
        });
        ModelCacheStats {
            loaded_models,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
