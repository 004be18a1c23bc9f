use crate::core::constants::TILE_CACHE_CAPACITY;
use crate::core::geo::TileCoord;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// LRU cache of raw tile payloads, shared between clones
#[derive(Debug, Clone)]
pub struct TileCache {
    cache: Arc<Mutex<LruCache<TileCoord, Arc<Vec<u8>>>>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(TILE_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(TILE_CACHE_CAPACITY)
    }

    /// Cached payload, marking it as recently used
    pub fn get(&self, coord: &TileCoord) -> Option<Arc<Vec<u8>>> {
        self.cache.lock().ok()?.get(coord).cloned()
    }

    pub fn insert(&self, coord: TileCoord, data: Arc<Vec<u8>>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(coord, data);
        }
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(coord))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_eviction() {
        let cache = TileCache::new(2);
        cache.insert(TileCoord::new(0, 0, 1), Arc::new(vec![1]));
        cache.insert(TileCoord::new(1, 0, 1), Arc::new(vec![2]));

        // Touch the first tile so the second is least recently used
        assert!(cache.get(&TileCoord::new(0, 0, 1)).is_some());
        cache.insert(TileCoord::new(1, 1, 1), Arc::new(vec![3]));

        assert!(cache.contains(&TileCoord::new(0, 0, 1)));
        assert!(!cache.contains(&TileCoord::new(1, 0, 1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = TileCache::new(4);
        let other = cache.clone();
        other.insert(TileCoord::new(0, 0, 0), Arc::new(vec![9]));
        assert_eq!(cache.get(&TileCoord::new(0, 0, 0)).as_deref(), Some(&vec![9]));

        cache.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = TileCache::new(0);
        cache.insert(TileCoord::new(0, 0, 0), Arc::new(vec![1]));
        assert_eq!(cache.len(), 1);
    }
}
