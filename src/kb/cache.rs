use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::{KbService, KbType};
use crate::Result;

/// Batch-scoped LRU memo of KB type, frequency and label lookups
///
/// One cache is created per annotation run and handed to the annotators
/// that need repeated lookups of the same items (validity filter, answer
/// types, answer labels). Thread-safe so a caller may share it between
/// conversations processed concurrently.
pub struct KbCache {
    types: Mutex<LruCache<String, Vec<KbType>>>,
    frequencies: Mutex<LruCache<String, (u64, u64)>>,
    labels: Mutex<LruCache<String, String>>,
}

impl KbCache {
    /// Create a new cache holding up to `capacity` entries per lookup kind
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            types: Mutex::new(LruCache::new(cap)),
            frequencies: Mutex::new(LruCache::new(cap)),
            labels: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Types of `item_id`, fetched from `kb` on a miss
    pub async fn types<K: KbService>(&self, kb: &K, item_id: &str) -> Result<Vec<KbType>> {
        let cached = self.types.lock().unwrap().get(item_id).cloned();
        if let Some(types) = cached {
            return Ok(types);
        }
        let types = kb.types(item_id).await?;
        self.types
            .lock()
            .unwrap()
            .put(item_id.to_string(), types.clone());
        Ok(types)
    }

    /// Summed frequency signals of `item_id`, fetched from `kb` on a miss
    pub async fn frequency<K: KbService>(&self, kb: &K, item_id: &str) -> Result<u64> {
        let cached = self.frequencies.lock().unwrap().get(item_id).copied();
        let (freq1, freq2) = match cached {
            Some(freq) => freq,
            None => {
                let freq = kb.frequency(item_id).await?;
                self.frequencies
                    .lock()
                    .unwrap()
                    .put(item_id.to_string(), freq);
                freq
            }
        };
        Ok(freq1 + freq2)
    }

    /// Label of `item_id`, fetched from `kb` on a miss
    pub async fn label<K: KbService>(&self, kb: &K, item_id: &str) -> Result<String> {
        let cached = self.labels.lock().unwrap().get(item_id).cloned();
        if let Some(label) = cached {
            return Ok(label);
        }
        let label = kb.label(item_id).await?;
        self.labels
            .lock()
            .unwrap()
            .put(item_id.to_string(), label.clone());
        Ok(label)
    }

    /// Total number of cached entries
    pub fn len(&self) -> usize {
        self.types.lock().unwrap().len()
            + self.frequencies.lock().unwrap().len()
            + self.labels.lock().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.types.lock().unwrap().clear();
        self.frequencies.lock().unwrap().clear();
        self.labels.lock().unwrap().clear();
    }
}
