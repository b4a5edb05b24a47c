/// Append-only store mapping composite spec keys to rendered resource
/// handles.
///
/// Lookups are linear scans with exact key equality. There is no per-entry
/// eviction; the key space is bounded in practice by desktops, images and
/// outputs, and the whole cache is dropped on events that invalidate every
/// render at once (topology change, configuration reload).
#[derive(Debug)]
pub struct RenderCache<H> {
    entries: Vec<CacheEntry<H>>,
}

#[derive(Debug)]
struct CacheEntry<H> {
    key: String,
    handle: H,
}

impl<H: Copy> RenderCache<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<H> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.handle)
    }

    /// Append an entry. The caller guarantees the key is not already
    /// present; duplicates would shadow each other on lookup.
    pub fn put(&mut self, key: String, handle: H) -> H {
        self.entries.push(CacheEntry { key, handle });
        handle
    }

    /// Empty the cache, handing every handle back to the caller for
    /// release by whatever allocated it.
    #[must_use]
    pub fn clear(&mut self) -> Vec<H> {
        self.entries.drain(..).map(|entry| entry.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Copy> Default for RenderCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_put() {
        let mut cache: RenderCache<u32> = RenderCache::new();
        assert_eq!(cache.get("a:centered:image"), None);

        cache.put("a:centered:image".to_string(), 7);
        cache.put("b:tiled:image".to_string(), 9);

        assert_eq!(cache.get("a:centered:image"), Some(7));
        assert_eq!(cache.get("b:tiled:image"), Some(9));
        assert_eq!(cache.get("a:tiled:image"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_keys_match_exactly() {
        let mut cache: RenderCache<u32> = RenderCache::new();
        cache.put("a.png:centered:image".to_string(), 1);

        assert_eq!(cache.get("a.png:centered:imag"), None);
        assert_eq!(cache.get("a.png:centered:image;"), None);
    }

    #[test]
    fn test_clear_returns_all_handles() {
        let mut cache: RenderCache<u32> = RenderCache::new();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        let mut handles = cache.clear();
        handles.sort_unstable();
        assert_eq!(handles, vec![1, 2]);
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        // Still usable after a clear.
        cache.put("c".to_string(), 3);
        assert_eq!(cache.get("c"), Some(3));
    }
}
