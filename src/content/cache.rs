use moka::future::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

use super::ContentEntry;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: u64 = 1000;

/// Directory listings keyed by the requested relative path.
///
/// Entries only leave the cache by TTL expiry or by an explicit
/// [`invalidate_all`](Self::invalidate_all).
#[derive(Clone)]
pub struct ListingCache {
    listings: MokaCache<String, Arc<Vec<ContentEntry>>>,
}

impl ListingCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            listings: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<ContentEntry>>> {
        self.listings.get(key).await
    }

    pub async fn insert(&self, key: String, entries: Arc<Vec<ContentEntry>>) {
        self.listings.insert(key, entries).await;
    }

    pub async fn invalidate_all(&self) {
        self.listings.invalidate_all();
        self.listings.run_pending_tasks().await;
    }

    /// Number of live entries after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.listings.run_pending_tasks().await;
        self.listings.entry_count()
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ContentEntry {
        ContentEntry {
            name: name.to_string(),
            is_file: true,
            size: Some(1),
            path: name.to_string(),
            enter: format!("http://localhost/stream?path={}", name),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ListingCache::default();
        assert!(cache.get("album").await.is_none());

        cache
            .insert("album".to_string(), Arc::new(vec![entry("a.mp3")]))
            .await;

        let hit = cache.get("album").await.expect("cached listing");
        assert_eq!(hit[0].name, "a.mp3");
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = ListingCache::new(Duration::from_millis(100), 10);
        cache
            .insert("album".to_string(), Arc::new(vec![entry("a.mp3")]))
            .await;
        assert!(cache.get("album").await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get("album").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = ListingCache::default();
        let handle = cache.clone();
        handle
            .insert("album".to_string(), Arc::new(vec![entry("a.mp3")]))
            .await;

        assert!(cache.get("album").await.is_some());
        cache.invalidate_all().await;
        assert!(handle.get("album").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = ListingCache::default();
        cache.insert("a".to_string(), Arc::new(Vec::new())).await;
        cache.insert("b".to_string(), Arc::new(Vec::new())).await;

        cache.invalidate_all().await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.entry_count().await, 0);
    }
}
