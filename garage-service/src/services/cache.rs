//! Snapshot-paginator: whole result sets are fetched once, cached per
//! namespace and sliced into pages in memory.

use dashmap::DashMap;
use serde::Serialize;
use service_core::error::AppError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::services::metrics::CACHE_LOOKUPS_TOTAL;

/// One page served from a cached snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub has_more: bool,
    pub page: usize,
    pub page_size: usize,
}

/// Slice `items` into the 1-based `page` of `page_size` entries.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = page.saturating_mul(page_size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        total_count: items.len(),
        has_more: page.saturating_mul(page_size) < items.len(),
        page,
        page_size,
    }
}

/// Page size bounds applied to caller-supplied sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PageLimits {
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        let size = match requested {
            Some(0) | None => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        };
        size.max(1)
    }
}

/// Full-snapshot cache for one entity namespace. Any mutation of the entity
/// must call `invalidate`, which drops every key at once.
pub struct SnapshotCache<T> {
    namespace: &'static str,
    entries: DashMap<String, Arc<Vec<T>>>,
    generation: AtomicU64,
}

impl<T: Send + Sync> SnapshotCache<T> {
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Return the cached snapshot for `key`, fetching it on a miss.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<Vec<T>>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, AppError>>,
    {
        if let Some(hit) = self.entries.get(key).map(|entry| Arc::clone(entry.value())) {
            CACHE_LOOKUPS_TOTAL
                .with_label_values(&[self.namespace, "hit"])
                .inc();
            return Ok(hit);
        }

        CACHE_LOOKUPS_TOTAL
            .with_label_values(&[self.namespace, "miss"])
            .inc();
        let generation = self.generation.load(Ordering::Acquire);
        let snapshot = Arc::new(fetch().await?);

        // A mutation that landed while fetching makes this snapshot stale.
        if self.generation.load(Ordering::Acquire) == generation {
            self.entries.insert(key.to_string(), Arc::clone(&snapshot));
        }
        debug!(namespace = self.namespace, key = %key, count = snapshot.len(), "Snapshot fetched");
        Ok(snapshot)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
        debug!(namespace = self.namespace, "Snapshot cache invalidated");
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_slice_the_snapshot() {
        let items: Vec<u32> = (1..=45).collect();

        let first = paginate(&items, 1, 20);
        assert_eq!(first.items, (1..=20).collect::<Vec<_>>());
        assert_eq!(first.total_count, 45);
        assert!(first.has_more);

        let last = paginate(&items, 3, 20);
        assert_eq!(last.items, (41..=45).collect::<Vec<_>>());
        assert!(!last.has_more);

        let beyond = paginate(&items, 9, 20);
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
    }

    #[test]
    fn page_zero_is_first_page() {
        let items = vec!["a", "b", "c"];
        assert_eq!(paginate(&items, 0, 2).items, vec!["a", "b"]);
    }

    #[test]
    fn zero_page_size_still_makes_progress() {
        let items = vec!["a", "b"];
        let page = paginate(&items, 1, 0);
        assert_eq!(page.items, vec!["a"]);
        assert_eq!(page.page_size, 1);
        assert!(page.has_more);
        assert!(!paginate(&items, 2, 0).has_more);
    }

    #[test]
    fn page_sizes_are_clamped() {
        let limits = PageLimits::default();
        assert_eq!(limits.resolve(None), 20);
        assert_eq!(limits.resolve(Some(0)), 20);
        assert_eq!(limits.resolve(Some(500)), 100);
        assert_eq!(limits.resolve(Some(5)), 5);
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit_until_invalidated() {
        let cache: SnapshotCache<u32> = SnapshotCache::new("test");
        let mut fetches = 0;

        for _ in 0..2 {
            cache
                .get_or_fetch("all", || {
                    fetches += 1;
                    async { Ok(vec![1, 2, 3]) }
                })
                .await
                .unwrap();
        }
        assert_eq!(fetches, 1);

        cache.invalidate();
        assert!(!cache.is_cached("all"));
        cache
            .get_or_fetch("all", || {
                fetches += 1;
                async { Ok(vec![1, 2, 3, 4]) }
            })
            .await
            .unwrap();
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache: SnapshotCache<u32> = SnapshotCache::new("test");
        let result = cache
            .get_or_fetch("all", || async {
                Err(AppError::DatabaseError(anyhow::anyhow!("offline")))
            })
            .await;
        assert!(result.is_err());
        assert!(!cache.is_cached("all"));
    }
}
