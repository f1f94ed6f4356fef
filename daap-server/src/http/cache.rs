//! A content-addressed cache fronting the object-response endpoints.
//! Not a correctness mechanism — `daap-core` never invalidates it;
//! letting the revision number naturally appear in the query string is
//! what makes a stale entry unreachable once the client moves on.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use bytes::Bytes;
use daap_core::config::CacheConfig;

#[derive(Clone)]
pub struct ResponseCache {
    inner: Option<moka::future::Cache<u64, Bytes>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = config.enabled.then(|| {
            moka::future::Cache::builder()
                .time_to_live(Duration::from_secs(config.ttl_seconds))
                .build()
        });
        Self { inner }
    }

    /// `hash(endpoint, path, sorted query args excluding session-id)`.
    /// Not cryptographic — this is a cache key, not a security boundary.
    pub fn key(endpoint: &str, path: &str, query: &str) -> u64 {
        let mut args: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.starts_with("session-id="))
            .collect();
        args.sort_unstable();

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        endpoint.hash(&mut hasher);
        path.hash(&mut hasher);
        for arg in args {
            arg.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub async fn get(&self, key: u64) -> Option<Bytes> {
        match &self.inner {
            Some(cache) => cache.get(&key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: u64, value: Bytes) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_does_not_affect_the_cache_key() {
        let with_a = ResponseCache::key("databases", "/databases", "session-id=1&revision-number=2");
        let with_b = ResponseCache::key("databases", "/databases", "session-id=2&revision-number=2");
        assert_eq!(with_a, with_b);
    }

    #[test]
    fn argument_order_does_not_affect_the_cache_key() {
        let a = ResponseCache::key("items", "/databases/1/items", "revision-number=2&delta=1");
        let b = ResponseCache::key("items", "/databases/1/items", "delta=1&revision-number=2");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn disabled_cache_never_stores_anything() {
        let cache = ResponseCache::new(&CacheConfig {
            enabled: false,
            ttl_seconds: 60,
        });
        let key = ResponseCache::key("server-info", "/server-info", "");
        cache.insert(key, Bytes::from_static(b"data")).await;
        assert!(cache.get(key).await.is_none());
    }
}
