use std::sync::Arc;

use dashmap::DashMap;

use super::ShellResponse;

/// One named cache: request URL to stored response.
#[derive(Default)]
pub struct Cache {
    entries: DashMap<String, ShellResponse>,
}

impl Cache {
    pub fn put(&self, url: &str, response: ShellResponse) {
        self.entries.insert(url.to_string(), response);
    }

    pub fn get(&self, url: &str) -> Option<ShellResponse> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All named caches. Nothing is ever evicted; a cache disappears only
/// when deleted by name.
#[derive(Default)]
pub struct CacheStorage {
    caches: DashMap<String, Arc<Cache>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named cache, creating it if needed.
    pub fn open(&self, name: &str) -> Arc<Cache> {
        self.caches.entry(name.to_string()).or_default().clone()
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.caches.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn delete(&self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Looks `url` up across every cache.
    pub fn match_url(&self, url: &str) -> Option<ShellResponse> {
        self.caches.iter().find_map(|entry| entry.value().get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn matches_across_caches_until_deleted() {
        let storage = CacheStorage::new();
        storage
            .open("old-shell")
            .put("/logo.svg", ShellResponse::new(StatusCode::OK, "<svg/>"));
        storage.open("savepixie-shell-v1");

        assert_eq!(storage.keys(), vec!["old-shell", "savepixie-shell-v1"]);
        assert_eq!(storage.match_url("/logo.svg").unwrap().body, "<svg/>");

        assert!(storage.delete("old-shell"));
        assert!(!storage.delete("old-shell"));
        assert!(storage.match_url("/logo.svg").is_none());
        assert!(storage.open("savepixie-shell-v1").is_empty());
    }
}
