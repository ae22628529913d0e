//! Rendered-page cache keyed by route.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::{
    events::{Event, Listener, ListenerError},
    util::{
        json_file::LoadError,
        lock::{rw_read, rw_write, swap},
    },
};

use super::policy::CachePolicy;

const SOURCE: &str = "cache::pages";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no cached page for `{path}`")]
pub struct CacheMiss {
    pub path: String,
}

/// Storage for rendered pages.
pub trait PageCache: Send + Sync {
    /// Whether the policy lets `path` be cached.
    fn is_allowed(&self, path: &str) -> bool;

    fn find(&self, path: &str) -> Result<Bytes, CacheMiss>;

    /// Store `page` under `path`. Does not consult the policy.
    fn set(&self, path: &str, page: Bytes);

    /// Drop every entry.
    fn reset(&self);
}

/// Cache used while authoring: nothing is allowed and nothing is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCaching;

impl PageCache for NoCaching {
    fn is_allowed(&self, _path: &str) -> bool {
        false
    }

    fn find(&self, path: &str) -> Result<Bytes, CacheMiss> {
        Err(CacheMiss {
            path: path.to_string(),
        })
    }

    fn set(&self, _path: &str, _page: Bytes) {}

    fn reset(&self) {}
}

/// Cache used when publishing: entries live until the next checkout.
pub struct PermanentCache {
    policy_path: Option<PathBuf>,
    policy: RwLock<Arc<CachePolicy>>,
    entries: RwLock<HashMap<String, Bytes>>,
}

impl PermanentCache {
    /// Load the policy at `policy_path`. Without a path the policy is empty
    /// and nothing is cached.
    pub fn load(policy_path: Option<PathBuf>) -> Result<Self, LoadError> {
        let policy = match policy_path.as_deref() {
            Some(path) => CachePolicy::load(path)?,
            None => CachePolicy::default(),
        };
        Ok(Self::with_policy(policy_path, policy))
    }

    pub fn with_policy(policy_path: Option<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            policy_path,
            policy: RwLock::new(Arc::new(policy.normalized())),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn reload_policy(&self) -> Result<(), LoadError> {
        let Some(path) = self.policy_path.as_deref() else {
            return Ok(());
        };
        let policy = CachePolicy::load(path)?;
        swap(&self.policy, policy, SOURCE, "reload_policy");
        Ok(())
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageCache for PermanentCache {
    fn is_allowed(&self, path: &str) -> bool {
        rw_read(&self.policy, SOURCE, "is_allowed").is_allowed(path)
    }

    fn find(&self, path: &str) -> Result<Bytes, CacheMiss> {
        match rw_read(&self.entries, SOURCE, "find").get(path) {
            Some(page) => {
                counter!("verso_page_cache_hit_total").increment(1);
                Ok(page.clone())
            }
            None => {
                counter!("verso_page_cache_miss_total").increment(1);
                Err(CacheMiss {
                    path: path.to_string(),
                })
            }
        }
    }

    fn set(&self, path: &str, page: Bytes) {
        counter!("verso_page_cache_store_total").increment(1);
        rw_write(&self.entries, SOURCE, "set").insert(path.to_string(), page);
    }

    fn reset(&self) {
        let dropped = {
            let mut entries = rw_write(&self.entries, SOURCE, "reset");
            let dropped = entries.len();
            entries.clear();
            dropped
        };
        counter!("verso_page_cache_reset_total").increment(1);
        info!(
            target = "verso::cache",
            op = "reset",
            dropped,
            "Page cache flushed"
        );
    }
}

impl Listener for PermanentCache {
    fn name(&self) -> &'static str {
        "page_cache"
    }

    // The policy may have changed along with the pages, so reload it before flushing.
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::Checkout { .. } = event {
            self.reload_policy()?;
            self.reset();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use tempfile::TempDir;

    use super::*;

    fn open_policy() -> CachePolicy {
        CachePolicy {
            whitelist: vec!["/".to_string()],
            blacklist: vec!["/admin".to_string()],
        }
    }

    #[test]
    fn stores_and_finds_pages() {
        let cache = PermanentCache::with_policy(None, open_policy());
        assert_eq!(
            cache.find("/index"),
            Err(CacheMiss {
                path: "/index".to_string()
            })
        );

        cache.set("/index", Bytes::from_static(b"<h1>hi</h1>"));
        assert_eq!(
            cache.find("/index").expect("cached"),
            Bytes::from_static(b"<h1>hi</h1>")
        );
    }

    #[test]
    fn set_ignores_policy() {
        let cache = PermanentCache::with_policy(None, open_policy());
        assert!(!cache.is_allowed("/admin/panel"));
        cache.set("/admin/panel", Bytes::from_static(b"x"));
        assert!(cache.find("/admin/panel").is_ok());
    }

    #[test]
    fn checkout_flushes_every_entry() {
        let cache = PermanentCache::with_policy(None, open_policy());
        cache.set("/a", Bytes::from_static(b"a"));
        cache.set("/b", Bytes::from_static(b"b"));

        cache
            .on_event(&Event::Checkout {
                commit: "abc123".to_string(),
            })
            .expect("flush");

        assert!(cache.is_empty());
        assert!(cache.find("/a").is_err());
    }

    #[test]
    fn push_keeps_entries() {
        let cache = PermanentCache::with_policy(None, open_policy());
        cache.set("/a", Bytes::from_static(b"a"));
        cache.on_event(&Event::Push).expect("ignored");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn checkout_reloads_policy_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.json");
        fs::write(&path, br#"{ "Whitelist": ["/"], "Blacklist": [] }"#).expect("write");
        let cache = PermanentCache::load(Some(path.clone())).expect("load");
        assert!(cache.is_allowed("/blog"));

        fs::write(&path, br#"{ "Whitelist": ["/"], "Blacklist": ["/blog"] }"#).expect("write");
        cache
            .on_event(&Event::Checkout {
                commit: "def456".to_string(),
            })
            .expect("reload");
        assert!(!cache.is_allowed("/blog"));
    }

    #[test]
    fn failed_policy_reload_aborts_before_flush() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.json");
        fs::write(&path, br#"{ "Whitelist": ["/"] }"#).expect("write");
        let cache = PermanentCache::load(Some(path.clone())).expect("load");
        cache.set("/a", Bytes::from_static(b"a"));

        fs::write(&path, b"garbage").expect("write");
        assert!(
            cache
                .on_event(&Event::Checkout {
                    commit: "x".to_string()
                })
                .is_err()
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn no_caching_never_stores() {
        let cache = NoCaching;
        assert!(!cache.is_allowed("/index"));
        cache.set("/index", Bytes::from_static(b"x"));
        assert!(cache.find("/index").is_err());
    }

    #[test]
    fn hits_and_misses_are_counted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let cache = PermanentCache::with_policy(None, open_policy());
            let _ = cache.find("/index");
            cache.set("/index", Bytes::from_static(b"x"));
            let _ = cache.find("/index");
            let _ = cache.find("/index");
        });

        let counters: HashMap<String, u64> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => Some((key.key().name().to_string(), count)),
                _ => None,
            })
            .collect();

        assert_eq!(counters.get("verso_page_cache_hit_total"), Some(&2));
        assert_eq!(counters.get("verso_page_cache_miss_total"), Some(&1));
        assert_eq!(counters.get("verso_page_cache_store_total"), Some(&1));
    }
}
