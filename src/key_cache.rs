//! KAS public key cache
//!
//! Granter construction emits every public key it sees on a grant to a
//! [`KeyCache`] sink so that later key wrapping does not have to fetch them
//! again. The granter only ever calls [`KeyCache::store`]; reading back is the
//! business of whoever owns the cache.

use crate::policy::{KeyAccessServer, SimpleKasKey};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Default freshness window for cached keys
pub const DEFAULT_KEY_TTL_SECS: i64 = 5 * 60;

/// A public key published by a KAS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KasInfo {
    pub url: String,
    pub kid: String,
    /// Key type, e.g. `rsa:2048`; empty when unknown
    pub algorithm: String,
    #[serde(rename = "publicKey")]
    pub pem: String,
}

/// Sink for KAS public keys discovered during grant ingestion.
///
/// Implementations must tolerate concurrent callers.
pub trait KeyCache: Send + Sync {
    fn store(&self, info: KasInfo);
}

impl<T: KeyCache + ?Sized> KeyCache for &T {
    fn store(&self, info: KasInfo) {
        (**self).store(info)
    }
}

impl<T: KeyCache + ?Sized> KeyCache for Arc<T> {
    fn store(&self, info: KasInfo) {
        (**self).store(info)
    }
}

#[derive(Debug, Clone)]
struct TimestampedKey {
    info: KasInfo,
    stored_at: DateTime<Utc>,
}

/// In-memory [`KeyCache`] keyed by `(url, kid)`.
///
/// A key is stored at most once while it is fresh; later stores of the same
/// `(url, kid)` are ignored until the entry ages past the TTL.
#[derive(Debug)]
pub struct KasKeyCache {
    entries: RwLock<HashMap<(String, String), TimestampedKey>>,
    ttl: Duration,
}

impl KasKeyCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_KEY_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a fresh key.
    ///
    /// With an empty `kid`, any fresh key of `url` whose algorithm matches is
    /// returned. An empty `algorithm` matches every algorithm. Expired keys of
    /// `url` are evicted.
    pub fn get(&self, url: &str, algorithm: &str, kid: &str) -> Option<KasInfo> {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(u, _), entry| u != url || self.is_fresh(entry, now));

        let matches =
            |entry: &&TimestampedKey| algorithm.is_empty() || entry.info.algorithm == algorithm;

        if kid.is_empty() {
            let mut candidates: Vec<_> = entries
                .iter()
                .filter(|((u, _), _)| u == url)
                .map(|(_, entry)| entry)
                .filter(matches)
                .collect();
            // prefer the most recently stored key, then the smallest kid
            candidates.sort_by(|a, b| {
                b.stored_at
                    .cmp(&a.stored_at)
                    .then_with(|| a.info.kid.cmp(&b.info.kid))
            });
            candidates.first().map(|entry| entry.info.clone())
        } else {
            entries
                .get(&(url.to_string(), kid.to_string()))
                .filter(matches)
                .map(|entry| entry.info.clone())
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_fresh(&self, entry: &TimestampedKey, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }
}

impl Default for KasKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCache for KasKeyCache {
    fn store(&self, info: KasInfo) {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let key = (info.url.clone(), info.kid.clone());
        if let Some(existing) = entries.get(&key) {
            if self.is_fresh(existing, now) {
                return;
            }
        }
        debug!(kas = %info.url, kid = %info.kid, alg = %info.algorithm, "cached KAS public key");
        entries.insert(
            key,
            TimestampedKey {
                info,
                stored_at: now,
            },
        );
    }
}

/// Emit every public key attached to `grants` to `cache`.
pub(crate) fn store_grant_keys(grants: &[KeyAccessServer], cache: &dyn KeyCache) {
    for kas in grants {
        let cached = kas.cached_keys();
        if cached.is_empty() && kas.kas_keys.is_empty() {
            debug!(kas = %kas.uri, "no cached key in policy service");
            continue;
        }
        for key in cached {
            if key.pem.is_empty() {
                debug!(kas = %kas.uri, kid = %key.kid, "skipping cached key without PEM");
                continue;
            }
            cache.store(KasInfo {
                url: kas.uri.clone(),
                kid: key.kid.clone(),
                algorithm: key.alg.key_type().to_string(),
                pem: key.pem.clone(),
            });
        }
        for key in &kas.kas_keys {
            store_simple_key(kas, key, cache);
        }
    }
}

fn store_simple_key(kas: &KeyAccessServer, key: &SimpleKasKey, cache: &dyn KeyCache) {
    let Some(public_key) = key.public_key.as_ref().filter(|pk| !pk.pem.is_empty()) else {
        debug!(kas = %kas.uri, "skipping KAS key without PEM");
        return;
    };
    let url = if key.kas_uri.is_empty() {
        kas.uri.clone()
    } else {
        key.kas_uri.clone()
    };
    cache.store(KasInfo {
        url,
        kid: public_key.kid.clone(),
        algorithm: public_key.algorithm.key_type().to_string(),
        pem: public_key.pem.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::KeyAlgorithm;

    fn info(url: &str, kid: &str, alg: &str, pem: &str) -> KasInfo {
        KasInfo {
            url: url.to_string(),
            kid: kid.to_string(),
            algorithm: alg.to_string(),
            pem: pem.to_string(),
        }
    }

    #[test]
    fn test_store_at_most_once() {
        let cache = KasKeyCache::new();
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "first"));
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "second"));
        assert_eq!(cache.len(), 1);

        let found = cache.get("https://kas.us/", "rsa:2048", "r1").unwrap();
        assert_eq!(found.pem, "first");
    }

    #[test]
    fn test_get_without_kid() {
        let cache = KasKeyCache::new();
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "rsa"));
        cache.store(info("https://kas.us/", "e1", "ec:secp256r1", "ec"));

        assert_eq!(cache.get("https://kas.us/", "ec:secp256r1", "").unwrap().kid, "e1");
        assert!(cache.get("https://kas.us/", "rsa:4096", "").is_none());
        assert!(cache.get("https://kas.ca/", "", "").is_none());
        assert!(cache.get("https://kas.us/", "", "").is_some());
    }

    #[test]
    fn test_expired_entries() {
        let cache = KasKeyCache::with_ttl(Duration::zero());
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "first"));
        cache.store(info("https://kas.ca/", "r1", "rsa:2048", "first"));
        assert_eq!(cache.len(), 2);

        // lookups evict stale keys of the url they ask about
        assert!(cache.get("https://kas.us/", "", "r1").is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("https://kas.ca/", "", "").is_none());
        assert!(cache.is_empty());

        // stale entries are replaced
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "second"));
        cache.store(info("https://kas.us/", "r1", "rsa:2048", "third"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_grant_keys() {
        let cache = KasKeyCache::new();
        let grants = vec![
            KeyAccessServer::new("https://kas.us/")
                .with_cached_key("r1", KeyAlgorithm::Rsa2048, "pem-r1")
                .with_cached_key("nopem", KeyAlgorithm::Rsa2048, ""),
            KeyAccessServer::new("https://kas.ca/"),
            KeyAccessServer::new("https://hcs.kas.us/").with_kas_key(
                "r2",
                KeyAlgorithm::Rsa4096,
                "pem-r2",
            ),
        ];
        store_grant_keys(&grants, &cache);

        assert_eq!(cache.len(), 2);
        let hcs = cache.get("https://hcs.kas.us/", "", "r2").unwrap();
        assert_eq!(hcs.algorithm, "rsa:4096");
        assert!(cache.get("https://kas.us/", "", "nopem").is_none());
    }

    #[test]
    fn test_concurrent_store() {
        let cache = Arc::new(KasKeyCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..16 {
                        cache.store(info("https://kas.us/", &format!("k{}", (i + j) % 4), "", "p"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
    }
}
