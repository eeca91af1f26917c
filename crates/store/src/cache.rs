//! Keyed cache with TTL and expiry-on-access refresh — the backing-store
//! interface the Session Store (C1) depends on (spec.md §6).
//!
//! Ships with an in-process implementation suitable for single-process
//! deployment and tests, matching the `gateway` crate's own convention of
//! plain in-memory collections with no external database required to
//! run.

use async_trait::async_trait;
use archon_domain::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[async_trait]
pub trait KeyedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory [`KeyedCache`]. `get` extends `expires_at` to `now + ttl` as a
/// side effect (the same shape as a `redis.expire` call on every read),
/// matching the at-least-as-strong TTL-refresh-on-read guarantee spec.md
/// §4.1 requires.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    default_ttl: Duration,
    /// Simulated unreachability, for exercising C1's "surface as a
    /// kind-typed error" failure semantics in tests.
    unreachable: std::sync::atomic::AtomicBool,
}

impl InMemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            unreachable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Toggle simulated unreachability (test/fault-injection hook only).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable
            .store(unreachable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Transient("cache backend unreachable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600))
    }
}

#[async_trait]
impl KeyedCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.default_ttl;
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.check_reachable()?;
        let mut entries = self.entries.write();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.check_reachable()?;
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Instant::now() + ttl;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_reachable()?;
        self.entries.write().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }
}
