//! Time-bounded, single-flight cache.
//!
//! [`TtlCache`] memoizes the result of an expensive, possibly failing
//! [`Loader`] per logical key for a fixed time-to-live.
//!
//! # Single-flight
//!
//! At most one load per key is in flight at any time. Callers that ask for a
//! key while its load is running attach to that load and receive the same
//! outcome, success or failure. A failed load is never stored, so the next
//! call after a failure starts a fresh load.
//!
//! # Example
//!
//! ```ignore
//! use authentic_client::cache::TtlCache;
//!
//! let cache = TtlCache::new(loader, Duration::from_secs(3600));
//! let value = cache.get("pubKey").await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::AuthResult;
use crate::config::DEFAULT_CACHE_DURATION;
use crate::error::AuthError;

/// Default time-to-live for cached values (one hour).
pub const DEFAULT_TTL: Duration = DEFAULT_CACHE_DURATION;

/// Produces the value for a cache key.
#[async_trait]
pub trait Loader: Send + Sync + 'static {
    /// The loaded value.
    type Value: Send + Sync + 'static;

    /// Loads the value for `key`.
    async fn load(&self, key: &str) -> AuthResult<Self::Value>;
}

type LoadFuture<V> = Shared<BoxFuture<'static, AuthResult<Arc<V>>>>;

enum Slot<V> {
    Ready {
        value: Arc<V>,
        loaded_at: Instant,
    },
    Loading {
        generation: u64,
        future: LoadFuture<V>,
    },
}

struct Inner<L: Loader> {
    loader: L,
    ttl: Duration,
    slots: DashMap<String, Slot<L::Value>>,
    generation: AtomicU64,
}

/// Single-flight TTL cache keyed by logical resource name.
pub struct TtlCache<L: Loader> {
    inner: Arc<Inner<L>>,
}

impl<L: Loader> TtlCache<L> {
    /// Creates a cache around `loader` whose entries live for `ttl`.
    #[must_use]
    pub fn new(loader: L, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                ttl,
                slots: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a cache with the default one hour TTL.
    #[must_use]
    pub fn with_default_ttl(loader: L) -> Self {
        Self::new(loader, DEFAULT_TTL)
    }

    /// Returns the live value for `key`, loading it if absent or stale.
    ///
    /// # Errors
    ///
    /// Returns the loader's error. Every caller waiting on the same load
    /// receives the same error, and nothing is cached.
    pub async fn get(&self, key: &str) -> AuthResult<Arc<L::Value>> {
        let future = match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let pending = match occupied.get() {
                    Slot::Ready { value, loaded_at } if loaded_at.elapsed() < self.inner.ttl => {
                        tracing::trace!(key, "Cache hit");
                        return Ok(Arc::clone(value));
                    }
                    Slot::Loading { future, .. } => {
                        tracing::trace!(key, "Joining in-flight load");
                        Some(future.clone())
                    }
                    Slot::Ready { .. } => None,
                };

                match pending {
                    Some(future) => future,
                    None => {
                        tracing::debug!(key, "Cache entry expired");
                        let (slot, future) = self.start_load(key);
                        occupied.insert(slot);
                        future
                    }
                }
            }
            Entry::Vacant(vacant) => {
                tracing::debug!(key, "Cache miss");
                let (slot, future) = self.start_load(key);
                vacant.insert(slot);
                future
            }
        };

        future.await
    }

    /// Drops the entry for `key`, forcing the next `get` to load.
    ///
    /// A load already in flight still completes for its waiters but its
    /// result is not stored.
    pub fn invalidate(&self, key: &str) {
        self.inner.slots.remove(key);
        tracing::debug!(key, "Invalidated cache entry");
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.inner.slots.clear();
        tracing::debug!("Cleared cache");
    }

    /// Number of keys currently stored or loading.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// Returns `true` if nothing is stored or loading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// The configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn start_load(&self, key: &str) -> (Slot<L::Value>, LoadFuture<L::Value>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner: Weak<Inner<L>> = Arc::downgrade(&self.inner);
        let key = key.to_string();

        let future = async move {
            let Some(inner) = inner.upgrade() else {
                return Err(AuthError::unclassified("cache dropped during load"));
            };
            let result = inner.loader.load(&key).await.map(Arc::new);
            inner.settle(&key, generation, &result);
            result
        }
        .boxed()
        .shared();

        (
            Slot::Loading {
                generation,
                future: future.clone(),
            },
            future,
        )
    }
}

impl<L: Loader> Inner<L> {
    /// Stores a finished load, unless the slot was invalidated or replaced
    /// while the load was running.
    fn settle(&self, key: &str, generation: u64, result: &AuthResult<Arc<L::Value>>) {
        let Entry::Occupied(mut occupied) = self.slots.entry(key.to_string()) else {
            return;
        };

        let current = matches!(
            occupied.get(),
            Slot::Loading { generation: g, .. } if *g == generation
        );
        if !current {
            return;
        }

        match result {
            Ok(value) => {
                occupied.insert(Slot::Ready {
                    value: Arc::clone(value),
                    loaded_at: Instant::now(),
                });
                tracing::debug!(key, ttl = ?self.ttl, "Cached value");
            }
            Err(error) => {
                occupied.remove();
                tracing::warn!(key, error = %error, "Cache load failed");
            }
        }
    }
}
