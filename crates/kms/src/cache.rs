//! Single-entry resolution cache.
//!
//! Holds at most one [`ResolvedKeyVersion`] and refreshes it through a
//! [`KeyVersionResolver`] when it is missing or expired.
//!
//! # Cache Strategy
//!
//! - **Unpinned TTL**: default 300 seconds, counted from the last refresh.
//!   Reads do not extend it.
//! - **Pinned references**: never expire. A pinned version cannot change, so
//!   only [`ResolutionCache::invalidate`] forces a re-fetch.
//! - **Concurrent misses**: refreshes are serialized. Callers that queue
//!   behind an in-flight refresh reuse its result instead of resolving again.
//! - **Invalidation**: a refresh that was in flight when the cache was
//!   invalidated is returned to its caller but never installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::context::CallContext;
use crate::error::KmsResult;
use crate::reference::KeyReference;
use crate::resolver::{KeyVersionResolver, ResolvedKeyVersion};

/// Default lifetime of an unpinned resolution (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CacheEntry {
    value: Arc<ResolvedKeyVersion>,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// Memoizes the resolution of one key reference.
pub struct ResolutionCache {
    resolver: KeyVersionResolver,
    ttl: Option<Duration>,
    entry: RwLock<Option<CacheEntry>>,
    refresh: Mutex<()>,
    generation: AtomicU64,
    resolutions: AtomicU64,
}

impl ResolutionCache {
    /// Cache with [`DEFAULT_CACHE_TTL`] for unpinned references.
    pub fn new(resolver: KeyVersionResolver) -> Self {
        Self::with_ttl(resolver, DEFAULT_CACHE_TTL)
    }

    /// Cache whose unpinned entries live for `ttl`. Ignored for pinned
    /// references.
    pub fn with_ttl(resolver: KeyVersionResolver, ttl: Duration) -> Self {
        let ttl = (!resolver.reference().is_pinned()).then_some(ttl);
        Self {
            resolver,
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
            generation: AtomicU64::new(0),
            resolutions: AtomicU64::new(0),
        }
    }

    pub fn reference(&self) -> &KeyReference {
        self.resolver.reference()
    }

    /// Entry lifetime; `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the cached resolution, resolving first if it is missing or
    /// expired. Resolution errors are returned as-is and leave the cache
    /// empty.
    pub async fn get(&self, ctx: &CallContext) -> KmsResult<Arc<ResolvedKeyVersion>> {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        let _refresh = ctx
            .run("resolve", async { Ok(self.refresh.lock().await) })
            .await?;

        // Another caller may have refreshed while this one waited.
        if let Some(value) = self.fresh() {
            debug!(version = %value.name(), "reusing concurrent resolution");
            return Ok(value);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let resolved = Arc::new(self.resolver.resolve(ctx).await?);
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        if self.generation.load(Ordering::Acquire) == generation {
            // A TTL past the clock's range never expires.
            let expires_at = self.ttl.and_then(|ttl| Instant::now().checked_add(ttl));
            *self.entry.write() = Some(CacheEntry {
                value: resolved.clone(),
                expires_at,
            });
            debug!(version = %resolved.name(), ttl = ?self.ttl, "cached key version");
        } else {
            debug!(version = %resolved.name(), "cache invalidated during refresh, not caching");
        }
        Ok(resolved)
    }

    /// Drops the cached entry. The next [`get`](Self::get) resolves again.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(old) = self.entry.write().take() {
            debug!(version = %old.value.name(), "invalidated cached key version");
        }
    }

    /// Version name of the cached entry, if one is present and fresh.
    pub fn cached_version_name(&self) -> Option<String> {
        self.fresh().map(|value| value.name().to_string())
    }

    /// Number of completed resolutions since construction.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    fn fresh(&self) -> Option<Arc<ResolvedKeyVersion>> {
        let guard = self.entry.read();
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.value.clone())
    }
}
