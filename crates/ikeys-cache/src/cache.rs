//! Expiring cache keyed by string.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::fetch::Fetch;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CacheError<E: std::error::Error + 'static> {
    #[error("fetch failed: {0}")]
    Fetch(#[source] E),
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    /// Upper bound on live entries. Zero disables the bound.
    pub max_size: usize,
    /// Optional limit on a single fetch. A timed out fetch inserts nothing.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            fetch_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Per-call overrides for [`ExpiringCache::get_with`].
pub struct GetOptions<'a, A, V, E> {
    pub force_refresh: bool,
    pub fetch: Option<&'a (dyn Fetch<Args = A, Value = V, Error = E> + 'a)>,
    pub ttl: Option<Duration>,
}

impl<'a, A, V, E> Default for GetOptions<'a, A, V, E> {
    fn default() -> Self {
        Self {
            force_refresh: false,
            fetch: None,
            ttl: None,
        }
    }
}

impl<'a, A, V, E> GetOptions<'a, A, V, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn fetch_with(mut self, fetch: &'a (dyn Fetch<Args = A, Value = V, Error = E> + 'a)) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Zero falls back to the cache default. Expiry has whole-second
    /// granularity; a fractional TTL rounds up.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    i64::try_from(secs).unwrap_or(i64::MAX)
}

struct CacheEntry<V> {
    value: V,
    expires_at: i64,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<V> CacheState<V> {
    fn sweep(&mut self, now: i64) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let swept = before - self.entries.len();
        if swept > 0 {
            debug!(swept, "expired cache entries removed");
        }
    }

    /// Evict arbitrary entries other than `keep` until the bound holds.
    fn enforce_bound(&mut self, max_size: usize, keep: &str) {
        if max_size == 0 {
            return;
        }
        while self.entries.len() > max_size {
            let Some(victim) = self.entries.keys().find(|k| k.as_str() != keep).cloned() else {
                break;
            };
            self.entries.remove(&victim);
            debug!(key = %victim, "cache entry evicted");
        }
    }
}

/// String-keyed cache in front of a [`Fetch`].
///
/// Every call runs under one async lock, so a miss for a key blocks
/// concurrent callers until the fetch lands and they then hit the fresh
/// entry. Fetch failures are returned to the caller and never cached.
pub struct ExpiringCache<F: Fetch> {
    fetcher: F,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<F::Value>>,
}

impl<F: Fetch> ExpiringCache<F> {
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self::with_clock(fetcher, config, Arc::new(SystemClock))
    }

    pub fn with_clock(fetcher: F, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            config,
            clock,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fresh cached value for `key`, or the result of fetching with `args`.
    pub async fn get(&self, key: &str, args: F::Args) -> Result<F::Value, CacheError<F::Error>> {
        self.get_with(key, args, GetOptions::default()).await
    }

    pub async fn get_with(
        &self,
        key: &str,
        args: F::Args,
        options: GetOptions<'_, F::Args, F::Value, F::Error>,
    ) -> Result<F::Value, CacheError<F::Error>> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_unix();
        state.sweep(now);

        if !options.force_refresh {
            let cached = state
                .entries
                .get(key)
                .filter(|entry| entry.expires_at > now)
                .map(|entry| entry.value.clone());
            if let Some(value) = cached {
                state.hits += 1;
                debug!(key, "cache hit");
                return Ok(value);
            }
        }

        state.misses += 1;
        debug!(key, force = options.force_refresh, "cache miss");

        let fetcher: &(dyn Fetch<Args = F::Args, Value = F::Value, Error = F::Error> + '_) =
            match options.fetch {
                Some(fetch) => fetch,
                None => &self.fetcher,
            };
        let pending = fetcher.fetch(args);
        let value = match self.config.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result.map_err(CacheError::Fetch)?,
                Err(_) => {
                    debug!(key, ?limit, "cache fetch timed out");
                    return Err(CacheError::TimedOut(limit));
                }
            },
            None => pending.await.map_err(CacheError::Fetch)?,
        };

        let ttl = options
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.config.default_ttl);
        let expires_at = now.saturating_add(ttl_secs(ttl));
        state.entries.insert(
            key.to_owned(),
            CacheEntry {
                value: value.clone(),
                expires_at,
            },
        );
        state.enforce_bound(self.config.max_size, key);
        Ok(value)
    }

    /// Drop `key`. Returns whether an entry was present.
    pub async fn remove(&self, key: &str) -> bool {
        self.state.lock().await.entries.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.state.lock().await.entries.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            size: state.entries.len(),
        }
    }
}
