use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use content_model::Settings;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::source::ContentSource;

#[derive(Debug, Default)]
struct CacheSlot {
    epoch: u64,
    entry: Option<(Settings, Instant)>,
}

/// Settings cache owned by one provider.
///
/// Entries expire after `ttl`; `invalidate` drops the entry and bumps the
/// epoch so a fetch that started earlier cannot store its result afterwards.
/// A zero `ttl` disables caching.
#[derive(Debug)]
pub struct SettingsCache {
    ttl: Duration,
    slot: Mutex<CacheSlot>,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    pub fn get(&self, now: Instant) -> Option<Settings> {
        let slot = self.lock();
        let (settings, stored_at) = slot.entry?;
        (now.saturating_duration_since(stored_at) < self.ttl).then_some(settings)
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Stores `settings` unless the cache was invalidated since `epoch`.
    pub fn store(&self, settings: Settings, epoch: u64, now: Instant) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut slot = self.lock();
        if slot.epoch != epoch {
            return false;
        }
        slot.entry = Some((settings, now));
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.lock();
        slot.epoch += 1;
        slot.entry = None;
    }

    fn lock(&self) -> MutexGuard<'_, CacheSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetches display settings, never failing the caller.
///
/// Any fetch or validation failure yields the configured defaults, which are
/// not cached so the next call asks the store again.
pub struct SettingsProvider<S> {
    source: Arc<S>,
    defaults: Settings,
    cache: Arc<SettingsCache>,
}

impl<S> Clone for SettingsProvider<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            defaults: self.defaults,
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: ContentSource> SettingsProvider<S> {
    pub fn new(source: Arc<S>, defaults: Settings, cache_ttl: Duration) -> Self {
        Self {
            source,
            defaults,
            cache: Arc::new(SettingsCache::new(cache_ttl)),
        }
    }

    pub fn defaults(&self) -> Settings {
        self.defaults
    }

    pub fn invalidate(&self) {
        debug!("settings cache invalidated");
        self.cache.invalidate();
    }

    pub async fn fetch(&self) -> Settings {
        if let Some(cached) = self.cache.get(Instant::now()) {
            return cached;
        }
        let epoch = self.cache.epoch();
        let stored = match self.source.fetch_settings().await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "settings fetch failed; using defaults");
                return self.defaults;
            }
        };
        match stored.resolve(&self.defaults) {
            Ok(settings) => {
                self.cache.store(settings, epoch, Instant::now());
                settings
            }
            Err(err) => {
                warn!(error = %err, "stored settings invalid; using defaults");
                self.defaults
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ms: u64) -> Settings {
        Settings {
            advance: Duration::from_millis(ms),
            ..Settings::default()
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        let t0 = Instant::from_std(std::time::Instant::now());
        assert!(cache.store(settings(500), cache.epoch(), t0));
        assert_eq!(cache.get(t0 + Duration::from_secs(59)), Some(settings(500)));
        assert_eq!(cache.get(t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn invalidation_blocks_stale_store() {
        let cache = SettingsCache::new(Duration::from_secs(60));
        let t0 = Instant::from_std(std::time::Instant::now());
        let epoch = cache.epoch();
        cache.invalidate();
        assert!(!cache.store(settings(500), epoch, t0));
        assert_eq!(cache.get(t0), None);
    }

    #[test]
    fn zero_ttl_never_caches() {
        let cache = SettingsCache::new(Duration::ZERO);
        let t0 = Instant::from_std(std::time::Instant::now());
        assert!(!cache.store(settings(500), cache.epoch(), t0));
        assert_eq!(cache.get(t0), None);
    }
}
