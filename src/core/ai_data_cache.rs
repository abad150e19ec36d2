//! Short-lived cache of archive aggregates fed to the AI assistant.
//!
//! Three aggregates are kept, each with its own TTL. A miss or an expired
//! entry is recomputed synchronously from the store. Exclusion rules are read
//! from the shared settings on every recompute, never cached.

use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use super::cache::BoundedCache;
use crate::config::{ExclusionConfig, SharedSettings};
use crate::error::{Error, Result};
use crate::storage::{ArchiveStore, Exclusion, TagCount};

const DEFAULT_CAPACITY: usize = 10;
const WEEK_SECS: i64 = 7 * 24 * 3600;
const SAMPLE_TITLE_CHARS: usize = 50;

/// Source of "now" in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Cached aggregate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKey {
    Statistics,
    RecentSamples,
    TagAnalysis,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [
        CacheKey::Statistics,
        CacheKey::RecentSamples,
        CacheKey::TagAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Statistics => "statistics",
            CacheKey::RecentSamples => "recent_samples",
            CacheKey::TagAnalysis => "tag_analysis",
        }
    }

    /// Seconds an entry stays fresh.
    pub fn ttl_secs(&self) -> i64 {
        match self {
            CacheKey::Statistics => 180,
            CacheKey::RecentSamples => 120,
            CacheKey::TagAnalysis => 180,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CacheKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::NotFound(format!("cache key '{}'", s)))
    }
}

/// Archive counts for the assistant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: u64,
    pub tags: u64,
    pub recent_week: u64,
}

/// A recent archive, reduced to what the assistant needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSample {
    pub id: i64,
    pub title: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
enum Aggregate {
    Statistics(Statistics),
    RecentSamples(Vec<RecentSample>),
    TagAnalysis(Vec<TagCount>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Aggregate,
    created_at: i64,
}

/// Diagnostic view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub age_secs: i64,
    pub ttl_secs: i64,
    pub expired: bool,
}

/// Diagnostic view of the whole cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub size: usize,
    pub capacity: usize,
    pub entries: Vec<CacheEntryInfo>,
}

pub struct AiDataCache {
    store: Arc<dyn ArchiveStore>,
    settings: SharedSettings,
    entries: BoundedCache<CacheKey, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl AiDataCache {
    /// Cache sized from `ai.cache_capacity`, using the wall clock.
    pub fn new(store: Arc<dyn ArchiveStore>, settings: SharedSettings) -> Self {
        let capacity = settings
            .read()
            .map(|s| s.ai.cache_capacity)
            .unwrap_or(DEFAULT_CAPACITY);
        Self::with_clock(store, settings, capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn ArchiveStore>,
        settings: SharedSettings,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            settings,
            entries: BoundedCache::new(capacity),
            clock,
        }
    }

    fn exclusion_config(&self) -> ExclusionConfig {
        match self.settings.read() {
            Ok(s) => s.ai.exclude_from_context.clone(),
            Err(poisoned) => poisoned.into_inner().ai.exclude_from_context.clone(),
        }
    }

    fn fresh(&self, key: CacheKey) -> Option<Aggregate> {
        let entry = self.entries.get(&key)?;
        if self.clock.now() - entry.created_at < key.ttl_secs() {
            tracing::debug!(key = %key, "ai cache hit");
            Some(entry.value)
        } else {
            tracing::debug!(key = %key, "ai cache expired");
            None
        }
    }

    fn remember(&self, key: CacheKey, value: Aggregate) {
        self.entries.put(
            key,
            CacheEntry {
                value,
                created_at: self.clock.now(),
            },
        );
    }

    /// Archive totals, honoring exclusions when `apply_to_interactions` is on.
    pub fn get_statistics(&self) -> Statistics {
        if let Some(Aggregate::Statistics(stats)) = self.fresh(CacheKey::Statistics) {
            return stats;
        }
        match self.compute_statistics() {
            Ok(stats) => {
                self.remember(CacheKey::Statistics, Aggregate::Statistics(stats.clone()));
                stats
            }
            Err(e) => {
                tracing::error!("Failed to compute statistics: {}", e);
                Statistics::default()
            }
        }
    }

    fn compute_statistics(&self) -> Result<Statistics> {
        let config = self.exclusion_config();
        let exclusion = if config.apply_to_interactions {
            Exclusion::from(&config)
        } else {
            Exclusion::none()
        };
        let week_ago = self.clock.now() - WEEK_SECS;
        Ok(Statistics {
            total: self.store.count_archives(&exclusion, None)?,
            tags: self.store.count_distinct_tags(&exclusion)?,
            recent_week: self.store.count_archives(&exclusion, Some(week_ago))?,
        })
    }

    /// Most recent archives. `limit` applies when the list is recomputed.
    pub fn get_recent_samples(&self, limit: usize) -> Vec<RecentSample> {
        if let Some(Aggregate::RecentSamples(samples)) = self.fresh(CacheKey::RecentSamples) {
            return samples;
        }
        match self.compute_recent_samples(limit) {
            Ok(samples) => {
                self.remember(
                    CacheKey::RecentSamples,
                    Aggregate::RecentSamples(samples.clone()),
                );
                samples
            }
            Err(e) => {
                tracing::error!("Failed to compute recent samples: {}", e);
                Vec::new()
            }
        }
    }

    fn compute_recent_samples(&self, limit: usize) -> Result<Vec<RecentSample>> {
        // Samples and tag analysis always hide excluded content, even when
        // the exclusion is not applied to statistics.
        let exclusion = Exclusion::from(&self.exclusion_config());
        Ok(self
            .store
            .recent_archives(&exclusion, limit)?
            .into_iter()
            .map(|a| RecentSample {
                id: a.id,
                title: a.display_title(SAMPLE_TITLE_CHARS),
                created_at: a.created_at,
            })
            .collect())
    }

    /// Tag usage, most used first. `limit` applies when the list is recomputed.
    pub fn get_tag_analysis(&self, limit: usize) -> Vec<TagCount> {
        if let Some(Aggregate::TagAnalysis(tags)) = self.fresh(CacheKey::TagAnalysis) {
            return tags;
        }
        let exclusion = Exclusion::from(&self.exclusion_config());
        match self.store.tag_usage(&exclusion, limit) {
            Ok(tags) => {
                self.remember(CacheKey::TagAnalysis, Aggregate::TagAnalysis(tags.clone()));
                tags
            }
            Err(e) => {
                tracing::error!("Failed to compute tag analysis: {}", e);
                Vec::new()
            }
        }
    }

    /// Drop the given keys; an empty slice drops everything.
    pub fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            self.entries.clear();
            tracing::debug!("ai cache cleared");
            return;
        }
        for key in keys {
            self.entries.remove(key);
        }
        tracing::debug!(
            keys = ?keys.iter().map(CacheKey::as_str).collect::<Vec<_>>(),
            "ai cache invalidated"
        );
    }

    pub fn invalidate_all(&self) {
        self.invalidate(&[]);
    }

    pub fn cache_info(&self) -> CacheInfo {
        let now = self.clock.now();
        let entries = CacheKey::ALL
            .into_iter()
            .filter_map(|key| {
                let entry = self.entries.peek(&key)?;
                let age_secs = now - entry.created_at;
                Some(CacheEntryInfo {
                    key,
                    age_secs,
                    ttl_secs: key.ttl_secs(),
                    expired: age_secs >= key.ttl_secs(),
                })
            })
            .collect();
        CacheInfo {
            size: self.entries.len(),
            capacity: self.entries.capacity(),
            entries,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{shared, Settings};
    use crate::storage::{NewArchive, SqliteArchiveStore};
    use std::sync::atomic::{AtomicI64, Ordering};

    pub(crate) struct ManualClock(AtomicI64);

    impl ManualClock {
        pub(crate) fn new(start: i64) -> Self {
            Self(AtomicI64::new(start))
        }

        pub(crate) fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const START: i64 = 1_750_000_000;

    struct Fixture {
        store: Arc<SqliteArchiveStore>,
        settings: SharedSettings,
        clock: Arc<ManualClock>,
        cache: AiDataCache,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteArchiveStore::open_in_memory().unwrap());
        let settings = shared(Settings::default());
        let clock = Arc::new(ManualClock::new(START));
        let cache = AiDataCache::with_clock(
            store.clone(),
            settings.clone(),
            10,
            clock.clone(),
        );
        Fixture {
            store,
            settings,
            clock,
            cache,
        }
    }

    fn add(store: &SqliteArchiveStore, title: &str, tags: &[&str], created_at: i64) -> i64 {
        store
            .create_archive(&NewArchive {
                content_type: "text".to_string(),
                title: Some(title.to_string()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_at: Some(created_at),
                ..NewArchive::default()
            })
            .unwrap()
    }

    #[test]
    fn test_statistics_fresh_until_ttl() {
        let f = fixture();
        add(&f.store, "one", &["a"], START);
        assert_eq!(f.cache.get_statistics().total, 1);

        // Written behind the cache's back: only visible after expiry.
        add(&f.store, "two", &[], START);
        f.clock.advance(179);
        assert_eq!(f.cache.get_statistics().total, 1);

        f.clock.advance(2);
        assert_eq!(f.cache.get_statistics().total, 2);
    }

    #[test]
    fn test_recent_samples_ttl_is_shorter() {
        let f = fixture();
        add(&f.store, "first", &[], START);
        assert_eq!(f.cache.get_recent_samples(10).len(), 1);

        add(&f.store, "second", &[], START + 1);
        f.clock.advance(119);
        assert_eq!(f.cache.get_recent_samples(10).len(), 1);
        f.clock.advance(1);
        let samples = f.cache.get_recent_samples(10);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].title, "second");
    }

    #[test]
    fn test_invalidate_is_targeted() {
        let f = fixture();
        add(&f.store, "one", &["a"], START);
        f.cache.get_statistics();
        f.cache.get_tag_analysis(15);

        add(&f.store, "two", &["b"], START);
        f.cache.invalidate(&[CacheKey::Statistics]);
        f.cache.invalidate(&[CacheKey::Statistics]);

        assert_eq!(f.cache.get_statistics().total, 2);
        assert_eq!(f.cache.get_tag_analysis(15).len(), 1);

        f.cache.invalidate_all();
        assert_eq!(f.cache.cache_info().size, 0);
        assert_eq!(f.cache.get_tag_analysis(15).len(), 2);
    }

    #[test]
    fn test_empty_exclusion_ignores_apply_flag() {
        let f = fixture();
        add(&f.store, "one", &["a"], START);
        add(&f.store, "two", &["b"], START);
        let with_flag = f.cache.get_statistics();

        f.settings.write().unwrap().ai.exclude_from_context.apply_to_interactions = false;
        f.cache.invalidate_all();
        assert_eq!(f.cache.get_statistics(), with_flag);
    }

    #[test]
    fn test_excluded_tag_reduces_totals() {
        let f = fixture();
        add(&f.store, "public", &["work"], START);
        add(&f.store, "diary 1", &["private"], START);
        add(&f.store, "diary 2", &["private", "work"], START);
        assert_eq!(f.cache.get_statistics().total, 3);

        f.settings.write().unwrap().ai.exclude_from_context.tags = vec!["private".to_string()];
        f.cache.invalidate(&[CacheKey::Statistics]);
        let stats = f.cache.get_statistics();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.tags, 1);
        assert_eq!(stats.recent_week, 1);

        // Flag off: statistics ignore the exclusion, samples still honor it.
        f.settings.write().unwrap().ai.exclude_from_context.apply_to_interactions = false;
        f.cache.invalidate_all();
        assert_eq!(f.cache.get_statistics().total, 3);
        let titles: Vec<_> = f
            .cache
            .get_recent_samples(10)
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["public".to_string()]);
    }

    #[test]
    fn test_tag_analysis_keeps_other_tags_of_excluded_archives() {
        let f = fixture();
        add(&f.store, "trip", &["private", "travel"], START);
        f.settings.write().unwrap().ai.exclude_from_context.tags = vec!["private".to_string()];

        let tags = f.cache.get_tag_analysis(15);
        assert_eq!(
            tags,
            vec![TagCount {
                tag_name: "travel".to_string(),
                count: 1
            }]
        );
        assert!(f.cache.get_recent_samples(10).is_empty());
    }

    #[test]
    fn test_recent_week_window() {
        let f = fixture();
        add(&f.store, "old", &[], START - 8 * 24 * 3600);
        add(&f.store, "new", &[], START - 3600);
        let stats = f.cache.get_statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.recent_week, 1);
    }

    #[test]
    fn test_store_failure_returns_fallback_without_caching() {
        let f = fixture();
        f.store
            .raw()
            .execute_batch("DROP TABLE archive_tags; DROP TABLE archives;")
            .unwrap();

        assert_eq!(f.cache.get_statistics(), Statistics::default());
        assert!(f.cache.get_recent_samples(10).is_empty());
        assert!(f.cache.get_tag_analysis(15).is_empty());
        assert_eq!(f.cache.cache_info().size, 0);
    }

    #[test]
    fn test_cache_info_reports_age() {
        let f = fixture();
        f.cache.get_statistics();
        f.clock.advance(200);
        let info = f.cache.cache_info();
        assert_eq!(info.size, 1);
        assert_eq!(info.capacity, 10);
        assert_eq!(info.entries[0].key, CacheKey::Statistics);
        assert_eq!(info.entries[0].age_secs, 200);
        assert!(info.entries[0].expired);
    }

    #[test]
    fn test_cache_key_parse() {
        assert_eq!("tag_analysis".parse::<CacheKey>().unwrap(), CacheKey::TagAnalysis);
        assert!("bogus".parse::<CacheKey>().is_err());
    }
}
