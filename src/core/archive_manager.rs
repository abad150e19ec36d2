//! Archive mutations with AI cache invalidation.
//!
//! Anything that changes archives goes through here so the aggregates handed
//! to the assistant never outlive a write by more than one call.

use std::sync::Arc;

use super::ai_data_cache::{AiDataCache, CacheKey};
use crate::error::Result;
use crate::storage::{ArchiveStore, NewArchive};

const CONTENT_KEYS: [CacheKey; 2] = [CacheKey::Statistics, CacheKey::RecentSamples];
const TAG_KEYS: [CacheKey; 3] = [
    CacheKey::Statistics,
    CacheKey::RecentSamples,
    CacheKey::TagAnalysis,
];

pub struct ArchiveManager {
    store: Arc<dyn ArchiveStore>,
    cache: Arc<AiDataCache>,
}

impl ArchiveManager {
    pub fn new(store: Arc<dyn ArchiveStore>, cache: Arc<AiDataCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn ArchiveStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<AiDataCache> {
        &self.cache
    }

    pub fn create_archive(&self, archive: &NewArchive) -> Result<i64> {
        let id = self.store.create_archive(archive)?;
        self.cache.invalidate(&CONTENT_KEYS);
        tracing::info!(id, content_type = %archive.content_type, "archive created");
        Ok(id)
    }

    /// Soft delete. `false` when the archive is missing or already in the trash.
    pub fn move_to_trash(&self, id: i64) -> Result<bool> {
        let moved = self.store.move_to_trash(id)?;
        if moved {
            self.cache.invalidate(&CONTENT_KEYS);
            tracing::info!(id, "archive moved to trash");
        }
        Ok(moved)
    }

    pub fn restore_archive(&self, id: i64) -> Result<bool> {
        let restored = self.store.restore_archive(id)?;
        if restored {
            self.cache.invalidate(&CONTENT_KEYS);
            tracing::info!(id, "archive restored");
        }
        Ok(restored)
    }

    /// Remove a trashed archive for good.
    pub fn delete_permanently(&self, id: i64) -> Result<bool> {
        let deleted = self.store.delete_permanently(id)?;
        if deleted {
            self.cache.invalidate(&CONTENT_KEYS);
            tracing::info!(id, "archive deleted permanently");
        }
        Ok(deleted)
    }

    pub fn empty_trash(&self) -> Result<usize> {
        let removed = self.store.empty_trash()?;
        self.cache.invalidate(&CONTENT_KEYS);
        tracing::info!(removed, "trash emptied");
        Ok(removed)
    }

    pub fn add_tag(&self, archive_id: i64, tag: &str) -> Result<bool> {
        let added = self.store.add_tag(archive_id, tag)?;
        self.cache.invalidate(&TAG_KEYS);
        Ok(added)
    }

    pub fn remove_tag(&self, archive_id: i64, tag: &str) -> Result<bool> {
        let removed = self.store.remove_tag(archive_id, tag)?;
        self.cache.invalidate(&TAG_KEYS);
        Ok(removed)
    }

    pub fn add_note(&self, archive_id: Option<i64>, content: &str) -> Result<i64> {
        self.store.add_note(archive_id, content)
    }

    pub fn toggle_favorite(&self, archive_id: i64) -> Result<Option<bool>> {
        self.store.toggle_favorite(archive_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{shared, Settings};
    use crate::core::ai_data_cache::tests::ManualClock;
    use crate::storage::SqliteArchiveStore;

    fn manager() -> ArchiveManager {
        let store: Arc<dyn ArchiveStore> = Arc::new(SqliteArchiveStore::open_in_memory().unwrap());
        let cache = Arc::new(AiDataCache::with_clock(
            store.clone(),
            shared(Settings::default()),
            10,
            Arc::new(ManualClock::new(1_750_000_000)),
        ));
        ArchiveManager::new(store, cache)
    }

    fn note(title: &str) -> NewArchive {
        NewArchive {
            content_type: "text".to_string(),
            title: Some(title.to_string()),
            ..NewArchive::default()
        }
    }

    #[test]
    fn test_create_and_trash_refresh_statistics() {
        let m = manager();
        assert_eq!(m.cache().get_statistics().total, 0);

        let id = m.create_archive(&note("a")).unwrap();
        assert_eq!(m.cache().get_statistics().total, 1);

        assert!(m.move_to_trash(id).unwrap());
        assert_eq!(m.cache().get_statistics().total, 0);

        assert_eq!(m.empty_trash().unwrap(), 1);
    }

    #[test]
    fn test_restore_and_permanent_delete_refresh_statistics() {
        let m = manager();
        let id = m.create_archive(&note("a")).unwrap();
        let other = m.create_archive(&note("b")).unwrap();
        m.move_to_trash(id).unwrap();
        m.move_to_trash(other).unwrap();
        assert_eq!(m.cache().get_statistics().total, 0);

        assert!(m.restore_archive(id).unwrap());
        assert_eq!(m.cache().get_statistics().total, 1);
        assert!(!m.restore_archive(id).unwrap());

        m.cache().get_recent_samples(10);
        assert!(!m.delete_permanently(id).unwrap());
        assert_eq!(m.cache().cache_info().size, 2);

        assert!(m.delete_permanently(other).unwrap());
        assert_eq!(m.cache().cache_info().size, 0);
        assert_eq!(m.store().trash_count().unwrap(), 0);
    }

    #[test]
    fn test_tag_changes_refresh_tag_analysis() {
        let m = manager();
        let id = m.create_archive(&note("a")).unwrap();
        assert!(m.cache().get_tag_analysis(15).is_empty());

        m.add_tag(id, "rust").unwrap();
        assert_eq!(m.cache().get_tag_analysis(15)[0].tag_name, "rust");

        m.remove_tag(id, "rust").unwrap();
        assert!(m.cache().get_tag_analysis(15).is_empty());
    }

    #[test]
    fn test_failed_trash_keeps_cache() {
        let m = manager();
        m.cache().get_statistics();
        assert!(!m.move_to_trash(404).unwrap());
        assert_eq!(m.cache().cache_info().size, 1);
    }
}
