//! Archive persistence.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteArchiveStore;
pub use store::{
    normalize_tag, truncate_chars, ActivitySummary, Archive, ArchiveStore, DayCount, Exclusion,
    NewArchive, Note, SearchPage, SearchQuery, StoreStats, TagCount, MEDIA_CONTENT_TYPES,
};
