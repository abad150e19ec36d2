//! Archive storage abstraction.
//!
//! Everything above the storage layer (cache, executors, telegram) talks to
//! `dyn ArchiveStore`; the SQLite implementation lives in `storage::sqlite`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ExclusionConfig;
use crate::error::Result;

/// Content types delivered as Telegram media rather than text.
pub const MEDIA_CONTENT_TYPES: &[&str] = &[
    "image", "photo", "video", "audio", "voice", "file", "document", "ebook",
];

/// A stored archive item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub id: i64,
    pub content_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default = "default_storage_type")]
    pub storage_type: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_storage_type() -> String {
    "database".to_string()
}

impl Archive {
    /// Title, else the start of the content, else "Untitled".
    pub fn display_title(&self, max_chars: usize) -> String {
        let raw = self
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.content.as_deref().filter(|c| !c.trim().is_empty()))
            .unwrap_or("Untitled");
        truncate_chars(raw.trim(), max_chars)
    }

    pub fn is_media(&self) -> bool {
        MEDIA_CONTENT_TYPES.contains(&self.content_type.as_str())
    }

    /// Channel and message id of a Telegram-stored archive
    /// (`storage_path = "telegram:<channel>:<message>"`).
    pub fn telegram_location(&self) -> Option<(i64, i32)> {
        if self.storage_type != "telegram" {
            return None;
        }
        let path = self.storage_path.as_deref()?;
        let mut parts = path.splitn(3, ':');
        if parts.next()? != "telegram" {
            return None;
        }
        let channel = parts.next()?.parse().ok()?;
        let message = parts.next()?.parse().ok()?;
        Some((channel, message))
    }
}

/// Truncate to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Fields for a new archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewArchive {
    pub content_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub file_id: Option<String>,
    pub storage_type: Option<String>,
    pub storage_path: Option<String>,
    pub file_size: Option<i64>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    /// Overrides the insertion time (imports and tests).
    pub created_at: Option<i64>,
}

/// A note, optionally attached to an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    #[serde(default)]
    pub archive_id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub archive_title: Option<String>,
}

/// Tag usage count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    #[serde(alias = "name")]
    pub tag_name: String,
    pub count: u64,
}

/// Whole-store numbers for the `stats` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_archives: u64,
    pub total_tags: u64,
    pub total_size: i64,
    pub last_archive: Option<i64>,
}

/// Archives per calendar day (UTC, `YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: String,
    pub count: u64,
}

/// Activity since a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub archives: u64,
    pub deleted: u64,
    pub notes: u64,
    /// Only days with at least one archive.
    pub trend: Vec<DayCount>,
    pub top_tags: Vec<TagCount>,
}

/// Archives hidden from the assistant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exclusion {
    pub channel_ids: Vec<i64>,
    pub tags: Vec<String>,
}

impl Exclusion {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.channel_ids.is_empty() && self.tags.is_empty()
    }
}

impl From<&ExclusionConfig> for Exclusion {
    fn from(config: &ExclusionConfig) -> Self {
        Self {
            channel_ids: config.channel_ids.clone(),
            tags: config.tags.clone(),
        }
    }
}

/// A parsed search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub keyword: String,
    pub tags: Vec<String>,
    pub content_type: Option<String>,
    pub exclusion: Exclusion,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    /// Split `#tag` tokens out of free text; the rest is the keyword.
    pub fn parse(raw: &str, limit: usize) -> Self {
        let (keyword, tags) = match Regex::new(r"#([^\s#]+)") {
            Ok(re) => (
                re.replace_all(raw, " ").into_owned(),
                re.captures_iter(raw).map(|c| c[1].to_string()).collect(),
            ),
            Err(_) => (raw.to_string(), Vec::new()),
        };
        Self {
            keyword: keyword.split_whitespace().collect::<Vec<_>>().join(" "),
            tags,
            limit,
            ..Self::default()
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<Archive>,
    pub total: u64,
}

/// Normalize a user-supplied tag: trim and drop leading `#`.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().trim_start_matches('#').trim().to_string()
}

/// Archive persistence. Implementations must be safe to share across tasks.
pub trait ArchiveStore: Send + Sync {
    // Aggregates for the AI data cache.
    fn count_archives(&self, exclusion: &Exclusion, created_after: Option<i64>) -> Result<u64>;
    fn count_distinct_tags(&self, exclusion: &Exclusion) -> Result<u64>;
    fn recent_archives(&self, exclusion: &Exclusion, limit: usize) -> Result<Vec<Archive>>;
    fn tag_usage(&self, exclusion: &Exclusion, limit: usize) -> Result<Vec<TagCount>>;

    // Reads.
    fn search(&self, query: &SearchQuery) -> Result<SearchPage>;
    fn get_archive(&self, id: i64) -> Result<Option<Archive>>;
    fn random_archive(&self, content_type: Option<&str>) -> Result<Option<Archive>>;
    fn list_archives(&self, content_type: Option<&str>, limit: usize) -> Result<Vec<Archive>>;
    fn all_tags(&self, limit: usize) -> Result<Vec<TagCount>>;
    fn store_stats(&self) -> Result<StoreStats>;
    fn activity_summary(&self, since: i64) -> Result<ActivitySummary>;
    fn trash_count(&self) -> Result<u64>;

    // Notes.
    fn notes_for_archive(&self, archive_id: i64) -> Result<Vec<Note>>;
    fn search_notes(&self, keyword: &str, limit: usize) -> Result<Vec<Note>>;
    fn list_notes(&self, limit: usize, offset: usize) -> Result<Vec<Note>>;
    fn add_note(&self, archive_id: Option<i64>, content: &str) -> Result<i64>;

    // Mutations. Callers go through `ArchiveManager` so the AI cache is
    // invalidated.
    fn create_archive(&self, archive: &NewArchive) -> Result<i64>;
    fn move_to_trash(&self, id: i64) -> Result<bool>;
    fn restore_archive(&self, id: i64) -> Result<bool>;
    fn delete_permanently(&self, id: i64) -> Result<bool>;
    fn empty_trash(&self) -> Result<usize>;
    fn add_tag(&self, archive_id: i64, tag: &str) -> Result<bool>;
    fn remove_tag(&self, archive_id: i64, tag: &str) -> Result<bool>;
    fn toggle_favorite(&self, archive_id: i64) -> Result<Option<bool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_extracts_tags() {
        let q = SearchQuery::parse("rust #lang async  #web", 10);
        assert_eq!(q.keyword, "rust async");
        assert_eq!(q.tags, vec!["lang".to_string(), "web".to_string()]);
        assert_eq!(q.limit, 10);
    }

    #[test]
    fn test_telegram_location() {
        let mut archive = Archive {
            id: 1,
            content_type: "photo".to_string(),
            title: None,
            content: None,
            file_id: None,
            storage_type: "telegram".to_string(),
            storage_path: Some("telegram:-1001:77".to_string()),
            file_size: None,
            source: None,
            favorite: false,
            deleted: false,
            created_at: 0,
            tags: Vec::new(),
        };
        assert_eq!(archive.telegram_location(), Some((-1001, 77)));
        assert!(archive.is_media());

        archive.storage_type = "database".to_string();
        assert_eq!(archive.telegram_location(), None);
    }

    #[test]
    fn test_display_title_fallbacks() {
        let archive: Archive = serde_json::from_value(serde_json::json!({
            "id": 3,
            "content_type": "text",
            "title": "  ",
            "content": "a fairly long piece of content"
        }))
        .unwrap();
        assert_eq!(archive.display_title(8), "a fairly");

        let bare: Archive =
            serde_json::from_value(serde_json::json!({"id": 4, "content_type": "text"})).unwrap();
        assert_eq!(bare.display_title(50), "Untitled");
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  #rust "), "rust");
        assert_eq!(normalize_tag("work"), "work");
    }
}
