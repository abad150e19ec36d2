//! Read-only operations the assistant may run without asking.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::audit::{AuditEvent, AuditEventType};
use super::i18n::{Language, Msg};
use super::params;
use super::render::{format_size, format_timestamp};
use crate::core::Clock;
use crate::error::Error;
use crate::storage::{ArchiveStore, DayCount, SearchQuery};

/// Operation types accepted by [`SafeExecutor::execute`].
pub const SAFE_OPERATIONS: &[&str] = &["search", "stats", "tags", "notes", "review"];

const DAY_SECS: i64 = 24 * 3600;

/// Result handed back to the tool layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    /// `null` on failure.
    pub data: Value,
}

#[derive(Debug)]
pub enum OperationError {
    MissingKeyword,
    InvalidParams(String),
    InvalidReviewType(String),
    UnknownOperation(String),
    Store(Error),
}

impl From<Error> for OperationError {
    fn from(e: Error) -> Self {
        OperationError::Store(e)
    }
}

impl OperationError {
    fn message(&self) -> Msg {
        match self {
            OperationError::MissingKeyword => Msg::MissingKeyword,
            OperationError::InvalidParams(e) => Msg::ExecutionError { error: e.clone() },
            OperationError::InvalidReviewType(t) => Msg::InvalidReviewType {
                review_type: t.clone(),
            },
            OperationError::UnknownOperation(op) => Msg::UnknownOperation {
                operation: op.clone(),
            },
            OperationError::Store(e) => Msg::ExecutionError {
                error: e.to_string(),
            },
        }
    }
}

/// Review window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Unknown names fall back to a month.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "today" => Period::Today,
            "yesterday" => Period::Yesterday,
            "week" => Period::Week,
            "quarter" => Period::Quarter,
            "year" => Period::Year,
            _ => Period::Month,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Period::Today => 1,
            Period::Yesterday => 2,
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
            Period::Year => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotesQuery {
    ForArchive(i64),
    Search { query: String, limit: usize },
    List { limit: usize, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewRequest {
    Random {
        limit: usize,
        content_type: Option<String>,
    },
    Summary(Period),
}

/// A parsed read-only operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SafeOperation {
    Search { keyword: String, limit: usize },
    Stats,
    Tags { limit: usize },
    Notes(NotesQuery),
    Review(ReviewRequest),
}

/// Parameters any read-only operation may take; each operation reads its own.
#[derive(Debug, Deserialize)]
struct OperationArgs {
    #[serde(default, deserialize_with = "params::text")]
    keyword: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    query: Option<String>,
    #[serde(default, deserialize_with = "params::count")]
    limit: Option<usize>,
    #[serde(default, deserialize_with = "params::count")]
    offset: Option<usize>,
    #[serde(default, deserialize_with = "params::int")]
    archive_id: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "params::text")]
    review_type: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    content_type: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    period: Option<String>,
}

impl OperationArgs {
    fn limit(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).max(1)
    }
}

impl SafeOperation {
    pub fn parse(operation_type: &str, params: &Value) -> Result<Self, OperationError> {
        if !SAFE_OPERATIONS.contains(&operation_type) {
            return Err(OperationError::UnknownOperation(operation_type.to_string()));
        }
        let args: OperationArgs =
            params::parse(params).map_err(|e| OperationError::InvalidParams(e.to_string()))?;
        match operation_type {
            "search" => {
                let limit = args.limit(10);
                let keyword = args
                    .keyword
                    .or(args.query)
                    .ok_or(OperationError::MissingKeyword)?;
                Ok(SafeOperation::Search { keyword, limit })
            }
            "stats" => Ok(SafeOperation::Stats),
            "tags" => Ok(SafeOperation::Tags {
                limit: args.limit(100),
            }),
            "notes" => {
                let query = if let Some(id) = args.archive_id {
                    NotesQuery::ForArchive(id)
                } else if let Some(q) = args.query.clone().or_else(|| args.keyword.clone()) {
                    NotesQuery::Search {
                        query: q,
                        limit: args.limit(10),
                    }
                } else {
                    NotesQuery::List {
                        limit: args.limit(100),
                        offset: args.offset.unwrap_or(0),
                    }
                };
                Ok(SafeOperation::Notes(query))
            }
            "review" => match args.review_type.as_deref().unwrap_or("random") {
                "random" => Ok(SafeOperation::Review(ReviewRequest::Random {
                    limit: args.limit.unwrap_or(1),
                    content_type: args.content_type,
                })),
                "summary" => Ok(SafeOperation::Review(ReviewRequest::Summary(Period::parse(
                    args.period.as_deref().unwrap_or_default(),
                )))),
                other => Err(OperationError::InvalidReviewType(other.to_string())),
            },
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }
}

pub struct SafeExecutor {
    store: Arc<dyn ArchiveStore>,
    clock: Arc<dyn Clock>,
}

impl SafeExecutor {
    pub fn new(store: Arc<dyn ArchiveStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run a read-only operation. Failures come back as `success: false`
    /// with a localized message; nothing here returns `Err`.
    pub fn execute(&self, operation_type: &str, params: &Value, lang: Language) -> OperationOutcome {
        let result = SafeOperation::parse(operation_type, params).and_then(|op| self.run(op));

        let outcome = match result {
            Ok((msg, data)) => OperationOutcome {
                success: true,
                message: msg.text(lang),
                data,
            },
            Err(e) => {
                if let OperationError::Store(err) = &e {
                    tracing::error!(operation = operation_type, "safe operation failed: {}", err);
                }
                OperationOutcome {
                    success: false,
                    message: e.message().text(lang),
                    data: Value::Null,
                }
            }
        };

        AuditEvent::new(AuditEventType::SafeExecuted, operation_type, params, lang)
            .with_result(&outcome.message)
            .emit();
        outcome
    }

    fn run(&self, op: SafeOperation) -> Result<(Msg, Value), OperationError> {
        match op {
            SafeOperation::Search { keyword, limit } => self.search(keyword, limit),
            SafeOperation::Stats => self.stats(),
            SafeOperation::Tags { limit } => self.tags(limit),
            SafeOperation::Notes(query) => self.notes(query),
            SafeOperation::Review(ReviewRequest::Random {
                limit,
                content_type,
            }) => self.review_random(limit, content_type),
            SafeOperation::Review(ReviewRequest::Summary(period)) => self.review_summary(period),
        }
    }

    fn search(&self, keyword: String, limit: usize) -> Result<(Msg, Value), OperationError> {
        let page = self.store.search(&SearchQuery::parse(&keyword, limit))?;
        if page.results.is_empty() {
            return Ok((
                Msg::SearchNoResults { keyword },
                json!({"count": 0, "results": []}),
            ));
        }
        let count = page.results.len();
        Ok((
            Msg::SearchFound {
                count,
                keyword: keyword.clone(),
            },
            json!({
                "count": count,
                "total": page.total,
                "keyword": keyword,
                "results": page.results,
            }),
        ))
    }

    fn stats(&self) -> Result<(Msg, Value), OperationError> {
        let stats = self.store.store_stats()?;
        Ok((
            Msg::StatsDone,
            json!({
                "total_archives": stats.total_archives,
                "total_tags": stats.total_tags,
                "storage_used": format_size(stats.total_size),
                "last_archive": stats
                    .last_archive
                    .map(format_timestamp)
                    .unwrap_or_else(|| "N/A".to_string()),
            }),
        ))
    }

    fn tags(&self, limit: usize) -> Result<(Msg, Value), OperationError> {
        let tags = self.store.all_tags(limit)?;
        if tags.is_empty() {
            return Ok((Msg::TagsEmpty, json!({"count": 0, "tags": []})));
        }
        let count = tags.len();
        Ok((Msg::TagsFound { count }, json!({"count": count, "tags": tags})))
    }

    fn notes(&self, query: NotesQuery) -> Result<(Msg, Value), OperationError> {
        match query {
            NotesQuery::ForArchive(archive_id) => {
                let notes = self.store.notes_for_archive(archive_id)?;
                let count = notes.len();
                let msg = if count == 0 {
                    Msg::NotesForArchiveEmpty { archive_id }
                } else {
                    Msg::NotesForArchive { archive_id, count }
                };
                Ok((
                    msg,
                    json!({"count": count, "archive_id": archive_id, "notes": notes}),
                ))
            }
            NotesQuery::Search { query, limit } => {
                let notes = self.store.search_notes(&query, limit)?;
                let count = notes.len();
                let msg = if count == 0 {
                    Msg::NotesSearchEmpty {
                        query: query.clone(),
                    }
                } else {
                    Msg::NotesSearchFound {
                        query: query.clone(),
                        count,
                    }
                };
                Ok((msg, json!({"count": count, "query": query, "notes": notes})))
            }
            NotesQuery::List { limit, offset } => {
                let notes = self.store.list_notes(limit, offset)?;
                let count = notes.len();
                let msg = if count == 0 {
                    Msg::NotesEmpty
                } else {
                    Msg::NotesFound { count }
                };
                Ok((msg, json!({"count": count, "notes": notes})))
            }
        }
    }

    fn review_random(
        &self,
        limit: usize,
        content_type: Option<String>,
    ) -> Result<(Msg, Value), OperationError> {
        if limit <= 1 {
            return match self.store.random_archive(content_type.as_deref())? {
                Some(archive) => Ok((
                    Msg::ReviewRandom { count: 1 },
                    json!({"type": "random", "archive": archive, "content_type": content_type}),
                )),
                None => Ok((Msg::NoArchives, json!({"count": 0}))),
            };
        }

        // Over-fetch so the shuffle has something to choose from.
        let mut archives = self
            .store
            .list_archives(content_type.as_deref(), limit.saturating_mul(3))?;
        archives.retain(|a| !a.deleted);
        if archives.is_empty() {
            return Ok((Msg::NoArchives, json!({"count": 0})));
        }
        archives.shuffle(&mut rand::thread_rng());
        archives.truncate(limit);
        let count = archives.len();
        Ok((
            Msg::ReviewRandom { count },
            json!({
                "type": "random",
                "archives": archives,
                "count": count,
                "content_type": content_type,
            }),
        ))
    }

    fn review_summary(&self, period: Period) -> Result<(Msg, Value), OperationError> {
        let now = self.clock.now();
        let days = period.days();
        let summary = self.store.activity_summary(now - days * DAY_SECS)?;

        let by_day: HashMap<&str, u64> = summary
            .trend
            .iter()
            .map(|d| (d.date.as_str(), d.count))
            .collect();
        let trend: Vec<DayCount> = (0..days)
            .rev()
            .map(|back| {
                let date = format_date(now - back * DAY_SECS);
                let count = by_day.get(date.as_str()).copied().unwrap_or(0);
                DayCount { date, count }
            })
            .collect();
        let active_days = trend.iter().filter(|d| d.count > 0).count();

        Ok((
            Msg::ReviewSummary {
                period: period.as_str().to_string(),
            },
            json!({
                "type": "summary",
                "period": period.as_str(),
                "summary": {
                    "days": days,
                    "archives": summary.archives,
                    "deleted": summary.deleted,
                    "notes": summary.notes,
                    "trend": trend,
                    "top_tags": summary.top_tags,
                    "active_days": active_days,
                },
            }),
        ))
    }
}

fn format_date(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai_data_cache::tests::ManualClock;
    use crate::storage::{NewArchive, SqliteArchiveStore};

    const NOW: i64 = 1_750_000_000;

    fn executor() -> (Arc<SqliteArchiveStore>, SafeExecutor) {
        let store = Arc::new(SqliteArchiveStore::open_in_memory().unwrap());
        let exec = SafeExecutor::new(store.clone(), Arc::new(ManualClock::new(NOW)));
        (store, exec)
    }

    fn add(store: &SqliteArchiveStore, title: &str, tags: &[&str]) -> i64 {
        store
            .create_archive(&NewArchive {
                content_type: "text".to_string(),
                title: Some(title.to_string()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                created_at: Some(NOW - 60),
                ..NewArchive::default()
            })
            .unwrap()
    }

    #[test]
    fn test_search_with_no_matches_is_success() {
        let (_store, exec) = executor();
        let outcome = exec.execute("search", &json!({"keyword": "xyz"}), Language::En);
        assert!(outcome.success);
        assert_eq!(outcome.data, json!({"count": 0, "results": []}));
        assert!(outcome.message.contains("xyz"));
    }

    #[test]
    fn test_search_requires_keyword() {
        let (_store, exec) = executor();
        let outcome = exec.execute("search", &json!({}), Language::En);
        assert!(!outcome.success);
        assert_eq!(outcome.data, Value::Null);
        assert_eq!(outcome.message, Msg::MissingKeyword.text(Language::En));
    }

    #[test]
    fn test_search_finds_and_reports_count() {
        let (store, exec) = executor();
        add(&store, "rust ownership", &["lang"]);
        add(&store, "rust async", &[]);
        add(&store, "gardening", &[]);

        let outcome = exec.execute("search", &json!({"query": "rust", "limit": "1"}), Language::En);
        assert!(outcome.success);
        assert_eq!(outcome.data["count"], 1);
        assert_eq!(outcome.data["total"], 2);
        assert_eq!(outcome.data["keyword"], "rust");
    }

    #[test]
    fn test_unknown_operation() {
        let (_store, exec) = executor();
        let outcome = exec.execute("explode", &json!({}), Language::ZhHans);
        assert!(!outcome.success);
        assert!(outcome.message.contains("explode"));
    }

    #[test]
    fn test_tags_sorted_by_count() {
        let (store, exec) = executor();
        add(&store, "a", &["x", "y"]);
        add(&store, "b", &["y"]);
        let outcome = exec.execute("tags", &json!({}), Language::En);
        assert_eq!(outcome.data["count"], 2);
        assert_eq!(outcome.data["tags"][0]["tag_name"], "y");
        assert_eq!(outcome.data["tags"][0]["count"], 2);
    }

    #[test]
    fn test_notes_modes() {
        let (store, exec) = executor();
        let id = add(&store, "paper", &[]);
        store.add_note(Some(id), "check figure 2").unwrap();
        store.add_note(None, "standalone").unwrap();

        let for_archive = exec.execute("notes", &json!({"archive_id": id.to_string()}), Language::En);
        assert_eq!(for_archive.data["count"], 1);
        assert_eq!(for_archive.data["archive_id"], id);

        let search = exec.execute("notes", &json!({"query": "figure"}), Language::En);
        assert_eq!(search.data["count"], 1);

        let list = exec.execute("notes", &json!({}), Language::En);
        assert_eq!(list.data["count"], 2);

        let none = exec.execute("notes", &json!({"query": "zzz"}), Language::En);
        assert!(none.success);
        assert_eq!(none.message, Msg::NotesSearchEmpty { query: "zzz".into() }.text(Language::En));
    }

    #[test]
    fn test_review_random_single_and_many() {
        let (store, exec) = executor();
        let empty = exec.execute("review", &json!({}), Language::En);
        assert!(empty.success);
        assert_eq!(empty.data, json!({"count": 0}));

        for i in 0..5 {
            add(&store, &format!("item {}", i), &[]);
        }
        let one = exec.execute("review", &json!({"type": "random"}), Language::En);
        assert_eq!(one.data["type"], "random");
        assert!(one.data["archive"]["id"].is_i64());

        let many = exec.execute("review", &json!({"limit": 3}), Language::En);
        assert_eq!(many.data["count"], 3);
        assert_eq!(many.data["archives"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_review_summary_fills_every_day() {
        let (store, exec) = executor();
        add(&store, "recent", &["t"]);
        let outcome = exec.execute("review", &json!({"type": "summary", "period": "week"}), Language::En);
        assert!(outcome.success);
        let summary = &outcome.data["summary"];
        assert_eq!(summary["days"], 7);
        assert_eq!(summary["archives"], 1);
        assert_eq!(summary["trend"].as_array().unwrap().len(), 7);
        assert_eq!(summary["active_days"], 1);
        assert_eq!(summary["top_tags"][0]["tag_name"], "t");

        let bogus = exec.execute("review", &json!({"type": "graph"}), Language::En);
        assert!(!bogus.success);
    }

    #[test]
    fn test_period_mapping() {
        assert_eq!(Period::parse("today").days(), 1);
        assert_eq!(Period::parse("quarter").days(), 90);
        assert_eq!(Period::parse("YEAR").days(), 365);
        assert_eq!(Period::parse("fortnight"), Period::Month);
    }

    #[test]
    fn test_stats_shape() {
        let (store, exec) = executor();
        add(&store, "a", &["x"]);
        let outcome = exec.execute("stats", &json!({}), Language::En);
        assert_eq!(outcome.data["total_archives"], 1);
        assert_eq!(outcome.data["total_tags"], 1);
        assert_eq!(outcome.data["storage_used"], "0 B");
    }
}
