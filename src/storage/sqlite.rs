//! SQLite-backed archive store.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::store::{
    normalize_tag, ActivitySummary, Archive, ArchiveStore, DayCount, Exclusion, NewArchive, Note,
    SearchPage, SearchQuery, StoreStats, TagCount,
};
use crate::error::{db_err, Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS archives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_type TEXT NOT NULL,
    title TEXT,
    content TEXT,
    file_id TEXT,
    storage_type TEXT NOT NULL DEFAULT 'database',
    storage_path TEXT,
    file_size INTEGER,
    source TEXT,
    favorite INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_name TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS archive_tags (
    archive_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (archive_id, tag_id)
);
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_archives_created ON archives(deleted, created_at);
CREATE INDEX IF NOT EXISTS idx_archive_tags_tag ON archive_tags(tag_id);
CREATE INDEX IF NOT EXISTS idx_notes_archive ON notes(archive_id);
"#;

const ARCHIVE_COLUMNS: &str = "a.id, a.content_type, a.title, a.content, a.file_id, a.storage_type, \
     a.storage_path, a.file_size, a.source, a.favorite, a.deleted, a.created_at";

const NOTE_COLUMNS: &str = "n.id, n.archive_id, n.content, n.created_at, a.title";

/// Archive store over a single SQLite connection.
pub struct SqliteArchiveStore {
    conn: Mutex<Connection>,
}

impl SqliteArchiveStore {
    /// Open (and create if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("sqlite open"))?;
        Self::init(conn)
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("sqlite open"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err("sqlite init"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Every statement leaves the connection usable, so a poisoned lock is safe to reuse.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn archive_from_row(row: &Row<'_>) -> rusqlite::Result<Archive> {
    Ok(Archive {
        id: row.get(0)?,
        content_type: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        file_id: row.get(4)?,
        storage_type: row.get(5)?,
        storage_path: row.get(6)?,
        file_size: row.get(7)?,
        source: row.get(8)?,
        favorite: row.get::<_, i64>(9)? != 0,
        deleted: row.get::<_, i64>(10)? != 0,
        created_at: row.get(11)?,
        tags: Vec::new(),
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        archive_title: row.get(4)?,
    })
}

/// `%keyword%` with LIKE wildcards escaped (escape char `\`).
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `AND ...` predicates hiding archives stored in excluded channels (alias `a`).
fn channel_exclusion_sql(exclusion: &Exclusion, args: &mut Vec<Value>) -> String {
    let mut sql = String::new();
    for channel in &exclusion.channel_ids {
        sql.push_str(" AND (a.storage_path IS NULL OR a.storage_path NOT LIKE ?)");
        args.push(Value::Text(format!("telegram:{}:%", channel)));
    }
    sql
}

/// Extra `AND ...` predicates hiding excluded archives (alias `a`).
fn exclusion_sql(exclusion: &Exclusion, args: &mut Vec<Value>) -> String {
    let mut sql = channel_exclusion_sql(exclusion, args);
    if !exclusion.tags.is_empty() {
        sql.push_str(&format!(
            " AND a.id NOT IN (SELECT xat.archive_id FROM archive_tags xat \
             JOIN tags xt ON xt.id = xat.tag_id WHERE xt.tag_name IN ({}))",
            placeholders(exclusion.tags.len())
        ));
        args.extend(exclusion.tags.iter().map(|t| Value::Text(t.clone())));
    }
    sql
}

/// Drops the excluded tags themselves (alias `t`); their archives still count
/// toward their other tags.
fn excluded_tag_names_sql(exclusion: &Exclusion, args: &mut Vec<Value>) -> String {
    if exclusion.tags.is_empty() {
        return String::new();
    }
    args.extend(exclusion.tags.iter().map(|t| Value::Text(t.clone())));
    format!(
        " AND t.tag_name NOT IN ({})",
        placeholders(exclusion.tags.len())
    )
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

fn query_archives(conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<Archive>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("sqlite prepare archives"))?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), archive_from_row)
        .map_err(db_err("sqlite query archives"))?;
    let mut archives = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("sqlite read archives"))?;
    for archive in &mut archives {
        archive.tags = tags_of(conn, archive.id)?;
    }
    Ok(archives)
}

fn query_notes(conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<Note>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("sqlite prepare notes"))?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), note_from_row)
        .map_err(db_err("sqlite query notes"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("sqlite read notes"))
}

fn query_tag_counts(conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<TagCount>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("sqlite prepare tags"))?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), |row| {
            Ok(TagCount {
                tag_name: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })
        .map_err(db_err("sqlite query tags"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("sqlite read tags"))
}

fn count(conn: &Connection, sql: &str, args: &[Value]) -> Result<u64> {
    let n: i64 = conn
        .query_row(sql, params_from_iter(args.iter()), |row| row.get(0))
        .map_err(db_err("sqlite count"))?;
    Ok(n.max(0) as u64)
}

fn tags_of(conn: &Connection, archive_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.tag_name FROM tags t JOIN archive_tags at ON at.tag_id = t.id \
             WHERE at.archive_id = ?1 ORDER BY t.tag_name",
        )
        .map_err(db_err("sqlite prepare archive tags"))?;
    let rows = stmt
        .query_map(params![archive_id], |row| row.get(0))
        .map_err(db_err("sqlite query archive tags"))?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .map_err(db_err("sqlite read archive tags"))
}

fn is_live_archive(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM archives WHERE id = ?1 AND deleted = 0",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err("sqlite lookup archive"))?;
    Ok(found.is_some())
}

fn link_tag(conn: &Connection, archive_id: i64, tag: &str) -> Result<bool> {
    conn.execute(
        "INSERT OR IGNORE INTO tags (tag_name, created_at) VALUES (?1, ?2)",
        params![tag, now()],
    )
    .map_err(db_err("sqlite insert tag"))?;
    let tag_id: i64 = conn
        .query_row("SELECT id FROM tags WHERE tag_name = ?1", params![tag], |row| {
            row.get(0)
        })
        .map_err(db_err("sqlite lookup tag"))?;
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO archive_tags (archive_id, tag_id) VALUES (?1, ?2)",
            params![archive_id, tag_id],
        )
        .map_err(db_err("sqlite link tag"))?;
    Ok(changed > 0)
}

/// Remove archives (and their notes and tag links) matching `filter`.
fn purge(conn: &Connection, filter: &str, args: &[Value]) -> Result<usize> {
    conn.execute(
        &format!(
            "DELETE FROM notes WHERE archive_id IN (SELECT id FROM archives WHERE {})",
            filter
        ),
        params_from_iter(args.iter()),
    )
    .map_err(db_err("sqlite purge notes"))?;
    conn.execute(
        &format!(
            "DELETE FROM archive_tags WHERE archive_id IN (SELECT id FROM archives WHERE {})",
            filter
        ),
        params_from_iter(args.iter()),
    )
    .map_err(db_err("sqlite purge tag links"))?;
    conn.execute(
        &format!("DELETE FROM archives WHERE {}", filter),
        params_from_iter(args.iter()),
    )
    .map_err(db_err("sqlite purge archives"))
}

impl ArchiveStore for SqliteArchiveStore {
    fn count_archives(&self, exclusion: &Exclusion, created_after: Option<i64>) -> Result<u64> {
        let conn = self.conn();
        let mut args = Vec::new();
        let mut sql = format!(
            "SELECT COUNT(*) FROM archives a WHERE a.deleted = 0{}",
            exclusion_sql(exclusion, &mut args)
        );
        if let Some(after) = created_after {
            sql.push_str(" AND a.created_at > ?");
            args.push(Value::Integer(after));
        }
        count(&conn, &sql, &args)
    }

    fn count_distinct_tags(&self, exclusion: &Exclusion) -> Result<u64> {
        let conn = self.conn();
        let mut args = Vec::new();
        let sql = format!(
            "SELECT COUNT(DISTINCT at.tag_id) FROM archive_tags at \
             JOIN archives a ON a.id = at.archive_id WHERE a.deleted = 0{}",
            exclusion_sql(exclusion, &mut args)
        );
        count(&conn, &sql, &args)
    }

    fn recent_archives(&self, exclusion: &Exclusion, limit: usize) -> Result<Vec<Archive>> {
        let conn = self.conn();
        let mut args = Vec::new();
        let sql = format!(
            "SELECT {} FROM archives a WHERE a.deleted = 0{} \
             ORDER BY a.created_at DESC, a.id DESC LIMIT ?",
            ARCHIVE_COLUMNS,
            exclusion_sql(exclusion, &mut args)
        );
        args.push(limit_value(limit));
        query_archives(&conn, &sql, &args)
    }

    fn tag_usage(&self, exclusion: &Exclusion, limit: usize) -> Result<Vec<TagCount>> {
        let conn = self.conn();
        let mut args = Vec::new();
        let sql = format!(
            "SELECT t.tag_name, COUNT(*) AS cnt FROM tags t \
             JOIN archive_tags at ON at.tag_id = t.id \
             JOIN archives a ON a.id = at.archive_id \
             WHERE a.deleted = 0{}{} \
             GROUP BY t.id ORDER BY cnt DESC, t.tag_name ASC LIMIT ?",
            channel_exclusion_sql(exclusion, &mut args),
            excluded_tag_names_sql(exclusion, &mut args)
        );
        args.push(limit_value(limit));
        query_tag_counts(&conn, &sql, &args)
    }

    fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let conn = self.conn();
        let mut args = Vec::new();
        let mut filter = String::from("a.deleted = 0");

        let keyword = query.keyword.trim();
        if !keyword.is_empty() {
            filter.push_str(
                " AND (a.title LIKE ? ESCAPE '\\' OR a.content LIKE ? ESCAPE '\\' \
                 OR EXISTS (SELECT 1 FROM archive_tags kat JOIN tags kt ON kt.id = kat.tag_id \
                 WHERE kat.archive_id = a.id AND kt.tag_name LIKE ? ESCAPE '\\'))",
            );
            let pattern = like_pattern(keyword);
            for _ in 0..3 {
                args.push(Value::Text(pattern.clone()));
            }
        }
        for tag in &query.tags {
            filter.push_str(
                " AND EXISTS (SELECT 1 FROM archive_tags fat JOIN tags ft ON ft.id = fat.tag_id \
                 WHERE fat.archive_id = a.id AND ft.tag_name = ?)",
            );
            args.push(Value::Text(normalize_tag(tag)));
        }
        if let Some(content_type) = &query.content_type {
            filter.push_str(" AND a.content_type = ?");
            args.push(Value::Text(content_type.clone()));
        }
        filter.push_str(&exclusion_sql(&query.exclusion, &mut args));

        let total = count(
            &conn,
            &format!("SELECT COUNT(*) FROM archives a WHERE {}", filter),
            &args,
        )?;

        let sql = format!(
            "SELECT {} FROM archives a WHERE {} ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?",
            ARCHIVE_COLUMNS, filter
        );
        args.push(limit_value(query.limit));
        args.push(limit_value(query.offset));
        let results = query_archives(&conn, &sql, &args)?;

        Ok(SearchPage { results, total })
    }

    fn get_archive(&self, id: i64) -> Result<Option<Archive>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM archives a WHERE a.id = ?", ARCHIVE_COLUMNS);
        Ok(query_archives(&conn, &sql, &[Value::Integer(id)])?
            .into_iter()
            .next())
    }

    fn random_archive(&self, content_type: Option<&str>) -> Result<Option<Archive>> {
        let conn = self.conn();
        let mut args = Vec::new();
        let mut sql = format!("SELECT {} FROM archives a WHERE a.deleted = 0", ARCHIVE_COLUMNS);
        if let Some(ct) = content_type {
            sql.push_str(" AND a.content_type = ?");
            args.push(Value::Text(ct.to_string()));
        }
        sql.push_str(" ORDER BY RANDOM() LIMIT 1");
        Ok(query_archives(&conn, &sql, &args)?.into_iter().next())
    }

    fn list_archives(&self, content_type: Option<&str>, limit: usize) -> Result<Vec<Archive>> {
        let conn = self.conn();
        let mut args = Vec::new();
        let mut sql = format!("SELECT {} FROM archives a WHERE a.deleted = 0", ARCHIVE_COLUMNS);
        if let Some(ct) = content_type {
            sql.push_str(" AND a.content_type = ?");
            args.push(Value::Text(ct.to_string()));
        }
        sql.push_str(" ORDER BY a.created_at DESC, a.id DESC LIMIT ?");
        args.push(limit_value(limit));
        query_archives(&conn, &sql, &args)
    }

    fn all_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        self.tag_usage(&Exclusion::none(), limit)
    }

    fn store_stats(&self) -> Result<StoreStats> {
        let total_tags = self.count_distinct_tags(&Exclusion::none())?;
        let conn = self.conn();
        let (total_archives, total_size, last_archive): (i64, i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(file_size), 0), MAX(created_at) \
                 FROM archives WHERE deleted = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err("sqlite stats"))?;
        Ok(StoreStats {
            total_archives: total_archives.max(0) as u64,
            total_tags,
            total_size,
            last_archive,
        })
    }

    fn activity_summary(&self, since: i64) -> Result<ActivitySummary> {
        let conn = self.conn();
        let since_arg = [Value::Integer(since)];

        let archives = count(
            &conn,
            "SELECT COUNT(*) FROM archives WHERE deleted = 0 AND created_at >= ?",
            &since_arg,
        )?;
        let deleted = count(
            &conn,
            "SELECT COUNT(*) FROM archives WHERE deleted = 1 AND deleted_at >= ?",
            &since_arg,
        )?;
        let notes = count(
            &conn,
            "SELECT COUNT(*) FROM notes WHERE deleted = 0 AND created_at >= ?",
            &since_arg,
        )?;

        let mut stmt = conn
            .prepare(
                "SELECT date(created_at, 'unixepoch') AS day, COUNT(*) FROM archives \
                 WHERE deleted = 0 AND created_at >= ?1 GROUP BY day ORDER BY day",
            )
            .map_err(db_err("sqlite prepare trend"))?;
        let trend = stmt
            .query_map(params![since], |row| {
                Ok(DayCount {
                    date: row.get(0)?,
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })
            .map_err(db_err("sqlite query trend"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("sqlite read trend"))?;

        let top_tags = query_tag_counts(
            &conn,
            "SELECT t.tag_name, COUNT(*) AS cnt FROM tags t \
             JOIN archive_tags at ON at.tag_id = t.id \
             JOIN archives a ON a.id = at.archive_id \
             WHERE a.deleted = 0 AND a.created_at >= ? \
             GROUP BY t.id ORDER BY cnt DESC, t.tag_name ASC LIMIT 5",
            &since_arg,
        )?;

        Ok(ActivitySummary {
            archives,
            deleted,
            notes,
            trend,
            top_tags,
        })
    }

    fn trash_count(&self) -> Result<u64> {
        let conn = self.conn();
        count(&conn, "SELECT COUNT(*) FROM archives WHERE deleted = 1", &[])
    }

    fn notes_for_archive(&self, archive_id: i64) -> Result<Vec<Note>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM notes n LEFT JOIN archives a ON a.id = n.archive_id \
             WHERE n.deleted = 0 AND n.archive_id = ? ORDER BY n.created_at DESC, n.id DESC",
            NOTE_COLUMNS
        );
        query_notes(&conn, &sql, &[Value::Integer(archive_id)])
    }

    fn search_notes(&self, keyword: &str, limit: usize) -> Result<Vec<Note>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM notes n LEFT JOIN archives a ON a.id = n.archive_id \
             WHERE n.deleted = 0 AND n.content LIKE ? ESCAPE '\\' \
             ORDER BY n.created_at DESC, n.id DESC LIMIT ?",
            NOTE_COLUMNS
        );
        query_notes(
            &conn,
            &sql,
            &[Value::Text(like_pattern(keyword.trim())), limit_value(limit)],
        )
    }

    fn list_notes(&self, limit: usize, offset: usize) -> Result<Vec<Note>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM notes n LEFT JOIN archives a ON a.id = n.archive_id \
             WHERE n.deleted = 0 ORDER BY n.created_at DESC, n.id DESC LIMIT ? OFFSET ?",
            NOTE_COLUMNS
        );
        query_notes(&conn, &sql, &[limit_value(limit), limit_value(offset)])
    }

    fn add_note(&self, archive_id: Option<i64>, content: &str) -> Result<i64> {
        let conn = self.conn();
        if let Some(id) = archive_id {
            if !is_live_archive(&conn, id)? {
                return Err(Error::NotFound(format!("archive {}", id)));
            }
        }
        conn.execute(
            "INSERT INTO notes (archive_id, content, created_at) VALUES (?1, ?2, ?3)",
            params![archive_id, content, now()],
        )
        .map_err(db_err("sqlite insert note"))?;
        Ok(conn.last_insert_rowid())
    }

    fn create_archive(&self, archive: &NewArchive) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err("sqlite begin"))?;
        tx.execute(
            "INSERT INTO archives (content_type, title, content, file_id, storage_type, \
             storage_path, file_size, source, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                archive.content_type,
                archive.title,
                archive.content,
                archive.file_id,
                archive.storage_type.as_deref().unwrap_or("database"),
                archive.storage_path,
                archive.file_size,
                archive.source,
                archive.created_at.unwrap_or_else(now),
            ],
        )
        .map_err(db_err("sqlite insert archive"))?;
        let id = tx.last_insert_rowid();
        for tag in &archive.tags {
            let tag = normalize_tag(tag);
            if !tag.is_empty() {
                link_tag(&tx, id, &tag)?;
            }
        }
        tx.commit().map_err(db_err("sqlite commit"))?;
        Ok(id)
    }

    fn move_to_trash(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE archives SET deleted = 1, deleted_at = ?1 WHERE id = ?2 AND deleted = 0",
                params![now(), id],
            )
            .map_err(db_err("sqlite trash archive"))?;
        Ok(changed > 0)
    }

    fn restore_archive(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE archives SET deleted = 0, deleted_at = NULL WHERE id = ?1 AND deleted = 1",
                params![id],
            )
            .map_err(db_err("sqlite restore archive"))?;
        Ok(changed > 0)
    }

    fn delete_permanently(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err("sqlite begin"))?;
        let removed = purge(&tx, "id = ? AND deleted = 1", &[Value::Integer(id)])?;
        tx.commit().map_err(db_err("sqlite commit"))?;
        Ok(removed > 0)
    }

    fn empty_trash(&self) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err("sqlite begin"))?;
        let removed = purge(&tx, "deleted = 1", &[])?;
        tx.commit().map_err(db_err("sqlite commit"))?;
        Ok(removed)
    }

    fn add_tag(&self, archive_id: i64, tag: &str) -> Result<bool> {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return Err(Error::InvalidParams("empty tag name".to_string()));
        }
        let conn = self.conn();
        if !is_live_archive(&conn, archive_id)? {
            return Err(Error::NotFound(format!("archive {}", archive_id)));
        }
        link_tag(&conn, archive_id, &tag)
    }

    fn remove_tag(&self, archive_id: i64, tag: &str) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "DELETE FROM archive_tags WHERE archive_id = ?1 \
                 AND tag_id = (SELECT id FROM tags WHERE tag_name = ?2)",
                params![archive_id, normalize_tag(tag)],
            )
            .map_err(db_err("sqlite unlink tag"))?;
        Ok(changed > 0)
    }

    fn toggle_favorite(&self, archive_id: i64) -> Result<Option<bool>> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE archives SET favorite = 1 - favorite WHERE id = ?1 AND deleted = 0",
                params![archive_id],
            )
            .map_err(db_err("sqlite toggle favorite"))?;
        if changed == 0 {
            return Ok(None);
        }
        let favorite: i64 = conn
            .query_row(
                "SELECT favorite FROM archives WHERE id = ?1",
                params![archive_id],
                |row| row.get(0),
            )
            .map_err(db_err("sqlite read favorite"))?;
        Ok(Some(favorite != 0))
    }
}
