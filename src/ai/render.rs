//! Direct rendering of structured tool results.
//!
//! When a single tool call already produced archives, notes or tags, the
//! router formats them here instead of paying for a second LLM round trip.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::i18n::{Language, Msg};
use crate::error::Result;
use crate::storage::{truncate_chars, Archive, Note, TagCount};

const LIST_TITLE_CHARS: usize = 60;
const DETAIL_CONTENT_CHARS: usize = 500;
const CAPTION_CHARS: usize = 1024;
const NOTE_EXCERPT_CHARS: usize = 80;
const MAX_TAG_LINES: usize = 10;

/// Delivers a stored media archive to a chat.
#[async_trait]
pub trait ResourceSender: Send + Sync {
    async fn send_archive(&self, chat_id: i64, archive: &Archive, caption: &str) -> Result<()>;
}

/// A tool result the router can answer with directly.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectView {
    Archive(Archive),
    Archives(Vec<Archive>),
    Notes(Vec<Note>),
    Tags(Vec<TagCount>),
    /// Nothing found; the tool's own message says so.
    Message(String),
}

fn list_at<T: DeserializeOwned>(value: &Value, key: &str) -> Option<Vec<T>> {
    let items = value.get(key)?;
    if !items.is_array() {
        return None;
    }
    serde_json::from_value(items.clone()).ok()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Recognize a renderable shape in a tool result.
pub fn recognize(result: &Value) -> Option<DirectView> {
    if result.get("operation_type").is_some() || result.get("command").is_some() {
        return recognize_operation(result);
    }

    for key in ["archives", "results"] {
        if let Some(archives) = list_at::<Archive>(result, key).and_then(non_empty) {
            return Some(DirectView::Archives(archives));
        }
    }
    if let Some(notes) = list_at::<Note>(result, "notes").and_then(non_empty) {
        return Some(DirectView::Notes(notes));
    }
    if let Some(tags) = list_at::<TagCount>(result, "tags").and_then(non_empty) {
        return Some(DirectView::Tags(tags));
    }
    None
}

fn recognize_operation(result: &Value) -> Option<DirectView> {
    if result.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let op = result
        .get("operation_type")
        .or_else(|| result.get("command"))
        .and_then(Value::as_str)?;
    let data = result.get("data")?;
    let message = || {
        result
            .get("message")
            .and_then(Value::as_str)
            .map(|m| DirectView::Message(m.to_string()))
    };

    match op {
        "search" => match list_at::<Archive>(data, "results")? {
            archives if archives.is_empty() => message(),
            archives => Some(DirectView::Archives(archives)),
        },
        "notes" => match list_at::<Note>(data, "notes")? {
            notes if notes.is_empty() => message(),
            notes => Some(DirectView::Notes(notes)),
        },
        "tags" => match list_at::<TagCount>(data, "tags")? {
            tags if tags.is_empty() => message(),
            tags => Some(DirectView::Tags(tags)),
        },
        "review" => {
            if data.get("type").and_then(Value::as_str) != Some("random") {
                return if data.get("count").and_then(Value::as_u64) == Some(0) {
                    message()
                } else {
                    None
                };
            }
            if let Some(archive) = data.get("archive") {
                return serde_json::from_value(archive.clone())
                    .ok()
                    .map(DirectView::Archive);
            }
            match list_at::<Archive>(data, "archives")? {
                archives if archives.is_empty() => message(),
                archives => Some(DirectView::Archives(archives)),
            }
        }
        _ => None,
    }
}

pub fn content_icon(content_type: &str) -> &'static str {
    match content_type {
        "text" => "📝",
        "link" => "🔗",
        "image" | "photo" => "🖼",
        "video" => "🎬",
        "audio" | "voice" => "🎵",
        "document" | "file" => "📄",
        "ebook" => "📚",
        _ => "📦",
    }
}

fn tag_line(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbered archive list under a count header.
pub fn archive_list(archives: &[Archive], lang: Language) -> String {
    let mut out = Msg::ArchivesHeader {
        count: archives.len(),
    }
    .text(lang);
    for (i, archive) in archives.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} {} (#{})",
            i + 1,
            content_icon(&archive.content_type),
            archive.display_title(LIST_TITLE_CHARS),
            archive.id
        ));
        if !archive.tags.is_empty() {
            out.push_str(&format!("\n   {}", tag_line(&archive.tags)));
        }
    }
    out
}

/// Full text rendering of one archive and its notes.
pub fn archive_detail(archive: &Archive, notes: &[Note], lang: Language) -> String {
    let mut out = format!(
        "{} {}",
        content_icon(&archive.content_type),
        archive.display_title(LIST_TITLE_CHARS)
    );
    if let Some(content) = archive.content.as_deref().filter(|c| !c.trim().is_empty()) {
        let excerpt = truncate_chars(content.trim(), DETAIL_CONTENT_CHARS);
        if Some(excerpt.as_str()) != archive.title.as_deref() {
            out.push_str("\n\n");
            out.push_str(&excerpt);
            if content.trim().chars().count() > DETAIL_CONTENT_CHARS {
                out.push('…');
            }
        }
    }
    out.push('\n');
    if !archive.tags.is_empty() {
        out.push_str(&format!("\n🏷 {}", tag_line(&archive.tags)));
    }
    if archive.created_at > 0 {
        out.push_str(&format!("\n🕒 {}", format_timestamp(archive.created_at)));
    }
    out.push_str(&format!("\n🆔 #{}", archive.id));
    if !notes.is_empty() {
        out.push_str(&format!("\n\n📝 {}:", Msg::NotesLabel.text(lang)));
        for note in notes {
            out.push_str(&format!("\n- {}", note.content));
        }
    }
    out
}

/// Caption sent along with a media archive.
pub fn archive_caption(archive: &Archive) -> String {
    let mut caption = archive.display_title(LIST_TITLE_CHARS);
    if !archive.tags.is_empty() {
        caption.push_str("\n\n");
        caption.push_str(&tag_line(&archive.tags));
    }
    caption.push_str(&format!("\n🆔 #{}", archive.id));
    truncate_chars(&caption, CAPTION_CHARS)
}

pub fn note_list(notes: &[Note], lang: Language) -> String {
    let mut out = Msg::NotesHeader { count: notes.len() }.text(lang);
    for (i, note) in notes.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}",
            i + 1,
            truncate_chars(note.content.trim(), NOTE_EXCERPT_CHARS)
        ));
        if let Some(archive_id) = note.archive_id {
            out.push_str(&format!(" (#{})", archive_id));
        }
    }
    out
}

pub fn note_detail(note: &Note) -> String {
    let mut out = format!("📝 {}", note.content.trim());
    if let Some(archive_id) = note.archive_id {
        match note.archive_title.as_deref() {
            Some(title) => out.push_str(&format!("\n\n📎 {} (#{})", title, archive_id)),
            None => out.push_str(&format!("\n\n📎 #{}", archive_id)),
        }
    }
    if note.created_at > 0 {
        out.push_str(&format!("\n🕒 {}", format_timestamp(note.created_at)));
    }
    out
}

/// Tag list, at most ten lines.
pub fn tag_list(tags: &[TagCount], lang: Language) -> String {
    let mut out = Msg::TagsHeader { count: tags.len() }.text(lang);
    for tag in tags.iter().take(MAX_TAG_LINES) {
        out.push_str(&format!("\n#{} ({})", tag.tag_name, tag.count));
    }
    out
}

/// Human-readable byte size.
pub fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes.max(0))
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// UTC `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
