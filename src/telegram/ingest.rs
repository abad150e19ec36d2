//! Decide what an incoming message is: something to archive, or a question
//! for the assistant.

use regex::Regex;

use crate::storage::{normalize_tag, truncate_chars, NewArchive};

const TITLE_CHARS: usize = 80;

/// A media attachment, already reduced to what the archive needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub content_type: &'static str,
    pub file_id: String,
    pub file_size: Option<i64>,
    pub file_name: Option<String>,
}

/// The parts of a Telegram message that matter for archiving.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingMessage {
    /// Message text, or the caption of a media message.
    pub text: String,
    pub attachment: Option<Attachment>,
    /// Name of the original sender or channel for forwarded messages.
    pub forwarded_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Archive(NewArchive),
    Chat(String),
    Ignore,
}

/// Archiving and chat thresholds.
#[derive(Debug, Clone, Copy)]
pub struct IngestRules {
    pub chat_enabled: bool,
    pub short_text_threshold: usize,
}

fn tag_regex() -> Option<Regex> {
    match Regex::new(r"(?:^|\s)#([\p{L}\p{N}_]+)") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("invalid tag pattern: {}", e);
            None
        }
    }
}

fn link_regex() -> Option<Regex> {
    Regex::new(r"https?://\S+").ok()
}

/// `#tags` in order of appearance, lowercased and deduplicated.
pub fn extract_tags(text: &str) -> Vec<String> {
    let Some(re) = tag_regex() else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::new();
    for cap in re.captures_iter(text) {
        let tag = normalize_tag(&cap[1]).to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn first_link(text: &str) -> Option<String> {
    link_regex()?.find(text).map(|m| m.as_str().to_string())
}

fn title_from(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| truncate_chars(l, TITLE_CHARS))
}

/// Classify a message.
pub fn classify(msg: IncomingMessage, rules: IngestRules) -> Incoming {
    let text = msg.text.trim().to_string();
    let tags = extract_tags(&text);

    if let Some(att) = msg.attachment {
        let title = title_from(&text).or(att.file_name.clone());
        return Incoming::Archive(NewArchive {
            content_type: att.content_type.to_string(),
            title,
            content: (!text.is_empty()).then_some(text),
            file_id: Some(att.file_id),
            file_size: att.file_size,
            source: msg.forwarded_from,
            tags,
            ..NewArchive::default()
        });
    }

    if text.is_empty() {
        return Incoming::Ignore;
    }

    let link = first_link(&text);
    let is_short = text.chars().count() < rules.short_text_threshold;
    if rules.chat_enabled && is_short && link.is_none() && msg.forwarded_from.is_none() && tags.is_empty() {
        return Incoming::Chat(text);
    }

    let (content_type, title) = match &link {
        Some(url) => ("link", title_from(&text.replace(url.as_str(), "")).or(Some(url.clone()))),
        None => ("text", title_from(&text)),
    };
    Incoming::Archive(NewArchive {
        content_type: content_type.to_string(),
        title,
        content: Some(text),
        source: msg.forwarded_from.or(link),
        tags,
        ..NewArchive::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: IngestRules = IngestRules {
        chat_enabled: true,
        short_text_threshold: 50,
    };

    fn text(t: &str) -> IncomingMessage {
        IncomingMessage {
            text: t.to_string(),
            ..IncomingMessage::default()
        }
    }

    #[test]
    fn test_extract_tags() {
        assert_eq!(
            extract_tags("#Rust notes on #async and #rust again, not a#tag"),
            vec!["rust".to_string(), "async".to_string()]
        );
        assert_eq!(extract_tags("中文 #学习"), vec!["学习".to_string()]);
    }

    #[test]
    fn test_short_text_goes_to_chat() {
        assert_eq!(classify(text("how many archives?"), RULES), Incoming::Chat("how many archives?".into()));

        let disabled = IngestRules {
            chat_enabled: false,
            ..RULES
        };
        assert!(matches!(classify(text("how many archives?"), disabled), Incoming::Archive(_)));
    }

    #[test]
    fn test_long_text_and_links_are_archived() {
        let long = "a".repeat(60);
        match classify(text(&long), RULES) {
            Incoming::Archive(a) => assert_eq!(a.content_type, "text"),
            other => panic!("unexpected {:?}", other),
        }

        match classify(text("read https://example.com/post later #web"), RULES) {
            Incoming::Archive(a) => {
                assert_eq!(a.content_type, "link");
                assert_eq!(a.source.as_deref(), Some("https://example.com/post"));
                assert_eq!(a.tags, vec!["web".to_string()]);
                assert_eq!(a.title.as_deref(), Some("read  later #web"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_forwarded_and_media() {
        let forwarded = IncomingMessage {
            text: "hi".to_string(),
            forwarded_from: Some("Rust News".to_string()),
            ..IncomingMessage::default()
        };
        match classify(forwarded, RULES) {
            Incoming::Archive(a) => assert_eq!(a.source.as_deref(), Some("Rust News")),
            other => panic!("unexpected {:?}", other),
        }

        let photo = IncomingMessage {
            text: String::new(),
            attachment: Some(Attachment {
                content_type: "photo",
                file_id: "AgAD".to_string(),
                file_size: Some(2048),
                file_name: None,
            }),
            forwarded_from: None,
        };
        match classify(photo, RULES) {
            Incoming::Archive(a) => {
                assert_eq!(a.content_type, "photo");
                assert_eq!(a.file_id.as_deref(), Some("AgAD"));
                assert_eq!(a.content, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(classify(text("   "), RULES), Incoming::Ignore);
    }
}
