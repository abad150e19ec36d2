//! Telegram bot commands.

use serde_json::{json, Value};

use crate::ai::render::{self, DirectView};
use crate::ai::{Language, Msg, OperationOutcome};
use crate::app::App;
use crate::storage::Archive;

pub const HELP_TEXT: &str = r#"archivebot commands:

/help - Show this help
/stats - Archive statistics
/search <query> - Search archives (#tag filters by tag)
/tags - Most used tags
/review - A random archive
/trash - Show trash size
/restore <id> - Bring an archive back from the trash
/purge <id> - Permanently delete one archive from the trash
/emptytrash - Empty the trash (asks for confirmation)
/delete <id> - Move an archive to trash (asks for confirmation)
/confirm <id> - Confirm a pending action
/cancel <id> - Cancel a pending action

Anything else you send is archived. Short questions go to the assistant."#;

/// Commands shown in the Telegram menu.
pub const MENU: &[(&str, &str)] = &[
    ("help", "Show help"),
    ("stats", "Archive statistics"),
    ("search", "Search archives"),
    ("tags", "Most used tags"),
    ("review", "A random archive"),
    ("trash", "Show trash size"),
    ("restore", "Restore an archive from trash"),
    ("purge", "Delete a trashed archive permanently"),
    ("emptytrash", "Empty the trash"),
    ("delete", "Move an archive to trash"),
    ("confirm", "Confirm a pending action"),
    ("cancel", "Cancel a pending action"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    Start,
    Help,
    Stats,
    Search(String),
    Tags,
    Review,
    Trash,
    Restore(Option<i64>),
    Purge(Option<i64>),
    EmptyTrash,
    Delete(Option<i64>),
    Confirm(String),
    Cancel(String),
    Unknown(String),
}

/// What to send back.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Text(String),
    /// A single archive, delivered as media when possible.
    Archive(Archive),
}

fn archive_id_arg(args: &str) -> Option<i64> {
    args.trim_start_matches('#').parse().ok()
}

/// Parse `/cmd[@bot] args`. Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    let cmd = match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "stats" | "status" => BotCommand::Stats,
        "search" => BotCommand::Search(args.to_string()),
        "tags" => BotCommand::Tags,
        "review" | "random" => BotCommand::Review,
        "trash" => BotCommand::Trash,
        "restore" => BotCommand::Restore(archive_id_arg(args)),
        "purge" => BotCommand::Purge(archive_id_arg(args)),
        "emptytrash" => BotCommand::EmptyTrash,
        "delete" => BotCommand::Delete(archive_id_arg(args)),
        "confirm" => BotCommand::Confirm(args.to_string()),
        "cancel" => BotCommand::Cancel(args.to_string()),
        other => BotCommand::Unknown(other.to_string()),
    };
    Some(cmd)
}

/// Wrap an executor outcome the way `execute_command` does, so the same
/// renderer applies.
fn view_of(operation_type: &str, outcome: &OperationOutcome) -> Option<DirectView> {
    render::recognize(&json!({
        "success": outcome.success,
        "operation_type": operation_type,
        "message": outcome.message,
        "data": outcome.data,
    }))
}

fn reply_for(view: DirectView, lang: Language) -> CommandReply {
    match view {
        DirectView::Archive(archive) => CommandReply::Archive(archive),
        DirectView::Archives(mut archives) if archives.len() == 1 => {
            CommandReply::Archive(archives.remove(0))
        }
        DirectView::Archives(archives) => CommandReply::Text(render::archive_list(&archives, lang)),
        DirectView::Notes(notes) => CommandReply::Text(render::note_list(&notes, lang)),
        DirectView::Tags(tags) => CommandReply::Text(render::tag_list(&tags, lang)),
        DirectView::Message(message) => CommandReply::Text(message),
    }
}

fn run_operation(app: &App, operation_type: &str, params: Value, lang: Language) -> CommandReply {
    let outcome = app.safe.execute(operation_type, &params, lang);
    match view_of(operation_type, &outcome) {
        Some(view) => reply_for(view, lang),
        None => CommandReply::Text(outcome.message),
    }
}

fn stats_text(app: &App, lang: Language) -> String {
    let stats = match app.store.store_stats() {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Failed to read statistics: {}", e);
            return Msg::StatsFailed.text(lang);
        }
    };
    Msg::StatsReport {
        archives: stats.total_archives,
        tags: stats.total_tags,
        recent_week: app.cache.get_statistics().recent_week,
        storage: render::format_size(stats.total_size),
        trash: app.store.trash_count().unwrap_or(0),
        last_archive: stats.last_archive.map(render::format_timestamp),
    }
    .text(lang)
}

fn trash_mutation(
    result: crate::error::Result<bool>,
    done: Msg,
    missing: Msg,
    lang: Language,
) -> CommandReply {
    match result {
        Ok(true) => CommandReply::Text(done.text(lang)),
        Ok(false) => CommandReply::Text(missing.text(lang)),
        Err(e) => CommandReply::Text(Msg::ExecutionError { error: e.to_string() }.text(lang)),
    }
}

fn request_confirmation(
    app: &App,
    user_id: i64,
    action_type: &str,
    params: Value,
    description: String,
    lang: Language,
) -> CommandReply {
    match app
        .pending
        .create(user_id, action_type, params, lang, &description)
    {
        Ok(pending) => CommandReply::Text(
            Msg::ConfirmPrompt {
                description: pending.description,
                confirmation_id: pending.confirmation_id,
            }
            .text(lang),
        ),
        Err(e) => CommandReply::Text(e.to_string()),
    }
}

/// Run a command for `user_id`.
pub fn run_command(app: &App, user_id: i64, cmd: BotCommand, lang: Language) -> CommandReply {
    tracing::debug!(user_id, command = ?cmd, "telegram command");
    match cmd {
        BotCommand::Start | BotCommand::Help => CommandReply::Text(HELP_TEXT.to_string()),
        BotCommand::Stats => CommandReply::Text(stats_text(app, lang)),
        BotCommand::Search(query) if query.is_empty() => {
            CommandReply::Text("Usage: /search <query>".to_string())
        }
        BotCommand::Search(query) => {
            run_operation(app, "search", json!({"keyword": query, "limit": 10}), lang)
        }
        BotCommand::Tags => run_operation(app, "tags", json!({"limit": 20}), lang),
        BotCommand::Review => run_operation(app, "review", json!({"type": "random"}), lang),
        BotCommand::Trash => match app.store.trash_count() {
            Ok(0) => CommandReply::Text(Msg::TrashEmpty.text(lang)),
            Ok(count) => CommandReply::Text(Msg::TrashCount { count }.text(lang)),
            Err(e) => CommandReply::Text(Msg::ExecutionError { error: e.to_string() }.text(lang)),
        },
        BotCommand::Restore(None) => CommandReply::Text("Usage: /restore <archive id>".to_string()),
        BotCommand::Restore(Some(archive_id)) => trash_mutation(
            app.manager.restore_archive(archive_id),
            Msg::ArchiveRestored { archive_id },
            Msg::RestoreFailed { archive_id },
            lang,
        ),
        BotCommand::Purge(None) => CommandReply::Text("Usage: /purge <archive id>".to_string()),
        BotCommand::Purge(Some(archive_id)) => trash_mutation(
            app.manager.delete_permanently(archive_id),
            Msg::ArchivePurged { archive_id },
            Msg::PurgeFailed { archive_id },
            lang,
        ),
        BotCommand::EmptyTrash => {
            let count = app.store.trash_count().unwrap_or(0);
            if count == 0 {
                return CommandReply::Text(Msg::TrashEmpty.text(lang));
            }
            request_confirmation(
                app,
                user_id,
                "clear_trash",
                json!({}),
                format!("Permanently delete {} archives in trash", count),
                lang,
            )
        }
        BotCommand::Delete(None) => CommandReply::Text("Usage: /delete <archive id>".to_string()),
        BotCommand::Delete(Some(archive_id)) => match app.store.get_archive(archive_id) {
            Ok(Some(archive)) if !archive.deleted => request_confirmation(
                app,
                user_id,
                "delete_archive",
                json!({"archive_id": archive_id}),
                format!("Move #{} \"{}\" to trash", archive_id, archive.display_title(40)),
                lang,
            ),
            Ok(_) => CommandReply::Text(Msg::ArchiveNotFound { archive_id }.text(lang)),
            Err(e) => CommandReply::Text(format!("Failed to read archive: {}", e)),
        },
        BotCommand::Confirm(id) => match app.pending.confirm(user_id, &id) {
            Some(pending) => CommandReply::Text(app.actions.execute_pending(&pending).message),
            None => CommandReply::Text(Msg::NoPendingAction.text(lang)),
        },
        BotCommand::Cancel(id) => {
            if app.pending.cancel(user_id, &id) {
                CommandReply::Text(Msg::ActionCancelled.text(lang))
            } else {
                CommandReply::Text(Msg::NoPendingAction.text(lang))
            }
        }
        BotCommand::Unknown(name) => CommandReply::Text(format!(
            "Unknown command /{}. Send /help for available commands.",
            name
        )),
    }
}
