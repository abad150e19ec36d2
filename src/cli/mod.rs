//! CLI commands for archivebot using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::ai::render;
use crate::ai::{ChatReply, TurnContext};
use crate::app::App;
use crate::config::{get_settings_path, load_settings_or_default};
use crate::storage::SearchQuery;

/// archivebot - personal Telegram archive with an AI assistant.
#[derive(Parser)]
#[command(name = "archivebot")]
#[command(version)]
#[command(about = "archivebot - personal Telegram archive with an AI assistant", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Telegram bot
    Start,

    /// Ask the assistant one question from the terminal
    Chat {
        /// Message to send
        message: String,

        /// Reply language (en, zh-CN, zh-TW); defaults to the configured one
        #[arg(long)]
        lang: Option<String>,
    },

    /// Show archive statistics
    Stats,

    /// Search archives
    Search {
        /// Query; words starting with # filter by tag
        query: String,

        /// Max results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show the AI data cache state
    CacheInfo,

    /// Show, restore from or empty the trash
    Trash {
        /// Permanently delete everything in the trash
        #[arg(long, conflicts_with_all = ["restore", "purge"])]
        empty: bool,

        /// Move a trashed archive back
        #[arg(long, value_name = "ID", conflicts_with = "purge")]
        restore: Option<i64>,

        /// Permanently delete one trashed archive
        #[arg(long, value_name = "ID")]
        purge: Option<i64>,
    },

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings (secrets masked)
    Show,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Start => cmd_start().await,
            Command::Chat { message, lang } => cmd_chat(message, lang.as_deref()).await,
            Command::Stats => cmd_stats(),
            Command::Search { query, limit } => cmd_search(query, *limit),
            Command::CacheInfo => cmd_cache_info(),
            Command::Trash {
                empty,
                restore,
                purge,
            } => cmd_trash(*empty, *restore, *purge),
            Command::Config(ConfigCommand::Show) => cmd_config_show(),
        }
    }
}

fn build_app() -> Result<App> {
    Ok(App::build(load_settings_or_default())?)
}

// Command implementations

async fn cmd_start() -> Result<()> {
    use crate::telegram::run_telegram_daemon;

    println!("Starting archivebot...");
    let app = Arc::new(build_app()?);
    run_telegram_daemon(app).await?;
    Ok(())
}

async fn cmd_chat(message: &str, lang: Option<&str>) -> Result<()> {
    let app = build_app()?;
    let language = lang
        .map(crate::ai::Language::from_code)
        .unwrap_or_else(|| app.language());
    let ctx = TurnContext::new(0, 0, language);

    match app.router.handle(message, &ctx).await {
        ChatReply::Text(text) => println!("{}", text),
        ChatReply::ResourceSent => println!("(media delivered)"),
    }
    Ok(())
}

fn cmd_stats() -> Result<()> {
    let app = build_app()?;
    let stats = app.store.store_stats()?;
    let cached = app.cache.get_statistics();

    println!("Archives:     {}", stats.total_archives);
    println!("Tags:         {}", stats.total_tags);
    println!("This week:    {}", cached.recent_week);
    println!("Storage:      {}", render::format_size(stats.total_size));
    println!("In trash:     {}", app.store.trash_count()?);
    println!(
        "Last archive: {}",
        stats
            .last_archive
            .map(render::format_timestamp)
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}

fn cmd_search(query: &str, limit: usize) -> Result<()> {
    let app = build_app()?;
    let page = app.store.search(&SearchQuery::parse(query, limit.max(1)))?;

    if page.results.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }
    println!("{} of {} results:", page.results.len(), page.total);
    for archive in &page.results {
        let tags = archive
            .tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  #{:<6} {} {} {}",
            archive.id,
            render::content_icon(&archive.content_type),
            archive.display_title(60),
            tags
        );
    }
    Ok(())
}

fn cmd_cache_info() -> Result<()> {
    let app = build_app()?;
    // A fresh process starts cold; warm every entry so ages are meaningful.
    app.cache.get_statistics();
    app.cache.get_recent_samples(10);
    app.cache.get_tag_analysis(15);

    let info = app.cache.cache_info();
    println!("AI data cache: {}/{} entries", info.size, info.capacity);
    for entry in &info.entries {
        println!(
            "  {:<15} age={}s ttl={}s{}",
            entry.key.as_str(),
            entry.age_secs,
            entry.ttl_secs,
            if entry.expired { " (expired)" } else { "" }
        );
    }
    let stats = app.cache.get_statistics();
    println!(
        "\nstatistics: total={} tags={} recent_week={}",
        stats.total, stats.tags, stats.recent_week
    );
    Ok(())
}

fn cmd_trash(empty: bool, restore: Option<i64>, purge: Option<i64>) -> Result<()> {
    let app = build_app()?;
    if let Some(id) = restore {
        if app.manager.restore_archive(id)? {
            println!("Restored archive #{}", id);
        } else {
            anyhow::bail!("archive #{} is not in the trash", id);
        }
        return Ok(());
    }
    if let Some(id) = purge {
        if app.manager.delete_permanently(id)? {
            println!("Permanently deleted archive #{}", id);
        } else {
            anyhow::bail!("archive #{} is not in the trash", id);
        }
        return Ok(());
    }

    let count = app.store.trash_count()?;
    if !empty {
        println!("{} archives in trash", count);
        if count > 0 {
            println!("Run `archivebot trash --restore <id>` to bring one back,");
            println!("or `archivebot trash --empty` to delete them permanently.");
        }
        return Ok(());
    }
    let removed = app.manager.empty_trash()?;
    println!("Permanently deleted {} archives", removed);
    Ok(())
}

fn mask(secret: &Option<String>) -> String {
    match secret.as_deref() {
        Some(s) if s.chars().count() > 8 => {
            let head: String = s.chars().take(4).collect();
            format!("{}…", head)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}

fn cmd_config_show() -> Result<()> {
    let mut settings = load_settings_or_default();
    settings.telegram.bot_token = Some(mask(&settings.telegram.bot_token));
    settings.ai.api.api_key = Some(mask(&settings.ai.api.api_key));

    if let Ok(path) = get_settings_path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
