//! Configuration loading for archivebot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Settings shared between the bot, the AI data cache and the CLI.
///
/// The exclusion block is read through this handle on every cache recompute,
/// so edits made at runtime take effect without rebuilding anything.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Wrap settings for sharing.
pub fn shared(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Get the archivebot home directory (~/.archivebot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".archivebot"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.archivebot/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from an explicit path, then apply environment overrides.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut settings: Settings = serde_json::from_str(&content)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
        settings
    })
}

/// Environment variables win over the file. The lookup is injected so tests
/// don't have to touch the process environment.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("ARCHIVEBOT_BOT_TOKEN") {
        settings.telegram.bot_token = Some(token);
    }
    if let Some(owner) = lookup("ARCHIVEBOT_OWNER_ID").and_then(|v| v.trim().parse().ok()) {
        settings.telegram.owner_id = Some(owner);
    }
    if let Some(key) = lookup("AI_API_KEY") {
        settings.ai.api.api_key = Some(key);
    }
    if let Some(url) = lookup("AI_API_URL") {
        settings.ai.api.api_url = url;
    }
    if let Some(model) = lookup("AI_MODEL") {
        settings.ai.api.model = model;
    }
    if let Some(channels) = lookup("AI_EXCLUDE_CHANNELS") {
        settings.ai.exclude_from_context.channel_ids = split_list(&channels)
            .filter_map(|v| v.parse().ok())
            .collect();
    }
    if let Some(tags) = lookup("AI_EXCLUDE_TAGS") {
        settings.ai.exclude_from_context.tags = split_list(&tags).map(str::to_string).collect();
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    let api = &settings.ai.api;
    if !(0.0..=2.0).contains(&api.temperature) {
        return Err(Error::Config(format!(
            "ai.api.temperature must be between 0 and 2, got {}",
            api.temperature
        )));
    }
    if api.timeout_secs == 0 {
        return Err(Error::Config("ai.api.timeout_secs must be positive".to_string()));
    }
    if settings.ai.cache_capacity == 0 {
        return Err(Error::Config("ai.cache_capacity must be positive".to_string()));
    }
    Ok(())
}

/// Telegram configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Only this user may talk to the bot when set.
    pub owner_id: Option<u64>,
    /// Channel that media archives are copied into.
    pub storage_channel_id: Option<i64>,
}

/// Database configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Configured path, or ~/.archivebot/archive.db.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join("archive.db")),
        }
    }
}

/// Chat-completion endpoint configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "grok-4-1-fast-non-reasoning".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Content hidden from the assistant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExclusionConfig {
    #[serde(default)]
    pub channel_ids: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Also apply the exclusion to statistics and search results.
    #[serde(default = "default_true", alias = "apply_to_ai_interactions")]
    pub apply_to_interactions: bool,
}

impl ExclusionConfig {
    pub fn is_empty(&self) -> bool {
        self.channel_ids.is_empty() && self.tags.is_empty()
    }
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            channel_ids: Vec::new(),
            tags: Vec::new(),
            apply_to_interactions: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// AI assistant configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AiConfig {
    #[serde(default = "default_true")]
    pub chat_enabled: bool,
    /// Plain text shorter than this is treated as a chat message, not an archive.
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: usize,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub exclude_from_context: ExclusionConfig,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_short_text_threshold() -> usize {
    50
}

fn default_cache_capacity() -> usize {
    10
}

fn default_session_ttl_secs() -> u64 {
    600
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            chat_enabled: default_true(),
            short_text_threshold: default_short_text_threshold(),
            api: ApiConfig::default(),
            exclude_from_context: ExclusionConfig::default(),
            cache_capacity: default_cache_capacity(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// archivebot settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub ai: AiConfig,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            database: DatabaseConfig::default(),
            language: default_language(),
            ai: AiConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{}").unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.language, "en");
        assert_eq!(settings.ai.cache_capacity, 10);
        assert_eq!(settings.ai.api.timeout_secs, 15);
        assert!(settings.ai.exclude_from_context.apply_to_interactions);
        assert!(settings.ai.exclude_from_context.is_empty());
    }

    #[test]
    fn test_exclusion_block_parses_legacy_flag_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"ai": {"exclude_from_context": {
                "channel_ids": [-1001],
                "tags": ["private"],
                "apply_to_ai_interactions": false
            }}}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        let exclusion = &settings.ai.exclude_from_context;
        assert_eq!(exclusion.channel_ids, vec![-1001]);
        assert_eq!(exclusion.tags, vec!["private".to_string()]);
        assert!(!exclusion.apply_to_interactions);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AI_API_KEY", "secret"),
            ("ARCHIVEBOT_OWNER_ID", "42"),
            ("AI_EXCLUDE_CHANNELS", "-100, -200,bad"),
            ("AI_EXCLUDE_TAGS", "private, ,diary"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.ai.api.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.telegram.owner_id, Some(42));
        assert_eq!(settings.ai.exclude_from_context.channel_ids, vec![-100, -200]);
        assert_eq!(
            settings.ai.exclude_from_context.tags,
            vec!["private".to_string(), "diary".to_string()]
        );
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let mut settings = Settings::default();
        settings.ai.api.temperature = 3.5;
        assert!(validate_settings(&settings).is_err());
    }
}
