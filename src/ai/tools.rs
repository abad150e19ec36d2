//! Built-in assistant tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::action_executor::CONFIRMED_ACTIONS;
use super::audit::{self, AuditEventType};
use super::i18n::Msg;
use super::params;
use super::pending::PendingActions;
use super::registry::{ToolContext, ToolHandler, ToolRegistry, ToolSchema};
use super::safe_executor::{SafeExecutor, SAFE_OPERATIONS};
use crate::config::SharedSettings;
use crate::core::AiDataCache;
use crate::error::{Error, Result};
use crate::storage::{ArchiveStore, Exclusion, SearchQuery};

/// Everything the built-in tools need.
#[derive(Clone)]
pub struct ToolDeps {
    pub store: Arc<dyn ArchiveStore>,
    pub cache: Arc<AiDataCache>,
    pub safe: Arc<SafeExecutor>,
    pub pending: Arc<PendingActions>,
    pub settings: SharedSettings,
}

/// Registry with every built-in tool.
pub fn build_registry(deps: &ToolDeps) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(
        "execute_command",
        Arc::new(ExecuteCommand {
            safe: deps.safe.clone(),
        }),
        ToolSchema::new(
            "Run a read-only bot command: search (params: keyword, limit), stats, \
             tags (params: limit), notes (params: archive_id | query, limit), \
             review (params: type=random|summary, limit, content_type, \
             period=today|yesterday|week|month|quarter|year).",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "search, stats, tags, notes or review"},
                    "params": {"type": "object", "description": "Command parameters"}
                },
                "required": ["command"]
            }),
        ),
    )?;

    registry.register(
        "get_statistics",
        Arc::new(GetStatistics {
            cache: deps.cache.clone(),
        }),
        ToolSchema::no_params(
            "Archive totals: number of archives, distinct tags, and archives added this week.",
        ),
    )?;

    registry.register(
        "search_archives",
        Arc::new(SearchArchives {
            store: deps.store.clone(),
            settings: deps.settings.clone(),
        }),
        ToolSchema::new(
            "Search archived content by keyword. Words starting with # filter by tag.",
            json!({
                "type": "object",
                "properties": {
                    "keyword": {"type": "string", "description": "Search keyword"},
                    "limit": {"type": "integer", "description": "Max results (1-50, default 10)"}
                },
                "required": ["keyword"]
            }),
        ),
    )?;

    registry.register(
        "get_tag_analysis",
        Arc::new(GetTagAnalysis {
            cache: deps.cache.clone(),
        }),
        ToolSchema::new(
            "Most used tags with counts and share of all tag uses.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max tags (1-50, default 15)"}
                }
            }),
        ),
    )?;

    registry.register(
        "get_recent_archives",
        Arc::new(GetRecentArchives {
            cache: deps.cache.clone(),
        }),
        ToolSchema::new(
            "The most recently archived items (id, title, time).",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max items (1-50, default 10)"}
                }
            }),
        ),
    )?;

    registry.register(
        "request_action",
        Arc::new(RequestAction {
            pending: deps.pending.clone(),
        }),
        ToolSchema::new(
            "Propose a change (delete, tag, note, favorite, empty trash). Nothing happens \
             until the user confirms; tell them a confirmation is waiting.",
            json!({
                "type": "object",
                "properties": {
                    "action_type": {"type": "string", "enum": CONFIRMED_ACTIONS},
                    "params": {
                        "type": "object",
                        "description": "archive_id, tag_name or content, depending on the action"
                    },
                    "description": {"type": "string", "description": "One line telling the user what will change"}
                },
                "required": ["action_type", "description"]
            }),
        ),
    )?;

    Ok(registry)
}

/// Commands that change data; the model must go through `request_action`.
const MUTATING_COMMANDS: &[&str] = &[
    "delete",
    "delete_archive",
    "remove",
    "clear_trash",
    "empty_trash",
    "create_note",
    "add_note",
    "add_tag",
    "tag",
    "remove_tag",
    "untag",
    "toggle_favorite",
    "favorite",
    "删除",
    "刪除",
    "清空回收站",
    "清空資源回收筒",
];

/// Map user-facing command names onto safe operation types.
fn resolve_command(command: &str) -> Option<&'static str> {
    let command = command.trim().trim_start_matches('/').to_lowercase();
    let op = match command.as_str() {
        "status" | "stats" | "statistics" | "统计" | "統計" => "stats",
        "search" | "find" | "搜索" | "搜尋" => "search",
        "tags" | "标签" | "標籤" => "tags",
        "notes" | "note" | "笔记" | "筆記" => "notes",
        "review" | "random" | "回顾" | "回顧" => "review",
        _ => return None,
    };
    Some(op)
}

struct ExecuteCommand {
    safe: Arc<SafeExecutor>,
}

/// Parse tool arguments, reporting shape errors as invalid parameters.
fn tool_args<T: serde::de::DeserializeOwned>(tool: &str, raw: &Value) -> Result<T> {
    params::parse(raw).map_err(|e| Error::InvalidParams(format!("{}: {}", tool, e)))
}

fn limit_or(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, 50)
}

#[derive(Debug, Deserialize)]
struct CommandArgs {
    #[serde(default, deserialize_with = "params::text")]
    command: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    /// Models often flatten the parameters next to `command`.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl CommandArgs {
    fn command(&self) -> Result<&str> {
        self.command
            .as_deref()
            .ok_or_else(|| Error::InvalidParams("command is required".to_string()))
    }

    fn into_params(self) -> Value {
        match self.params {
            Some(nested @ Value::Object(_)) => nested,
            _ => Value::Object(self.rest),
        }
    }
}

#[async_trait]
impl ToolHandler for ExecuteCommand {
    async fn call(&self, raw: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CommandArgs = tool_args("execute_command", &raw)?;
        let command = args.command()?.to_string();
        let params = args.into_params();
        let lowered = command.trim().to_lowercase();

        if MUTATING_COMMANDS.contains(&lowered.as_str()) {
            audit::record(
                AuditEventType::ForbiddenAttempt,
                &command,
                &params,
                ctx.language,
            );
            return Ok(json!({
                "success": false,
                "error": Msg::ForbiddenCommand { command: command.clone() }.text(ctx.language),
                "command": command,
            }));
        }

        let operation_type = resolve_command(&command).unwrap_or(lowered.as_str());
        let outcome = self.safe.execute(operation_type, &params, ctx.language);
        Ok(json!({
            "success": outcome.success,
            "command": command,
            "operation_type": operation_type,
            "message": outcome.message,
            "data": outcome.data,
            "available_operations": if outcome.success { Value::Null } else { json!(SAFE_OPERATIONS) },
        }))
    }
}

struct GetStatistics {
    cache: Arc<AiDataCache>,
}

#[async_trait]
impl ToolHandler for GetStatistics {
    async fn call(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
        let stats = self.cache.get_statistics();
        Ok(json!({
            "total_archives": stats.total,
            "total_tags": stats.tags,
            "recent_week": stats.recent_week,
            "has_data": stats.total > 0,
        }))
    }
}

struct SearchArchives {
    store: Arc<dyn ArchiveStore>,
    settings: SharedSettings,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default, deserialize_with = "params::text")]
    keyword: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    query: Option<String>,
    #[serde(default, deserialize_with = "params::count")]
    limit: Option<usize>,
}

#[async_trait]
impl ToolHandler for SearchArchives {
    async fn call(&self, raw: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: SearchArgs = tool_args("search_archives", &raw)?;
        let keyword = args
            .keyword
            .or(args.query)
            .ok_or_else(|| Error::InvalidParams("keyword is required".to_string()))?;
        let limit = limit_or(args.limit, 10);
        let exclusion = match self.settings.read() {
            Ok(s) if s.ai.exclude_from_context.apply_to_interactions => {
                Exclusion::from(&s.ai.exclude_from_context)
            }
            _ => Exclusion::none(),
        };
        let mut query = SearchQuery::parse(&keyword, limit);
        query.exclusion = exclusion;

        let page = self.store.search(&query)?;
        Ok(json!({
            "keyword": keyword,
            "total_count": page.total,
            "results": page.results,
        }))
    }
}

struct GetTagAnalysis {
    cache: Arc<AiDataCache>,
}

#[derive(Debug, Deserialize)]
struct LimitArgs {
    #[serde(default, deserialize_with = "params::count")]
    limit: Option<usize>,
}

#[async_trait]
impl ToolHandler for GetTagAnalysis {
    async fn call(&self, raw: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: LimitArgs = tool_args("get_tag_analysis", &raw)?;
        let limit = limit_or(args.limit, 15);
        let tags = self.cache.get_tag_analysis(limit);
        let total_uses: u64 = tags.iter().map(|t| t.count).sum();

        let top_tags: Vec<Value> = tags
            .iter()
            .filter(|t| !t.tag_name.trim().is_empty())
            .take(limit)
            .map(|t| {
                let percentage = if total_uses == 0 {
                    0.0
                } else {
                    (t.count as f64 * 1000.0 / total_uses as f64).round() / 10.0
                };
                json!({"name": t.tag_name, "count": t.count, "percentage": percentage})
            })
            .collect();

        Ok(json!({"total_tags": tags.len(), "top_tags": top_tags}))
    }
}

struct GetRecentArchives {
    cache: Arc<AiDataCache>,
}

#[async_trait]
impl ToolHandler for GetRecentArchives {
    async fn call(&self, raw: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: LimitArgs = tool_args("get_recent_archives", &raw)?;
        let limit = limit_or(args.limit, 10);
        let recent: Vec<_> = self
            .cache
            .get_recent_samples(limit)
            .into_iter()
            .take(limit)
            .collect();
        Ok(json!({"count": recent.len(), "recent": recent}))
    }
}

struct RequestAction {
    pending: Arc<PendingActions>,
}

#[derive(Debug, Deserialize)]
struct RequestArgs {
    #[serde(default, deserialize_with = "params::text")]
    action_type: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default, deserialize_with = "params::text")]
    description: Option<String>,
}

#[async_trait]
impl ToolHandler for RequestAction {
    async fn call(&self, raw: Value, ctx: &ToolContext) -> Result<Value> {
        let args: RequestArgs = tool_args("request_action", &raw)?;
        let action_type = args
            .action_type
            .ok_or_else(|| Error::InvalidParams("action_type is required".to_string()))?;
        let action_params = match args.params {
            Some(p @ Value::Object(_)) => p,
            _ => json!({}),
        };
        let description = args.description.unwrap_or_else(|| action_type.clone());

        let pending = self.pending.create(
            ctx.user_id,
            &action_type,
            action_params,
            ctx.language,
            &description,
        )?;
        let prompt = Msg::ConfirmPrompt {
            description: pending.description.clone(),
            confirmation_id: pending.confirmation_id.clone(),
        }
        .text(ctx.language);

        Ok(json!({
            "success": true,
            "pending_confirmation": true,
            "confirmation_id": pending.confirmation_id,
            "action_type": pending.action_type,
            "description": pending.description,
            "message": prompt,
        }))
    }
}
