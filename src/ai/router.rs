//! Function-calling chat loop.
//!
//! One user turn is at most two completions: the first offers the tools, the
//! second turns tool results into prose. Results that are already a list of
//! archives, notes or tags skip the second completion and are rendered here.

use std::sync::Arc;

use super::i18n::{Language, Msg};
use super::prompts;
use super::registry::{ToolContext, ToolRegistry};
use super::render::{self, DirectView, ResourceSender};
use crate::error::{Error, Result};
use crate::providers::{ChatMessage, ChatProvider, ChatRequest, ProviderError};
use crate::storage::{Archive, ArchiveStore};

const EXIT_PHRASES: &[&str] = &["退出", "結束", "结束", "exit", "quit", "bye", "再见", "再見"];
const HELP_PHRASES: &[&str] = &["帮助", "幫助", "help", "?", "？"];

const DEFAULT_MODEL: &str = "grok-4-1-fast-non-reasoning";
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// What the caller should do after a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    /// Send this text.
    Text(String),
    /// The answer was already delivered as media; send nothing.
    ResourceSent,
}

/// Per-turn context supplied by the front end.
#[derive(Clone)]
pub struct TurnContext {
    pub user_id: i64,
    pub chat_id: i64,
    pub language: Language,
    pub resource_sender: Option<Arc<dyn ResourceSender>>,
}

impl TurnContext {
    pub fn new(user_id: i64, chat_id: i64, language: Language) -> Self {
        Self {
            user_id,
            chat_id,
            language,
            resource_sender: None,
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn ResourceSender>) -> Self {
        self.resource_sender = Some(sender);
        self
    }
}

pub struct ChatRouter {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ArchiveStore>,
    model: String,
    temperature: f32,
}

fn matches_phrase(message: &str, phrases: &[&str]) -> bool {
    let lowered = message.trim().to_lowercase();
    phrases.iter().any(|p| *p == lowered)
}

fn non_empty(content: Option<String>) -> Option<String> {
    content.filter(|c| !c.trim().is_empty())
}

impl ChatRouter {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, temperature: f32) -> Self {
        self.model = model.into();
        self.temperature = temperature;
        self
    }

    /// Answer one user message. Never fails; errors become a localized apology.
    pub async fn handle(&self, user_message: &str, ctx: &TurnContext) -> ChatReply {
        if matches_phrase(user_message, EXIT_PHRASES) {
            return ChatReply::Text(Msg::ChatGoodbye.text(ctx.language));
        }
        if matches_phrase(user_message, HELP_PHRASES) {
            return ChatReply::Text(Msg::ChatHelp.text(ctx.language));
        }

        match self.run(user_message.trim(), ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id = ctx.user_id, "chat turn failed: {}", e);
                ChatReply::Text(Msg::ChatError.text(ctx.language))
            }
        }
    }

    async fn run(&self, user_message: &str, ctx: &TurnContext) -> Result<ChatReply> {
        let mut messages = vec![
            ChatMessage::system(prompts::system_prompt(ctx.language, &self.registry)),
            ChatMessage::user(user_message),
        ];

        tracing::info!(user_id = ctx.user_id, "chat stage 1: tool selection");
        let first = self.complete(&messages, true).await?;

        let calls = match first.tool_calls.clone() {
            Some(calls) if !calls.is_empty() => calls,
            _ => {
                tracing::info!(user_id = ctx.user_id, "chat answered without tools");
                return non_empty(first.content)
                    .map(ChatReply::Text)
                    .ok_or_else(|| Error::Other("empty completion".to_string()));
            }
        };

        tracing::info!(
            user_id = ctx.user_id,
            count = calls.len(),
            "chat stage 2: executing tools"
        );
        let tool_ctx = ToolContext {
            user_id: ctx.user_id,
            language: ctx.language,
        };
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = self
                .registry
                .execute(&call.function.name, call.parsed_arguments(), &tool_ctx)
                .await;
            results.push(result);
        }

        if let [only] = results.as_slice() {
            if let Some(view) = render::recognize(only) {
                tracing::info!(user_id = ctx.user_id, "chat rendered tool result directly");
                return Ok(self.render_direct(view, ctx).await);
            }
        }

        messages.push(first);
        for (call, result) in calls.iter().zip(&results) {
            messages.push(ChatMessage::tool_result(call, result.to_string()));
        }

        tracing::info!(user_id = ctx.user_id, "chat stage 3: final answer");
        let last = self.complete(&messages, false).await?;
        non_empty(last.content)
            .map(ChatReply::Text)
            .ok_or_else(|| Error::Other("empty completion".to_string()))
    }

    async fn complete(&self, messages: &[ChatMessage], with_tools: bool) -> Result<ChatMessage> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: with_tools.then(|| self.registry.get_tool_declarations()),
            tool_choice: with_tools.then(|| "auto".to_string()),
            temperature: self.temperature,
        };
        let response = self.provider.chat(&request).await?;
        response
            .first_message()
            .cloned()
            .ok_or_else(|| Error::Provider(ProviderError::ApiError("No response choices".to_string())))
    }

    async fn render_direct(&self, view: DirectView, ctx: &TurnContext) -> ChatReply {
        let lang = ctx.language;
        match view {
            DirectView::Archive(archive) => self.single_archive(archive, ctx).await,
            DirectView::Archives(mut archives) if archives.len() == 1 => {
                let archive = archives.remove(0);
                self.single_archive(archive, ctx).await
            }
            DirectView::Archives(archives) => ChatReply::Text(render::archive_list(&archives, lang)),
            DirectView::Notes(notes) if notes.len() == 1 => {
                ChatReply::Text(render::note_detail(&notes[0]))
            }
            DirectView::Notes(notes) => ChatReply::Text(render::note_list(&notes, lang)),
            DirectView::Tags(tags) => ChatReply::Text(render::tag_list(&tags, lang)),
            DirectView::Message(message) => ChatReply::Text(message),
        }
    }

    /// Deliver the stored media when possible, otherwise describe it in text.
    async fn single_archive(&self, archive: Archive, ctx: &TurnContext) -> ChatReply {
        if archive.is_media() && archive.telegram_location().is_some() {
            if let Some(sender) = &ctx.resource_sender {
                let caption = render::archive_caption(&archive);
                match sender.send_archive(ctx.chat_id, &archive, &caption).await {
                    Ok(()) => {
                        tracing::info!(archive_id = archive.id, "archive delivered as media");
                        return ChatReply::ResourceSent;
                    }
                    Err(e) => {
                        tracing::warn!(archive_id = archive.id, "media delivery failed: {}", e);
                    }
                }
            }
        }

        let notes = self.store.notes_for_archive(archive.id).unwrap_or_else(|e| {
            tracing::warn!(archive_id = archive.id, "could not load notes: {}", e);
            Vec::new()
        });
        ChatReply::Text(render::archive_detail(&archive, &notes, ctx.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::action_executor::ActionExecutor;
    use crate::ai::tools::build_registry;
    use crate::ai::tools::tests::{add, deps, NOW};
    use crate::core::ArchiveManager;
    use crate::logging;
    use crate::providers::{ChatResponse, Choice, FunctionCall, ToolCall};
    use crate::storage::{NewArchive, SqliteArchiveStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records every request.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<std::result::Result<ChatMessage, ProviderError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<std::result::Result<ChatMessage, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, i: usize) -> ChatRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            request: &ChatRequest,
        ) -> std::result::Result<ChatResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::other("script exhausted")))?;
            Ok(ChatResponse {
                choices: vec![Choice { message: reply }],
            })
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(i64, i64, String)>>,
    }

    #[async_trait]
    impl ResourceSender for RecordingSender {
        async fn send_archive(&self, chat_id: i64, archive: &Archive, caption: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id, archive.id, caption.to_string()));
            Ok(())
        }
    }

    fn text(content: &str) -> std::result::Result<ChatMessage, ProviderError> {
        Ok(ChatMessage {
            role: "assistant".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        })
    }

    fn tool_calls(calls: &[(&str, Value)]) -> std::result::Result<ChatMessage, ProviderError> {
        Ok(ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(
                calls
                    .iter()
                    .enumerate()
                    .map(|(i, (name, args))| ToolCall {
                        id: format!("call_{}", i),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: name.to_string(),
                            arguments: args.to_string(),
                        },
                    })
                    .collect(),
            ),
            tool_call_id: None,
            name: None,
        })
    }

    struct Fixture {
        store: Arc<SqliteArchiveStore>,
        manager: Arc<ArchiveManager>,
        registry: Arc<ToolRegistry>,
    }

    fn fixture() -> Fixture {
        logging::init_test();
        let (store, deps) = deps();
        let manager = Arc::new(ArchiveManager::new(deps.store.clone(), deps.cache.clone()));
        Fixture {
            store,
            manager,
            registry: Arc::new(build_registry(&deps).unwrap()),
        }
    }

    fn router(f: &Fixture, provider: Arc<ScriptedProvider>) -> ChatRouter {
        ChatRouter::new(provider, f.registry.clone(), f.store.clone()).with_model("test-model", 0.2)
    }

    fn ctx() -> TurnContext {
        TurnContext::new(5, 500, Language::En)
    }

    #[tokio::test]
    async fn test_search_with_two_results_renders_list_without_second_call() {
        let f = fixture();
        add(&f.store, "rust ownership", &["rust"]);
        add(&f.store, "rust async", &[]);
        let provider = ScriptedProvider::new(vec![tool_calls(&[(
            "execute_command",
            json!({"command": "search", "params": {"keyword": "rust"}}),
        )])]);

        let reply = router(&f, provider.clone()).handle("find rust", &ctx()).await;

        let ChatReply::Text(body) = reply else {
            panic!("expected text reply");
        };
        assert!(body.starts_with("Found 2 archives:"));
        assert!(body.contains("rust ownership"));
        assert_eq!(provider.calls(), 1);

        let first = provider.request(0);
        assert_eq!(first.model, "test-model");
        assert_eq!(first.tool_choice.as_deref(), Some("auto"));
        assert_eq!(first.tools.map(|t| t.len()), Some(f.registry.len()));
    }

    #[tokio::test]
    async fn test_single_media_result_is_sent_as_resource() {
        let f = fixture();
        let id = f
            .store
            .create_archive(&NewArchive {
                content_type: "photo".to_string(),
                title: Some("sunset photo".to_string()),
                storage_type: Some("telegram".to_string()),
                storage_path: Some("telegram:-1001:42".to_string()),
                created_at: Some(NOW),
                ..NewArchive::default()
            })
            .unwrap();
        let provider = ScriptedProvider::new(vec![tool_calls(&[(
            "search_archives",
            json!({"keyword": "sunset"}),
        )])]);
        let sender = Arc::new(RecordingSender::default());

        let reply = router(&f, provider.clone())
            .handle("show me the sunset", &ctx().with_sender(sender.clone()))
            .await;

        assert_eq!(reply, ChatReply::ResourceSent);
        assert_eq!(provider.calls(), 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 500);
        assert_eq!(sent[0].1, id);
        assert!(sent[0].2.contains("sunset photo"));
    }

    #[tokio::test]
    async fn test_random_ebook_review_is_sent_as_resource() {
        let f = fixture();
        add(&f.store, "plain note", &[]);
        let id = f
            .store
            .create_archive(&NewArchive {
                content_type: "ebook".to_string(),
                title: Some("The Rust Book.epub".to_string()),
                storage_type: Some("telegram".to_string()),
                storage_path: Some("telegram:-1001:77".to_string()),
                created_at: Some(NOW),
                ..NewArchive::default()
            })
            .unwrap();
        let provider = ScriptedProvider::new(vec![tool_calls(&[(
            "execute_command",
            json!({"command": "review", "params": {"type": "random", "content_type": "ebook"}}),
        )])]);
        let sender = Arc::new(RecordingSender::default());

        let reply = router(&f, provider.clone())
            .handle("recommend me a random ebook", &ctx().with_sender(sender.clone()))
            .await;

        assert_eq!(reply, ChatReply::ResourceSent);
        assert_eq!(provider.calls(), 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 500);
        assert_eq!(sent[0].1, id);
    }

    #[tokio::test]
    async fn test_single_text_result_renders_detail_with_notes() {
        let f = fixture();
        let id = add(&f.store, "borrow checker notes", &[]);
        f.manager.add_note(Some(id), "reread chapter 4").unwrap();
        let provider = ScriptedProvider::new(vec![tool_calls(&[(
            "search_archives",
            json!({"keyword": "borrow"}),
        )])]);

        let reply = router(&f, provider).handle("borrow", &ctx()).await;

        let ChatReply::Text(body) = reply else {
            panic!("expected text reply");
        };
        assert!(body.contains(&format!("🆔 #{}", id)));
        assert!(body.contains("- reread chapter 4"));
    }

    #[tokio::test]
    async fn test_statistics_reflect_confirmed_delete() {
        let f = fixture();
        let doomed = add(&f.store, "old link", &[]);
        add(&f.store, "keeper", &[]);
        assert_eq!(f.manager.cache().get_statistics().total, 2);

        let executor = ActionExecutor::new(f.manager.clone());
        let outcome = executor.execute("delete_archive", &json!({"archive_id": doomed}), Language::En);
        assert!(outcome.success);

        let provider = ScriptedProvider::new(vec![
            tool_calls(&[("get_statistics", json!({}))]),
            text("You have 1 archive."),
        ]);
        let reply = router(&f, provider.clone()).handle("how many archives?", &ctx()).await;

        assert_eq!(reply, ChatReply::Text("You have 1 archive.".to_string()));
        assert_eq!(provider.calls(), 2);

        let second = provider.request(1);
        assert!(second.tools.is_none());
        let tool_msg = second.messages.last().unwrap();
        assert_eq!(tool_msg.role, "tool");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_0"));
        let payload: Value = serde_json::from_str(tool_msg.content.as_deref().unwrap()).unwrap();
        assert_eq!(payload["total_archives"], 1);
    }

    #[tokio::test]
    async fn test_multiple_calls_go_to_final_completion() {
        let f = fixture();
        add(&f.store, "rust", &["lang"]);
        let provider = ScriptedProvider::new(vec![
            tool_calls(&[
                ("execute_command", json!({"command": "search", "keyword": "rust"})),
                ("no_such_tool", json!({})),
            ]),
            text("Found one archive about rust."),
        ]);

        let reply = router(&f, provider.clone()).handle("rust?", &ctx()).await;

        assert_eq!(reply, ChatReply::Text("Found one archive about rust.".to_string()));
        let second = provider.request(1);
        let tool_msgs: Vec<_> = second.messages.iter().filter(|m| m.role == "tool").collect();
        assert_eq!(tool_msgs.len(), 2);
        assert!(tool_msgs[1]
            .content
            .as_deref()
            .unwrap()
            .contains("Function no_such_tool not found"));
    }

    #[tokio::test]
    async fn test_exit_and_help_skip_the_model() {
        let f = fixture();
        let provider = ScriptedProvider::new(vec![]);
        let router = router(&f, provider.clone());

        assert_eq!(
            router.handle("再见", &ctx()).await,
            ChatReply::Text(Msg::ChatGoodbye.text(Language::En))
        );
        assert_eq!(
            router.handle("？", &TurnContext::new(5, 500, Language::ZhHans)).await,
            ChatReply::Text(Msg::ChatHelp.text(Language::ZhHans))
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_plain_answer_and_failures() {
        let f = fixture();
        let provider = ScriptedProvider::new(vec![
            text("Hello there"),
            text("   "),
            Err(ProviderError::Timeout),
        ]);
        let router = router(&f, provider);
        let apology = ChatReply::Text(Msg::ChatError.text(Language::En));

        assert_eq!(router.handle("hi", &ctx()).await, ChatReply::Text("Hello there".to_string()));
        assert_eq!(router.handle("hi", &ctx()).await, apology);
        assert_eq!(router.handle("hi", &ctx()).await, apology);
    }
}
