//! LLM providers.

use std::sync::Arc;

pub mod openai;
pub mod provider;

pub use provider::{
    ChatMessage, ChatProvider, ChatRequest, ChatResponse, Choice, FunctionCall, ProviderError,
    ToolCall,
};

use crate::config::Settings;

/// Provider for the configured chat-completions endpoint.
pub fn create_provider(settings: &Settings) -> provider::Result<Arc<dyn ChatProvider>> {
    Ok(Arc::new(openai::OpenAiCompatProvider::new(&settings.ai.api)?))
}
