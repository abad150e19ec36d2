//! AI assistant: tools, executors and the chat loop.
//!
//! - `registry` / `tools`: what the model may call
//! - `safe_executor`: read-only operations, run immediately
//! - `action_executor` / `pending`: mutations, run only after confirmation
//! - `router`: the function-calling loop and direct rendering

pub mod action_executor;
pub mod audit;
pub mod i18n;
pub mod params;
pub mod pending;
pub mod prompts;
pub mod registry;
pub mod render;
pub mod router;
pub mod safe_executor;
pub mod tools;

pub use action_executor::{ActionExecutor, ActionOutcome, ConfirmedAction, CONFIRMED_ACTIONS};
pub use i18n::{Language, Msg};
pub use pending::{PendingAction, PendingActions};
pub use registry::{ToolContext, ToolHandler, ToolRegistry, ToolSchema};
pub use render::ResourceSender;
pub use router::{ChatReply, ChatRouter, TurnContext};
pub use safe_executor::{OperationOutcome, SafeExecutor, SAFE_OPERATIONS};
pub use tools::{build_registry, ToolDeps};
