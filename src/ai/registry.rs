//! Tool registry: names, schemas and handlers the model may call.
//!
//! Built once at startup, then shared read-only.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::i18n::Language;
use crate::error::{Error, Result};

/// Who is calling, for handlers that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolContext {
    pub user_id: i64,
    pub language: Language,
}

/// A callable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Description and JSON-schema parameters of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(description: impl Into<String>, parameters: Value) -> Self {
        Self {
            description: description.into(),
            parameters,
        }
    }

    /// Schema for a tool without arguments.
    pub fn no_params(description: impl Into<String>) -> Self {
        Self::new(description, json!({"type": "object", "properties": {}}))
    }
}

struct RegisteredTool {
    name: String,
    schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names are unique.
    pub fn register(
        &mut self,
        name: &str,
        handler: Arc<dyn ToolHandler>,
        schema: ToolSchema,
    ) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateTool(name.to_string()));
        }
        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(RegisteredTool {
            name: name.to_string(),
            schema,
            handler,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// `(name, description)` pairs, in registration order.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.tools
            .iter()
            .map(|t| (t.name.as_str(), t.schema.description.as_str()))
            .collect()
    }

    /// Declarations in chat-completions `tools` format, in registration order.
    pub fn get_tool_declarations(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.schema.description,
                        "parameters": t.schema.parameters,
                    }
                })
            })
            .collect()
    }

    /// Run a tool. Never fails: unknown names and handler errors come back as
    /// `{"success": false, "error": ...}`.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Value {
        let Some(tool) = self.index.get(name).and_then(|&i| self.tools.get(i)) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return json!({"success": false, "error": format!("Function {} not found", name)});
        };

        tracing::debug!(tool = name, "executing tool");
        match tool.handler.call(params, ctx).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(tool = name, "tool failed: {}", e);
                json!({"success": false, "error": e.to_string()})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
            Ok(json!({"echo": params}))
        }
    }

    struct Broken;

    #[async_trait]
    impl ToolHandler for Broken {
        async fn call(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
            Err(Error::Tool("boom".to_string()))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            user_id: 1,
            language: Language::En,
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry
            .register("echo", Arc::new(Echo), ToolSchema::no_params("echo"))
            .unwrap();
        let err = registry
            .register("echo", Arc::new(Echo), ToolSchema::no_params("again"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(ref n) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_declarations_keep_order() {
        let mut registry = ToolRegistry::new();
        for name in ["b", "a", "c"] {
            registry
                .register(name, Arc::new(Echo), ToolSchema::no_params(format!("tool {}", name)))
                .unwrap();
        }
        let names: Vec<_> = registry
            .get_tool_declarations()
            .iter()
            .map(|d| d["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(registry.get_tool_declarations()[0]["type"], "function");
    }

    #[tokio::test]
    async fn test_execute_structured_failures() {
        let mut registry = ToolRegistry::new();
        registry
            .register("echo", Arc::new(Echo), ToolSchema::no_params("echo"))
            .unwrap();
        registry
            .register("broken", Arc::new(Broken), ToolSchema::no_params("broken"))
            .unwrap();

        let ok = registry.execute("echo", json!({"x": 1}), &ctx()).await;
        assert_eq!(ok["echo"]["x"], 1);

        let missing = registry.execute("nope", json!({}), &ctx()).await;
        assert_eq!(missing, json!({"success": false, "error": "Function nope not found"}));

        let failed = registry.execute("broken", json!({}), &ctx()).await;
        assert_eq!(failed["success"], false);
        assert!(failed["error"].as_str().unwrap().contains("boom"));
    }
}
