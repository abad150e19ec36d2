//! Audit trail for assistant-initiated operations.
//!
//! One JSON line per event on the `audit` tracing target.

use serde::Serialize;
use serde_json::Value;

use super::i18n::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SafeExecuted,
    WriteConfirmed,
    WriteCancelled,
    ForbiddenAttempt,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent<'a> {
    pub timestamp: String,
    pub event_type: AuditEventType,
    pub operation: &'a str,
    pub params: &'a Value,
    pub language: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a str>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(
        event_type: AuditEventType,
        operation: &'a str,
        params: &'a Value,
        language: Language,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event_type,
            operation,
            params,
            language: language.code(),
            result: None,
        }
    }

    pub fn with_result(mut self, result: &'a str) -> Self {
        self.result = Some(result);
        self
    }

    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(target: "audit", "[AUDIT] {}", json),
            Err(e) => tracing::warn!(target: "audit", "audit event not serializable: {}", e),
        }
    }
}

/// Record an event without a result message.
pub fn record(event_type: AuditEventType, operation: &str, params: &Value, language: Language) {
    AuditEvent::new(event_type, operation, params, language).emit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_json_shape() {
        let params = json!({"archive_id": 7});
        let event = AuditEvent::new(
            AuditEventType::WriteConfirmed,
            "delete_archive",
            &params,
            Language::ZhHant,
        )
        .with_result("ok");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event_type"], "write_confirmed");
        assert_eq!(value["operation"], "delete_archive");
        assert_eq!(value["params"]["archive_id"], 7);
        assert_eq!(value["language"], "zh-TW");
        assert_eq!(value["result"], "ok");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
