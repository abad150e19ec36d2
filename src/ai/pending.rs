//! Mutations proposed by the assistant, waiting for the user's go-ahead.
//!
//! One pending action per user; proposing another replaces it. Records expire
//! after the session TTL.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::action_executor::CONFIRMED_ACTIONS;
use super::audit::{self, AuditEventType};
use super::i18n::Language;
use crate::core::Clock;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAction {
    pub confirmation_id: String,
    pub user_id: i64,
    pub action_type: String,
    pub params: Value,
    pub language: Language,
    pub description: String,
    pub created_at: i64,
}

pub struct PendingActions {
    inner: Mutex<HashMap<i64, PendingAction>>,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl PendingActions {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, PendingAction>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_live(&self, action: &PendingAction, now: i64) -> bool {
        now - action.created_at < self.ttl_secs
    }

    /// Record a proposed action for `user_id`.
    pub fn create(
        &self,
        user_id: i64,
        action_type: &str,
        params: Value,
        language: Language,
        description: &str,
    ) -> Result<PendingAction> {
        if !CONFIRMED_ACTIONS.contains(&action_type) {
            return Err(Error::InvalidParams(format!(
                "unknown action '{}', expected one of {}",
                action_type,
                CONFIRMED_ACTIONS.join(", ")
            )));
        }
        let now = self.clock.now();
        let action = PendingAction {
            confirmation_id: ulid::Ulid::new().to_string(),
            user_id,
            action_type: action_type.to_string(),
            params,
            language,
            description: description.to_string(),
            created_at: now,
        };
        {
            let mut map = self.lock();
            let swept = self.sweep(&mut map, now);
            if swept > 0 {
                tracing::debug!(swept, "expired pending actions dropped");
            }
            map.insert(user_id, action.clone());
        }
        tracing::info!(
            user_id,
            action = action_type,
            confirmation_id = %action.confirmation_id,
            "pending action created"
        );
        Ok(action)
    }

    /// The user's live pending action, if any.
    pub fn get(&self, user_id: i64) -> Option<PendingAction> {
        let now = self.clock.now();
        self.lock()
            .get(&user_id)
            .filter(|a| self.is_live(a, now))
            .cloned()
    }

    /// Take the pending action if `confirmation_id` matches and it is still live.
    pub fn confirm(&self, user_id: i64, confirmation_id: &str) -> Option<PendingAction> {
        let now = self.clock.now();
        let mut map = self.lock();
        let matches = map
            .get(&user_id)
            .is_some_and(|a| a.confirmation_id == confirmation_id);
        if !matches {
            return None;
        }
        map.remove(&user_id).filter(|a| self.is_live(a, now))
    }

    /// Drop the pending action. Returns whether anything was cancelled.
    pub fn cancel(&self, user_id: i64, confirmation_id: &str) -> bool {
        let removed = {
            let mut map = self.lock();
            let matches = map
                .get(&user_id)
                .is_some_and(|a| a.confirmation_id == confirmation_id);
            if matches {
                map.remove(&user_id)
            } else {
                None
            }
        };
        match removed {
            Some(action) => {
                audit::record(
                    AuditEventType::WriteCancelled,
                    &action.action_type,
                    &action.params,
                    action.language,
                );
                true
            }
            None => false,
        }
    }

    /// Remove expired records; returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.lock();
        self.sweep(&mut map, now)
    }

    fn sweep(&self, map: &mut HashMap<i64, PendingAction>, now: i64) -> usize {
        let before = map.len();
        map.retain(|_, a| self.is_live(a, now));
        before - map.len()
    }

    /// Stored records, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
