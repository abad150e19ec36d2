//! Data-changing actions, run only after the user confirmed them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::audit::{AuditEvent, AuditEventType};
use super::i18n::{Language, Msg};
use super::params;
use super::pending::PendingAction;
use crate::core::ArchiveManager;
use crate::error::Error;
use crate::storage::normalize_tag;

/// Action types accepted by [`ActionExecutor::execute`].
pub const CONFIRMED_ACTIONS: &[&str] = &[
    "delete_archive",
    "clear_trash",
    "create_note",
    "add_tag",
    "remove_tag",
    "toggle_favorite",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

/// A parsed confirmed action.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedAction {
    DeleteArchive { archive_id: i64 },
    ClearTrash,
    CreateNote { content: String, archive_id: Option<i64> },
    AddTag { archive_id: i64, tag: String },
    RemoveTag { archive_id: i64, tag: String },
    ToggleFavorite { archive_id: i64 },
}

#[derive(Debug)]
enum ActionError {
    MissingParameter(&'static str),
    InvalidParams(String),
    UnknownAction(String),
    /// The store answered, but the action could not apply.
    Rejected(Msg),
    Store(Error),
}

impl From<Error> for ActionError {
    fn from(e: Error) -> Self {
        ActionError::Store(e)
    }
}

impl ActionError {
    fn message(self) -> Msg {
        match self {
            ActionError::MissingParameter(name) => Msg::MissingParameter {
                name: name.to_string(),
            },
            ActionError::InvalidParams(error) => Msg::ExecutionError { error },
            ActionError::UnknownAction(action) => Msg::UnknownAction { action },
            ActionError::Rejected(msg) => msg,
            ActionError::Store(e) => Msg::ExecutionError {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActionArgs {
    #[serde(default, deserialize_with = "params::int")]
    archive_id: Option<i64>,
    #[serde(default, deserialize_with = "params::text")]
    tag_name: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    tag: Option<String>,
    #[serde(default, deserialize_with = "params::text")]
    content: Option<String>,
}

impl ActionArgs {
    fn archive_id(&self) -> Result<i64, ActionError> {
        self.archive_id
            .ok_or(ActionError::MissingParameter("archive_id"))
    }

    fn tag_name(&self) -> Result<String, ActionError> {
        self.tag_name
            .as_deref()
            .or(self.tag.as_deref())
            .map(normalize_tag)
            .filter(|t| !t.is_empty())
            .ok_or(ActionError::MissingParameter("tag_name"))
    }
}

impl ConfirmedAction {
    fn parse(action_type: &str, params: &Value) -> Result<Self, ActionError> {
        if !CONFIRMED_ACTIONS.contains(&action_type) {
            return Err(ActionError::UnknownAction(action_type.to_string()));
        }
        let args: ActionArgs =
            params::parse(params).map_err(|e| ActionError::InvalidParams(e.to_string()))?;
        match action_type {
            "delete_archive" => Ok(ConfirmedAction::DeleteArchive {
                archive_id: args.archive_id()?,
            }),
            "clear_trash" => Ok(ConfirmedAction::ClearTrash),
            "create_note" => Ok(ConfirmedAction::CreateNote {
                content: args
                    .content
                    .clone()
                    .ok_or(ActionError::MissingParameter("content"))?,
                archive_id: args.archive_id,
            }),
            "add_tag" => Ok(ConfirmedAction::AddTag {
                archive_id: args.archive_id()?,
                tag: args.tag_name()?,
            }),
            "remove_tag" => Ok(ConfirmedAction::RemoveTag {
                archive_id: args.archive_id()?,
                tag: args.tag_name()?,
            }),
            "toggle_favorite" => Ok(ConfirmedAction::ToggleFavorite {
                archive_id: args.archive_id()?,
            }),
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }
}

/// Treat a store `NotFound` as a user-facing "archive not found".
fn not_found_as(archive_id: i64) -> impl FnOnce(Error) -> ActionError {
    move |e| match e {
        Error::NotFound(_) => ActionError::Rejected(Msg::ArchiveNotFound { archive_id }),
        other => ActionError::Store(other),
    }
}

pub struct ActionExecutor {
    manager: Arc<ArchiveManager>,
}

impl ActionExecutor {
    pub fn new(manager: Arc<ArchiveManager>) -> Self {
        Self { manager }
    }

    /// Run an action. Failures come back as `success: false`.
    pub fn execute(&self, action_type: &str, params: &Value, lang: Language) -> ActionOutcome {
        let result = ConfirmedAction::parse(action_type, params).and_then(|a| self.run(a));

        let outcome = match result {
            Ok(msg) => ActionOutcome {
                success: true,
                message: msg.text(lang),
            },
            Err(e) => {
                if let ActionError::Store(err) = &e {
                    tracing::error!(action = action_type, "confirmed action failed: {}", err);
                }
                ActionOutcome {
                    success: false,
                    message: e.message().text(lang),
                }
            }
        };

        AuditEvent::new(AuditEventType::WriteConfirmed, action_type, params, lang)
            .with_result(&outcome.message)
            .emit();
        outcome
    }

    pub fn execute_pending(&self, pending: &PendingAction) -> ActionOutcome {
        self.execute(&pending.action_type, &pending.params, pending.language)
    }

    fn run(&self, action: ConfirmedAction) -> Result<Msg, ActionError> {
        match action {
            ConfirmedAction::DeleteArchive { archive_id } => {
                if self.manager.move_to_trash(archive_id)? {
                    Ok(Msg::ArchiveTrashed { archive_id })
                } else {
                    Err(ActionError::Rejected(Msg::DeleteFailed { archive_id }))
                }
            }
            ConfirmedAction::ClearTrash => {
                let count = self.manager.empty_trash()?;
                Ok(Msg::TrashEmptied { count })
            }
            ConfirmedAction::CreateNote {
                content,
                archive_id,
            } => {
                let note_id = match archive_id {
                    Some(id) => self
                        .manager
                        .add_note(Some(id), &content)
                        .map_err(not_found_as(id))?,
                    None => self.manager.add_note(None, &content)?,
                };
                Ok(Msg::NoteCreated { note_id })
            }
            ConfirmedAction::AddTag { archive_id, tag } => {
                let added = self
                    .manager
                    .add_tag(archive_id, &tag)
                    .map_err(not_found_as(archive_id))?;
                if added {
                    Ok(Msg::TagAdded { archive_id, tag })
                } else {
                    Ok(Msg::TagAlreadyPresent { archive_id, tag })
                }
            }
            ConfirmedAction::RemoveTag { archive_id, tag } => {
                if self.manager.remove_tag(archive_id, &tag)? {
                    Ok(Msg::TagRemoved { archive_id, tag })
                } else {
                    Err(ActionError::Rejected(Msg::TagNotPresent { archive_id, tag }))
                }
            }
            ConfirmedAction::ToggleFavorite { archive_id } => {
                match self.manager.toggle_favorite(archive_id)? {
                    Some(true) => Ok(Msg::FavoriteOn { archive_id }),
                    Some(false) => Ok(Msg::FavoriteOff { archive_id }),
                    None => Err(ActionError::Rejected(Msg::ArchiveNotFound { archive_id })),
                }
            }
        }
    }
}
