use project::StoreError;
use serde::Serialize;
use thiserror::Error;
use timeline::{ClipId, Frame, LinkGroupId, MutationNotification, TimelineError};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("invalid parameters: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    RateConversion(TimelineError),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error(transparent)]
    Store(StoreError),
    /// The timeline may be left between states; never swallowed.
    #[error("undo of {command} failed: {source}")]
    UndoFailed {
        command: &'static str,
        #[source]
        source: Box<EditError>,
    },
    #[error("nothing to {0}")]
    HistoryEmpty(&'static str),
}

impl EditError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EditError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable identifier for callers that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            EditError::Validation(_) => "VALIDATION",
            EditError::NotFound { .. } => "NOT_FOUND",
            EditError::RateConversion(_) => "RATE_CONVERSION",
            EditError::Constraint(_) => "CONSTRAINT",
            EditError::Store(err) => match err.root() {
                StoreError::Constraint(_) => "CONSTRAINT",
                StoreError::NotFound { .. } => "NOT_FOUND",
                _ => "STORE",
            },
            EditError::UndoFailed { .. } => "UNDO_FAILED",
            EditError::HistoryEmpty(_) => "HISTORY_EMPTY",
        }
    }
}

impl From<TimelineError> for EditError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::Validation(msg) => EditError::Validation(msg),
            TimelineError::Constraint(msg) => EditError::Constraint(msg),
            TimelineError::ClipNotFound(id) => EditError::not_found("clip", id),
            TimelineError::Overflow => EditError::Constraint(err.to_string()),
            TimelineError::RateConversion { .. } | TimelineError::InvalidRate { .. } => {
                EditError::RateConversion(err)
            }
        }
    }
}

impl From<StoreError> for EditError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EditError::NotFound { entity, id },
            StoreError::Timeline(inner) => inner.into(),
            StoreError::Constraint(msg) => EditError::Constraint(msg),
            other => EditError::Store(other),
        }
    }
}

pub type EditResult<T> = Result<T, EditError>;

/// What a caller gets back from every command, undo and redo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'static str>,
    pub notifications: Vec<MutationNotification>,
    #[serde(skip_serializing_if = "CommandOutcome::is_empty")]
    pub outcome: CommandOutcome,
}

/// Command-specific output fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created: Vec<ClipId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_delta: Option<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_delta: Option<Frame>,
    /// Downstream shift in sequence frames; negative when space was closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_group_id: Option<LinkGroupId>,
}

impl CommandOutcome {
    pub fn is_empty(&self) -> bool {
        *self == CommandOutcome::default()
    }

    pub fn clamped(&self) -> bool {
        matches!(
            (self.requested_delta, self.applied_delta),
            (Some(requested), Some(applied)) if requested != applied
        )
    }
}

impl CommandResult {
    pub fn succeeded(
        command: &'static str,
        notifications: Vec<MutationNotification>,
        outcome: CommandOutcome,
    ) -> Self {
        Self {
            success: true,
            command: Some(command),
            notifications,
            outcome,
            ..Default::default()
        }
    }

    pub fn failed(command: Option<&'static str>, err: &EditError) -> Self {
        Self {
            success: false,
            error_message: Some(err.to_string()),
            error_code: Some(err.code()),
            command,
            ..Default::default()
        }
    }
}
