use qqbot_admin_client::{AdminClientError, ConfigPatch, MAX_REPLY_PROBABILITY_PERCENT};
use thiserror::Error;

/// Client-side precondition failures. A request is never issued when one of
/// these is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("group id must be an integer, got {raw:?}")]
    GroupIdNotInteger { raw: String },
    #[error("reply probability must be between 0 and 100, got {value}")]
    ReplyProbabilityOutOfRange { value: u32 },
    #[error("message count must be at least 1, got {value}")]
    MessageCountTooSmall { value: u32 },
    #[error("memory id must not be empty")]
    EmptyMemoryId,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] AdminClientError),
    #[error("{message}")]
    Application { message: String },
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("memory {id} not found")]
    MemoryNotFound { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    NetworkError,
    ApplicationError,
    ValidationError,
}

impl NoticeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::NetworkError => "network_error",
            Self::ApplicationError => "application_error",
            Self::ValidationError => "validation_error",
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::ApplicationError | Self::ValidationError
        )
    }
}

/// User-visible outcome of one dashboard action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    pub(crate) fn from_error(action: &str, error: &SyncError) -> Self {
        let kind = match error {
            SyncError::Network(_) => NoticeKind::NetworkError,
            SyncError::Application { .. } => NoticeKind::ApplicationError,
            SyncError::Validation(_) => NoticeKind::ValidationError,
        };
        Self::new(kind, format!("{action} failed: {error}"))
    }
}

pub fn parse_group_id(raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::GroupIdNotInteger {
            raw: raw.to_string(),
        })
}

/// Range checks on a config patch. Prompt index and model key are left to the
/// server, which owns the prompt list and model table.
pub fn validate_config_patch(patch: &ConfigPatch) -> Result<(), ValidationError> {
    if let Some(value) = patch.reply_probability_percent
        && value > MAX_REPLY_PROBABILITY_PERCENT
    {
        return Err(ValidationError::ReplyProbabilityOutOfRange { value });
    }
    if let Some(value) = patch.message_count
        && value < 1
    {
        return Err(ValidationError::MessageCountTooSmall { value });
    }
    Ok(())
}

/// Rejects blank ids. Anything else is the server's key and goes out as is.
pub(crate) fn require_memory_id(raw: &str) -> Result<&str, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyMemoryId);
    }
    Ok(raw)
}
