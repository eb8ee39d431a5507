use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotdeskError {
    #[error("desk name '{0}' is already taken (state: {1})")]
    NameTaken(String, String),

    #[error("desk '{0}' not found")]
    DeskNotFound(String),

    #[error("desk '{0}' is already stopped")]
    DeskStopped(String),

    #[error("desk '{0}' belongs to '{1}' (set HOTDESK_USER or use their desk name)")]
    NotOwner(String, String),

    #[error("invalid state transition: {0} -> {1}")]
    InvalidTransition(String, String),

    #[error("desk '{0}' has no reachable session; run `hotdesk start {0}` to relaunch")]
    SessionUnreachable(String),

    #[error("message {0} not found")]
    MessageNotFound(String),

    #[error("message text must be non-empty")]
    EmptyMessage,

    #[error("desk name must be non-empty ASCII alphanumeric/hyphen/underscore, got '{0}'")]
    InvalidName(String),

    #[error("timed out waiting for lock '{0}'")]
    LockTimeout(String),

    #[error("process tracking unavailable: {0}")]
    TrackingUnavailable(String),

    #[error("corrupt state file '{0}': {1}")]
    StorageCorrupt(String, String),

    #[error("tmux command failed: {0}")]
    TmuxFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HotdeskError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameTaken(_, _) => "name_taken",
            Self::DeskNotFound(_) => "desk_not_found",
            Self::DeskStopped(_) => "desk_stopped",
            Self::NotOwner(_, _) => "not_owner",
            Self::InvalidTransition(_, _) => "invalid_transition",
            Self::SessionUnreachable(_) => "session_unreachable",
            Self::MessageNotFound(_) => "message_not_found",
            Self::EmptyMessage => "empty_message",
            Self::InvalidName(_) => "invalid_name",
            Self::LockTimeout(_) => "lock_timeout",
            Self::TrackingUnavailable(_) => "tracking_unavailable",
            Self::StorageCorrupt(_, _) => "storage_corrupt",
            Self::TmuxFailed(_) => "tmux_failed",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, HotdeskError>;
