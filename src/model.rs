use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::message_id::MessageId;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum DeskState {
    #[default]
    Reserved,
    Active,
    Saved,
    Stopped,
}

impl DeskState {
    /// States that hold the name: a second desk with the same name
    /// cannot be prepared while a record sits in one of these.
    pub fn holds_name(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for DeskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reserved => write!(f, "reserved"),
            Self::Active => write!(f, "active"),
            Self::Saved => write!(f, "saved"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// tmux coordinates for a desk. Each desk runs its own tmux server
/// (socket name `server`) holding a single session named `session`,
/// so killing one desk can never touch another desk's windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub server: String,
    pub session: String,
}

impl SessionHandle {
    pub fn for_desk(name: &str) -> Self {
        Self {
            server: format!("hotdesk-{name}"),
            session: name.to_string(),
        }
    }
}

/// How a desk's processes are found. Chosen once at `start` and kept
/// for the desk's lifetime; never silently switched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Tracking {
    /// Members of a dedicated cgroup v2 directory (`cgroup.procs`).
    Cgroup { path: PathBuf },
    /// Descendants of the desk's tmux pane PIDs, walked via /proc.
    /// Misses processes that daemonize out of the pane tree.
    PaneTree { server: String, session: String },
}

impl Tracking {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Cgroup { .. } => "cgroup",
            Self::PaneTree { .. } => "pane_tree",
        }
    }
}

/// Condensed result of the most recent `save`, embedded in the desk
/// record so `status` can show it without opening the save document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub captured_at: DateTime<Utc>,
    pub auto: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    pub pid_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskRecord {
    pub name: String,
    pub owner: String,
    pub state: DeskState,
    pub session: SessionHandle,
    pub workdir: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot: Option<SnapshotSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl DeskRecord {
    pub fn new(name: &str, owner: &str, workdir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            state: DeskState::Reserved,
            session: SessionHandle::for_desk(name),
            workdir,
            note: String::new(),
            tracking: None,
            last_snapshot: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            saved_at: None,
            stopped_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether a save has landed since the most recent start. Drives
    /// the auto-save decision at stop time and the `saved` column of
    /// the status board.
    pub fn saved_since_start(&self) -> bool {
        match (self.saved_at, self.started_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(saved), Some(started)) => saved >= started,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub seq: u64,
    pub desk: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<MessageId>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
