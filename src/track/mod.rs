//! Desk process tracking.
//!
//! Which OS processes belong to a desk? In cgroup mode the kernel
//! answers via `cgroup.procs`; in pane-tree mode we take the pids of
//! the desk's tmux panes and walk their descendants in one /proc
//! sweep. Pane-tree mode misses processes that daemonized away from
//! the pane shells, which is exactly what cgroup mode exists to fix.

pub mod cgroup;
pub mod proc;

use std::fmt;

use chrono::Utc;
use serde_json::json;

use crate::model::{DeskRecord, SnapshotSummary, Tracking};
use crate::tmux;
use crate::track::cgroup::CgroupDir;
use crate::track::proc::{ProcFs, ProcessEnumerator, ProcessTable};

/// Cap on the per-process detail list inside a save document.
pub const PROCESS_SAMPLE_MAX: usize = 200;

pub(crate) const TOP_STATUS_ITEMS: usize = 6;
const TOP_SAVE_ITEMS: usize = 20;

/// What a desk is doing right now, as far as we can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Tracked processes exist.
    Running { pid_count: usize },
    /// The session is up but nothing is running in it.
    Idle,
    /// No tracked processes and the session is gone.
    Unreachable,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running { .. } => write!(f, "running"),
            Self::Idle => write!(f, "idle"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Observes one desk's processes according to its tracking mode.
pub struct Tracker<'a, E: ProcessEnumerator = ProcFs> {
    record: &'a DeskRecord,
    procs: E,
}

impl<'a> Tracker<'a, ProcFs> {
    pub fn new(record: &'a DeskRecord) -> Self {
        Self {
            record,
            procs: ProcFs,
        }
    }
}

impl<'a, E: ProcessEnumerator> Tracker<'a, E> {
    pub fn with_enumerator(record: &'a DeskRecord, procs: E) -> Self {
        Self { record, procs }
    }

    /// One /proc sweep. Enumeration failure degrades to an empty table
    /// so save and stop stay usable on a wedged /proc.
    pub fn snapshot_table(&self) -> ProcessTable {
        self.procs.snapshot().unwrap_or_default()
    }

    /// Pids currently belonging to the desk, sorted. Cgroup membership
    /// wins when present; an empty group falls back to pane ancestry
    /// so a desk whose processes escaped the group is still visible.
    pub fn pids(&self, table: &ProcessTable) -> Vec<u32> {
        match &self.record.tracking {
            Some(Tracking::Cgroup { path }) => {
                let mut members = CgroupDir::open(path.clone()).pids();
                if members.is_empty() {
                    return self.pane_pids(table);
                }
                members.sort_unstable();
                members
            }
            Some(Tracking::PaneTree { .. }) => self.pane_pids(table),
            None => Vec::new(),
        }
    }

    pub fn liveness(&self, table: &ProcessTable) -> Liveness {
        let pid_count = self.pids(table).len();
        liveness_from_parts(pid_count, self.session_up())
    }

    /// Snapshot the desk: a compact summary for the desk record plus
    /// the full save document (panes, bounded process sample).
    pub fn capture(&self, note: &str, auto: bool) -> (SnapshotSummary, serde_json::Value) {
        let captured_at = Utc::now();
        let table = self.snapshot_table();
        let pids = self.pids(&table);
        let tmux_active = self.session_up();
        let panes = if tmux_active {
            tmux::list_panes(&self.record.session).unwrap_or_default()
        } else {
            Vec::new()
        };

        let summary = SnapshotSummary {
            captured_at,
            auto,
            note: note.to_string(),
            pid_count: pids.len(),
            top: table.summarize(&pids, TOP_STATUS_ITEMS),
        };

        let pane_docs: Vec<serde_json::Value> = panes
            .iter()
            .map(|p| {
                json!({
                    "pane": format!("{}:{}.{}", p.session, p.window_index, p.pane_index),
                    "pane_pid": p.pane_pid,
                    "command": p.current_command,
                    "title": p.title,
                })
            })
            .collect();

        let sample: Vec<serde_json::Value> = pids
            .iter()
            .take(PROCESS_SAMPLE_MAX)
            .filter_map(|pid| table.get(*pid))
            .map(|info| json!({ "pid": info.pid, "ppid": info.ppid, "cmdline": info.cmdline }))
            .collect();

        let doc = json!({
            "tool": "hotdesk",
            "version": env!("CARGO_PKG_VERSION"),
            "desk": self.record.name,
            "captured_at": captured_at.to_rfc3339(),
            "auto": auto,
            "note": note,
            "state": self.record.state.to_string(),
            "workdir": self.record.workdir,
            "tmux_active": tmux_active,
            "tracking": self.record.tracking.as_ref().map(Tracking::mode),
            "pid_count": pids.len(),
            "top": table.summarize(&pids, TOP_SAVE_ITEMS),
            "panes": pane_docs,
            "process_sample": sample,
        });

        (summary, doc)
    }

    fn session_up(&self) -> bool {
        tmux::session_exists(&self.record.session).unwrap_or(false)
    }

    fn pane_pids(&self, table: &ProcessTable) -> Vec<u32> {
        if !self.session_up() {
            return Vec::new();
        }
        let roots: Vec<u32> = tmux::list_panes(&self.record.session)
            .unwrap_or_default()
            .iter()
            .map(|p| p.pane_pid)
            .collect();
        table.descendants(&roots)
    }
}

pub(crate) fn liveness_from_parts(pid_count: usize, session_up: bool) -> Liveness {
    if pid_count > 0 {
        Liveness::Running { pid_count }
    } else if session_up {
        Liveness::Idle
    } else {
        Liveness::Unreachable
    }
}

/// SIGTERM (or any signal) a plain pid list, skipping the excluded
/// pids and any that already exited. Returns the delivery count.
pub fn signal_pids(pids: &[u32], sig: i32, exclude: &[u32]) -> usize {
    let mut count = 0;
    for &pid in pids {
        if exclude.contains(&pid) {
            continue;
        }
        let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
        if rc == 0 {
            count += 1;
        }
    }
    count
}
