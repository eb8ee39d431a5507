//! tmux plumbing. Every desk runs on its own tmux server (socket name
//! `hotdesk-<desk>`), so killing or listing one desk can never touch a
//! neighbour's session on the default server.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

use crate::error::{HotdeskError, Result};
use crate::model::SessionHandle;

const PANE_FORMAT: &str =
    "#{session_name}\t#{window_index}\t#{pane_index}\t#{pane_pid}\t#{pane_current_command}\t#{pane_title}";

/// One pane as reported by `tmux list-panes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneInfo {
    pub session: String,
    pub window_index: u32,
    pub pane_index: u32,
    pub pane_pid: u32,
    pub current_command: String,
    pub title: String,
}

/// True when the desk's session exists on its server.
pub fn session_exists(handle: &SessionHandle) -> Result<bool> {
    let out = Command::new("tmux")
        .args(["-L", &handle.server, "has-session", "-t", &handle.session])
        .output()
        .map_err(map_spawn_error)?;
    Ok(out.status.success())
}

/// All panes on the desk's server. A dead server reads as no panes,
/// not as an error.
pub fn list_panes(handle: &SessionHandle) -> Result<Vec<PaneInfo>> {
    let out = Command::new("tmux")
        .args([
            "-L",
            &handle.server,
            "list-panes",
            "-t",
            &handle.session,
            "-a",
            "-F",
            PANE_FORMAT,
        ])
        .output()
        .map_err(map_spawn_error)?;
    if !out.status.success() {
        return Ok(Vec::new());
    }
    Ok(parse_panes(&String::from_utf8_lossy(&out.stdout)))
}

/// Kill the desk's session. Returns false when it was already gone.
pub fn kill_session(handle: &SessionHandle) -> Result<bool> {
    let out = Command::new("tmux")
        .args(["-L", &handle.server, "kill-session", "-t", &handle.session])
        .output()
        .map_err(map_spawn_error)?;
    Ok(out.status.success())
}

/// Argv for attaching to (or creating) the desk's session. `new -A`
/// attaches when the session exists and creates it otherwise, so start
/// and resume share one command line.
pub fn attach_argv(handle: &SessionHandle, workdir: Option<&Path>) -> Vec<String> {
    let mut argv = vec![
        "tmux".to_string(),
        "-L".to_string(),
        handle.server.clone(),
        "new".to_string(),
        "-A".to_string(),
        "-s".to_string(),
        handle.session.clone(),
    ];
    if let Some(dir) = workdir {
        argv.push("-c".to_string());
        argv.push(dir.display().to_string());
    }
    argv
}

/// Replace this process with the attach command. Only returns on
/// failure, so callers treat a returned Ok as unreachable.
#[cfg(unix)]
pub fn exec_attach(handle: &SessionHandle, workdir: Option<&Path>) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let argv = attach_argv(handle, workdir);
    let err = Command::new(&argv[0]).args(&argv[1..]).exec();
    Err(map_spawn_error(err))
}

#[cfg(not(unix))]
pub fn exec_attach(_handle: &SessionHandle, _workdir: Option<&Path>) -> Result<()> {
    Err(HotdeskError::TmuxFailed(
        "attaching requires a unix host".to_string(),
    ))
}

fn map_spawn_error(err: std::io::Error) -> HotdeskError {
    if err.kind() == ErrorKind::NotFound {
        HotdeskError::TmuxFailed("tmux not found; install tmux first".to_string())
    } else {
        err.into()
    }
}

pub(crate) fn parse_panes(output: &str) -> Vec<PaneInfo> {
    let mut panes = Vec::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 6 {
            continue;
        }
        let (Ok(window_index), Ok(pane_index), Ok(pane_pid)) = (
            parts[1].parse::<u32>(),
            parts[2].parse::<u32>(),
            parts[3].parse::<u32>(),
        ) else {
            continue;
        };
        panes.push(PaneInfo {
            session: parts[0].to_string(),
            window_index,
            pane_index,
            pane_pid,
            current_command: parts[4].to_string(),
            title: parts[5].to_string(),
        });
    }
    panes
}
