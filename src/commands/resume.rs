use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::model::{DeskRecord, DeskState};
use crate::tmux;

pub fn run(config: &Config, name: &str) -> Result<()> {
    let store = super::desk_store(config);

    let desk = store.update(name, |existing| {
        let mut record = resumable(existing, name)?;
        // Probe under the lock so a concurrent stop cannot slip in
        // between the check and the attach.
        if !tmux::session_exists(&record.session)? {
            return Err(HotdeskError::SessionUnreachable(name.to_string()));
        }
        record.state = DeskState::Active;
        Ok(record)
    })?;

    tmux::exec_attach(&desk.session, Some(&desk.workdir))
}

/// Resume never re-runs tracking setup: the desk keeps whatever mode
/// `start` chose, even if cgroup availability changed since.
pub(crate) fn resumable(existing: Option<DeskRecord>, name: &str) -> Result<DeskRecord> {
    let record = existing.ok_or_else(|| HotdeskError::DeskNotFound(name.to_string()))?;
    match record.state {
        DeskState::Active | DeskState::Saved => Ok(record),
        DeskState::Stopped => Err(HotdeskError::DeskStopped(name.to_string())),
        other => Err(HotdeskError::InvalidTransition(
            other.to_string(),
            DeskState::Active.to_string(),
        )),
    }
}
