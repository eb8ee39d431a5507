use chrono::Utc;
use colored::Colorize;

use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::identity;
use crate::model::{DeskRecord, DeskState, Tracking};
use crate::tmux;
use crate::track::cgroup::{self, CgroupDir};

pub fn run(config: &Config, name: &str) -> Result<()> {
    let owner = identity::resolve_user();
    let store = super::desk_store(config);

    let mut warning = None;
    let desk = store.update(name, |existing| {
        activate(
            existing,
            name,
            &owner,
            config,
            cgroup::is_cgroup2(),
            &mut warning,
        )
    })?;

    if let Some(warning) = &warning {
        eprintln!("{} {}", "note:".yellow(), warning);
    }

    // Commit first, then replace this process with the tmux client:
    // the board shows the desk as active even if the attach fails.
    tmux::exec_attach(&desk.session, Some(&desk.workdir))
}

/// Check in: Reserved (owned by the caller) or a free name becomes
/// Active with a freshly chosen tracking mode. The tracking choice
/// happens here because the process must join its cgroup before the
/// tmux server is spawned from it.
pub(crate) fn activate(
    existing: Option<DeskRecord>,
    name: &str,
    owner: &str,
    config: &Config,
    cgroup2: bool,
    warning: &mut Option<String>,
) -> Result<DeskRecord> {
    let mut record = match existing {
        Some(current) if current.state == DeskState::Reserved => {
            if current.owner != owner {
                return Err(HotdeskError::NotOwner(name.to_string(), current.owner));
            }
            current
        }
        Some(current) if current.state.holds_name() => {
            // Same signal as prepare: a racing starter must see the
            // name conflict, not a state complaint.
            return Err(HotdeskError::NameTaken(
                name.to_string(),
                current.state.to_string(),
            ));
        }
        other => super::prepare::fresh_reservation(other, name, owner, config)?,
    };

    record.state = DeskState::Active;
    record.started_at = Some(Utc::now());
    // A new start invalidates earlier saves for auto-save purposes.
    record.saved_at = None;
    record.tracking = Some(pick_tracking(config, name, &record, cgroup2, warning));
    Ok(record)
}

fn pick_tracking(
    config: &Config,
    name: &str,
    record: &DeskRecord,
    cgroup2: bool,
    warning: &mut Option<String>,
) -> Tracking {
    if cgroup2 {
        match CgroupDir::create(&config.cgroup_base, name).and_then(|cg| {
            cg.add_self()?;
            Ok(cg)
        }) {
            Ok(cg) => {
                return Tracking::Cgroup {
                    path: cg.path().to_path_buf(),
                };
            }
            Err(e) => {
                *warning = Some(format!("cgroup unavailable ({e}); using pane-tree tracking"));
            }
        }
    } else {
        *warning = Some("cgroup v2 not detected; using pane-tree tracking".to_string());
    }
    Tracking::PaneTree {
        server: record.session.server.clone(),
        session: record.session.session.clone(),
    }
}
