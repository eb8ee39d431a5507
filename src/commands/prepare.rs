use colored::Colorize;

use crate::config::{self, Config};
use crate::error::{HotdeskError, Result};
use crate::identity;
use crate::model::DeskRecord;
use crate::output::{self, Format};
use crate::store::desks::DeskStore;
use crate::track::cgroup::{self, CgroupDir};

pub fn run(config: &Config, name: &str, format: Format) -> Result<()> {
    // Validate before the name reaches the cgroup path below.
    DeskStore::validate_name(name)?;
    let owner = identity::resolve_user();
    let store = super::desk_store(config);

    // Glance at the board before taking a seat.
    if format == Format::Pretty {
        super::status::print_active_preview(&store, name)?;
    }

    let warning = warm_cgroup(config, name);
    let desk = store.update(name, |existing| {
        fresh_reservation(existing, name, &owner, config)
    })?;

    if let Some(warning) = &warning {
        eprintln!("{} {}", "note:".yellow(), warning);
    }
    output::print_desk(&desk, format)?;
    if format == Format::Pretty {
        println!("Next: hotdesk start {name}");
    }
    Ok(())
}

/// Reserve the name. A Stopped record is replaced wholesale; anything
/// still holding the name rejects the reservation.
pub(crate) fn fresh_reservation(
    existing: Option<DeskRecord>,
    name: &str,
    owner: &str,
    config: &Config,
) -> Result<DeskRecord> {
    if let Some(current) = existing
        && current.state.holds_name()
    {
        return Err(HotdeskError::NameTaken(
            name.to_string(),
            current.state.to_string(),
        ));
    }
    Ok(DeskRecord::new(
        name,
        owner,
        config::auto_workdir(config, name),
    ))
}

/// Pre-create the desk's cgroup so permission problems surface now
/// rather than at start. Failure downgrades to a warning; the
/// tracking mode is not decided until start.
fn warm_cgroup(config: &Config, name: &str) -> Option<String> {
    if !cgroup::is_cgroup2() {
        return Some("cgroup v2 not detected; desks fall back to pane-tree tracking".to_string());
    }
    match CgroupDir::create(&config.cgroup_base, name) {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeskState;
    use tempfile::tempdir;

    #[test]
    fn reserves_unused_name() {
        let dir = tempdir().unwrap();
        let config = Config::for_test(dir.path());

        let desk = fresh_reservation(None, "gpu-a", "mika", &config).unwrap();
        assert_eq!(desk.name, "gpu-a");
        assert_eq!(desk.owner, "mika");
        assert_eq!(desk.state, DeskState::Reserved);
        assert_eq!(desk.workdir, dir.path().join("work/gpu-a"));
        assert!(desk.tracking.is_none());
    }

    #[test]
    fn replaces_stopped_record_wholesale() {
        let dir = tempdir().unwrap();
        let config = Config::for_test(dir.path());

        let mut old = fresh_reservation(None, "gpu-a", "mika", &config).unwrap();
        old.state = DeskState::Stopped;
        old.note = "old note".into();

        let desk = fresh_reservation(Some(old), "gpu-a", "casey", &config).unwrap();
        assert_eq!(desk.owner, "casey");
        assert_eq!(desk.state, DeskState::Reserved);
        assert!(desk.note.is_empty());
        assert!(desk.stopped_at.is_none());
    }

    #[test]
    fn live_states_hold_the_name() {
        let dir = tempdir().unwrap();
        let config = Config::for_test(dir.path());

        for state in [DeskState::Reserved, DeskState::Active, DeskState::Saved] {
            let mut current = fresh_reservation(None, "gpu-a", "mika", &config).unwrap();
            current.state = state;
            let err = fresh_reservation(Some(current), "gpu-a", "casey", &config).unwrap_err();
            assert_eq!(err.code(), "name_taken");
            assert!(err.to_string().contains(&state.to_string()));
        }
    }
}
