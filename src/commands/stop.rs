use std::path::PathBuf;

use chrono::Utc;
use colored::Colorize;

use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::model::{DeskRecord, DeskState, Tracking};
use crate::output::Format;
use crate::store::desks::DeskStore;
use crate::tmux;
use crate::track::cgroup::CgroupDir;
use crate::track::{self, Tracker};

#[derive(Default)]
pub(crate) struct StopOutcome {
    signaled: usize,
    save_path: Option<PathBuf>,
}

pub fn run(config: &Config, name: &str, format: Format) -> Result<()> {
    let store = super::desk_store(config);

    let mut outcome = StopOutcome::default();
    let desk = store.update(name, |existing| {
        shutdown(existing, name, &store, &mut outcome)
    })?;

    print_stopped(&desk, &outcome, format)
}

/// Check out: auto-save if the desk ran since its last save, kill the
/// tmux session, TERM the tracked processes and release the cgroup.
/// Runs under the desk lock so a racing save or resume serializes
/// cleanly before or after.
pub(crate) fn shutdown(
    existing: Option<DeskRecord>,
    name: &str,
    store: &DeskStore,
    outcome: &mut StopOutcome,
) -> Result<DeskRecord> {
    let mut record = existing.ok_or_else(|| HotdeskError::DeskNotFound(name.to_string()))?;
    if record.state == DeskState::Stopped {
        return Err(HotdeskError::DeskStopped(name.to_string()));
    }

    // Collect fallback kill targets before the session dies; pane
    // ancestry is unreadable once tmux is gone.
    let tracker = Tracker::new(&record);
    let table = tracker.snapshot_table();
    let fallback_pids = tracker.pids(&table);

    let auto_save = if record.state == DeskState::Active {
        // Always a fresh capture: the final snapshot must reflect what
        // was live at stop time, not at the last manual save.
        let note = if record.note.is_empty() {
            "(auto-save on stop)".to_string()
        } else {
            record.note.clone()
        };
        Some(tracker.capture(&note, true))
    } else {
        None
    };
    if let Some((summary, document)) = auto_save {
        match store.write_save(&record.name, summary.captured_at, &document) {
            Ok(path) => {
                record.saved_at = Some(summary.captured_at);
                record.last_snapshot = Some(summary);
                outcome.save_path = Some(path);
            }
            Err(e) => eprintln!("{} auto-save failed: {e}", "warning:".yellow()),
        }
    }

    let _ = tmux::kill_session(&record.session);

    let me = std::process::id();
    let mut signaled = match &record.tracking {
        Some(Tracking::Cgroup { path }) => {
            CgroupDir::open(path.clone()).signal_all(libc::SIGTERM, &[me])
        }
        _ => 0,
    };
    if signaled == 0 {
        signaled = track::signal_pids(&fallback_pids, libc::SIGTERM, &[me]);
    }
    outcome.signaled = signaled;

    if let Some(Tracking::Cgroup { path }) = &record.tracking {
        // Succeeds only once every member is gone.
        CgroupDir::open(path.clone()).try_remove();
    }

    record.state = DeskState::Stopped;
    record.stopped_at = Some(Utc::now());
    Ok(record)
}

fn print_stopped(desk: &DeskRecord, outcome: &StopOutcome, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let doc = serde_json::json!({
                "desk": desk,
                "signaled": outcome.signaled,
                "auto_save": outcome.save_path,
            });
            println!("{}", serde_json::to_string(&doc)?);
        }
        Format::Pretty => {
            if let Some(path) = &outcome.save_path {
                println!("Auto-saved: {}", path.display());
            }
            println!(
                "Stopped desk '{}'. Signaled ~{} process(es) with TERM.",
                desk.name.bold(),
                outcome.signaled
            );
        }
        Format::Minimal => println!("{} stopped", desk.name),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, DeskStore) {
        let dir = tempdir().unwrap();
        let store = DeskStore::open(dir.path(), Duration::from_millis(500));
        store.ensure_dirs().unwrap();
        (dir, store)
    }

    fn desk_in(state: DeskState, dir: &TempDir) -> DeskRecord {
        let mut record = DeskRecord::new("gpu-a", "mika", dir.path().join("work/gpu-a"));
        record.state = state;
        record
    }

    #[test]
    fn missing_desk_cannot_stop() {
        let (_dir, store) = setup();
        let mut outcome = StopOutcome::default();
        let err = shutdown(None, "gpu-a", &store, &mut outcome).unwrap_err();
        assert_eq!(err.code(), "desk_not_found");
    }

    #[test]
    fn second_stop_reports_desk_stopped() {
        let (dir, store) = setup();
        let mut outcome = StopOutcome::default();
        let err = shutdown(
            Some(desk_in(DeskState::Stopped, &dir)),
            "gpu-a",
            &store,
            &mut outcome,
        )
        .unwrap_err();
        assert_eq!(err.code(), "desk_stopped");
    }

    #[test]
    fn reserved_desk_stops_without_auto_save() {
        let (dir, store) = setup();
        let mut outcome = StopOutcome::default();
        let stopped = shutdown(
            Some(desk_in(DeskState::Reserved, &dir)),
            "gpu-a",
            &store,
            &mut outcome,
        )
        .unwrap();

        assert_eq!(stopped.state, DeskState::Stopped);
        assert!(stopped.stopped_at.is_some());
        assert!(stopped.last_snapshot.is_none());
        assert!(outcome.save_path.is_none());
        assert_eq!(outcome.signaled, 0);
    }

    #[test]
    fn active_desk_auto_saves_before_stopping() {
        let (dir, store) = setup();
        // A desk saved earlier and resumed keeps its old saved_at; the
        // stop capture must replace it, not trust it.
        let mut record = desk_in(DeskState::Active, &dir);
        record.saved_at = Some(Utc::now() - chrono::Duration::minutes(5));

        let before = Utc::now();
        let mut outcome = StopOutcome::default();
        let stopped = shutdown(Some(record), "gpu-a", &store, &mut outcome).unwrap();

        let path = outcome.save_path.expect("auto-save should have landed");
        assert!(path.exists());
        assert!(stopped.saved_at.unwrap() >= before);
        let snapshot = stopped.last_snapshot.expect("summary should be recorded");
        assert!(snapshot.auto);
        assert!(snapshot.captured_at >= before);
        assert_eq!(snapshot.note, "(auto-save on stop)");
        // The synthetic note stays out of the record itself.
        assert!(stopped.note.is_empty());
    }

    #[test]
    fn auto_save_keeps_user_note() {
        let (dir, store) = setup();
        let mut record = desk_in(DeskState::Active, &dir);
        record.note = "training run".into();

        let mut outcome = StopOutcome::default();
        let stopped = shutdown(Some(record), "gpu-a", &store, &mut outcome).unwrap();
        assert_eq!(stopped.last_snapshot.unwrap().note, "training run");
        assert_eq!(stopped.note, "training run");
    }

    #[test]
    fn saved_desk_stops_without_recapture() {
        let (dir, store) = setup();
        let mut record = desk_in(DeskState::Saved, &dir);
        record.saved_at = Some(Utc::now());

        let mut outcome = StopOutcome::default();
        let stopped = shutdown(Some(record), "gpu-a", &store, &mut outcome).unwrap();
        assert_eq!(stopped.state, DeskState::Stopped);
        assert!(outcome.save_path.is_none());
    }

    #[test]
    fn racing_save_and_stop_serialize_on_the_desk_lock() {
        let (dir, store) = setup();
        store
            .update("racer", |_| {
                let mut record = DeskRecord::new("racer", "mika", dir.path().join("work/racer"));
                record.state = DeskState::Active;
                record.started_at = Some(Utc::now());
                Ok(record)
            })
            .unwrap();

        let save_root = dir.path().to_path_buf();
        let saver = std::thread::spawn(move || {
            let store = DeskStore::open(&save_root, Duration::from_secs(5));
            store.update("racer", |existing| {
                let mut record = super::super::save::savable(existing, "racer")?;
                let (summary, document) = Tracker::new(&record).capture("wip", false);
                store.write_save(&record.name, summary.captured_at, &document)?;
                record.state = DeskState::Saved;
                record.saved_at = Some(summary.captured_at);
                record.note = "wip".to_string();
                record.last_snapshot = Some(summary);
                Ok(record)
            })
        });

        let stop_root = dir.path().to_path_buf();
        let stopper = std::thread::spawn(move || {
            let store = DeskStore::open(&stop_root, Duration::from_secs(5));
            let mut outcome = StopOutcome::default();
            store.update("racer", |existing| {
                shutdown(existing, "racer", &store, &mut outcome)
            })
        });

        let save_result = saver.join().unwrap();
        let stopped = stopper.join().unwrap().unwrap();
        assert_eq!(stopped.state, DeskState::Stopped);

        // Whichever order the lock imposed, the committed record is a
        // whole document with a snapshot behind it.
        let final_record = store.get("racer").unwrap();
        assert_eq!(final_record.state, DeskState::Stopped);
        assert!(final_record.saved_at.is_some());
        match save_result {
            Ok(saved) => {
                assert_eq!(saved.state, DeskState::Saved);
                assert_eq!(final_record.note, "wip");
            }
            Err(e) => {
                assert_eq!(e.code(), "desk_stopped");
                assert!(final_record.note.is_empty());
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn cgroup_members_receive_term() {
        use std::process::Command;

        let (dir, store) = setup();
        let mut child = Command::new("sleep").arg("60").spawn().unwrap();

        // Fabricated membership file shaped like cgroup.procs.
        let cg = dir.path().join("cgroup/gpu-a");
        std::fs::create_dir_all(&cg).unwrap();
        std::fs::write(cg.join("cgroup.procs"), format!("{}\n", child.id())).unwrap();

        let mut record = desk_in(DeskState::Active, &dir);
        record.tracking = Some(Tracking::Cgroup { path: cg });

        let mut outcome = StopOutcome::default();
        let stopped = shutdown(Some(record), "gpu-a", &store, &mut outcome).unwrap();

        assert_eq!(outcome.signaled, 1);
        assert_eq!(stopped.state, DeskState::Stopped);
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
