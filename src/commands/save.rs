use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::model::{DeskRecord, DeskState};
use crate::output::Format;
use crate::track::Tracker;

pub fn run(config: &Config, name: &str, format: Format) -> Result<()> {
    let store = super::desk_store(config);

    // Fail fast before prompting for a note; the real guard runs again
    // under the desk lock.
    savable(Some(store.get(name)?), name)?;
    let note = super::read_text_or_prompt("Note (optional)")?;

    let mut save_path = PathBuf::new();
    let desk = store.update(name, |existing| {
        let mut record = savable(existing, name)?;
        let (summary, document) = Tracker::new(&record).capture(&note, false);
        save_path = store.write_save(&record.name, summary.captured_at, &document)?;
        record.state = DeskState::Saved;
        record.saved_at = Some(summary.captured_at);
        record.note = note.clone();
        record.last_snapshot = Some(summary);
        Ok(record)
    })?;

    print_saved(&desk, &save_path, format)
}

/// Save captures live process state, so only a desk with a session
/// qualifies. Repeat saves on a `Saved` desk refresh the snapshot.
pub(crate) fn savable(existing: Option<DeskRecord>, name: &str) -> Result<DeskRecord> {
    let record = existing.ok_or_else(|| HotdeskError::DeskNotFound(name.to_string()))?;
    match record.state {
        DeskState::Active | DeskState::Saved => Ok(record),
        DeskState::Stopped => Err(HotdeskError::DeskStopped(name.to_string())),
        other => Err(HotdeskError::InvalidTransition(
            other.to_string(),
            DeskState::Saved.to_string(),
        )),
    }
}

fn print_saved(desk: &DeskRecord, save_path: &Path, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let doc = serde_json::json!({
                "desk": desk,
                "save_path": save_path,
            });
            println!("{}", serde_json::to_string(&doc)?);
        }
        Format::Pretty => {
            let pid_count = desk.last_snapshot.as_ref().map_or(0, |s| s.pid_count);
            println!(
                "{} desk '{}' ({} tracked processes)",
                "Saved".green().bold(),
                desk.name,
                pid_count
            );
            if let Some(snapshot) = &desk.last_snapshot
                && !snapshot.top.is_empty()
            {
                println!("  {}", snapshot.top.join(", ").dimmed());
            }
            if !desk.note.is_empty() {
                println!("  note: {}", desk.note);
            }
            println!("  save: {}", save_path.display());
        }
        Format::Minimal => println!("{}", save_path.display()),
    }
    Ok(())
}
