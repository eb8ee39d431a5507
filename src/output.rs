use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::model::{DeskRecord, DeskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

pub fn print_desk(desk: &DeskRecord, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(desk)?),
        Format::Pretty => {
            println!(
                "{} {} {}",
                format!("[{}]", desk.name).cyan().bold(),
                style_state(desk.state),
                format!("owner {}", desk.owner).dimmed(),
            );
            println!("  workdir: {}", desk.workdir.display());
            if let Some(tracking) = &desk.tracking {
                println!("  tracking: {}", tracking.mode());
            }
            if !desk.note.is_empty() {
                println!("  note: {}", desk.note);
            }
            if let Some(snapshot) = &desk.last_snapshot {
                let kind = if snapshot.auto { "auto" } else { "manual" };
                println!(
                    "  last save: {} ({kind}, {} procs)",
                    format_time_short(&snapshot.captured_at),
                    snapshot.pid_count,
                );
            }
        }
        Format::Minimal => println!("{} {}", desk.name, desk.state),
    }
    Ok(())
}

pub fn style_state(state: DeskState) -> String {
    match state {
        DeskState::Reserved => "reserved".yellow().to_string(),
        DeskState::Active => "active".green().to_string(),
        DeskState::Saved => "saved".cyan().to_string(),
        DeskState::Stopped => "stopped".dimmed().to_string(),
    }
}

/// Short local-time stamp for board listings, `MM/DD HH:MM`.
pub fn format_time_short(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%m/%d %H:%M").to_string()
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}
