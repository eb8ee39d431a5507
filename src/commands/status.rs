use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::model::{DeskRecord, DeskState};
use crate::output::{Format, truncate_text};
use crate::store::desks::DeskStore;
use crate::track::proc::{ProcFs, ProcessEnumerator, ProcessTable};
use crate::track::{Liveness, TOP_STATUS_ITEMS, Tracker};

const NOTE_COLUMN_MAX: usize = 24;

pub(crate) struct StatusRow {
    pub(crate) desk: DeskRecord,
    pub(crate) activity: Option<Liveness>,
    pub(crate) top: Vec<String>,
}

pub fn run(config: &Config, state: Option<DeskState>, format: Format) -> Result<()> {
    let store = super::desk_store(config);
    let mut records = store.list()?;
    if let Some(state) = state {
        records.retain(|r| r.state == state);
    }

    if records.is_empty() {
        match format {
            Format::Json => println!("[]"),
            Format::Pretty => match state {
                Some(state) => println!("No {state} desks."),
                None => println!("Board is empty. Start with: hotdesk prepare <name>"),
            },
            Format::Minimal => {}
        }
        return Ok(());
    }

    // One /proc sweep shared by every desk on the board.
    let table = ProcFs.snapshot().unwrap_or_default();
    let rows = build_rows(records, &table);
    print_rows(&rows, format)
}

/// Desks that are live right now, shown before a reservation so the
/// next person coordinates instead of colliding.
pub(crate) fn print_active_preview(store: &DeskStore, exclude: &str) -> Result<()> {
    let records = store.list()?;
    let table = ProcFs.snapshot().unwrap_or_default();
    let rows: Vec<StatusRow> = build_rows(records, &table)
        .into_iter()
        .filter(|row| {
            row.desk.name != exclude
                && matches!(
                    row.activity,
                    Some(Liveness::Running { .. } | Liveness::Idle)
                )
        })
        .collect();

    if rows.is_empty() {
        println!("No active desks right now.");
        return Ok(());
    }

    println!("{}", "Active desks (coordinate offline)".bold());
    for row in &rows {
        let procs = match row.activity {
            Some(Liveness::Running { pid_count }) => format!("{pid_count} procs"),
            _ => "idle".to_string(),
        };
        let mut line = format!("  {}  {procs}", pad(&row.desk.name, 12).bold());
        if !row.top.is_empty() {
            line.push_str(&format!("  {}", row.top.join(", ")));
        }
        if !row.desk.note.is_empty() {
            let note = format!("({})", truncate_text(&row.desk.note, NOTE_COLUMN_MAX));
            line.push_str(&format!("  {}", note.dimmed()));
        }
        println!("{line}");
    }
    println!();
    Ok(())
}

/// Tracker queries run only for desks that can have processes; a
/// reserved or stopped desk gets a bare row. Liveness never rewrites
/// the stored state: an unreachable desk stays on the board until
/// someone stops it.
pub(crate) fn build_rows(records: Vec<DeskRecord>, table: &ProcessTable) -> Vec<StatusRow> {
    records
        .into_iter()
        .map(|desk| {
            let (activity, top) = match desk.state {
                DeskState::Active | DeskState::Saved => {
                    let tracker = Tracker::new(&desk);
                    let pids = tracker.pids(table);
                    (
                        Some(tracker.liveness(table)),
                        table.summarize(&pids, TOP_STATUS_ITEMS),
                    )
                }
                DeskState::Reserved | DeskState::Stopped => (None, Vec::new()),
            };
            StatusRow {
                desk,
                activity,
                top,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct StatusDoc<'a> {
    #[serde(flatten)]
    desk: &'a DeskRecord,
    activity: Option<String>,
    pid_count: usize,
    top: &'a [String],
}

impl<'a> StatusDoc<'a> {
    fn from_row(row: &'a StatusRow) -> Self {
        let pid_count = match row.activity {
            Some(Liveness::Running { pid_count }) => pid_count,
            _ => 0,
        };
        Self {
            desk: &row.desk,
            activity: row.activity.map(|a| a.to_string()),
            pid_count,
            top: &row.top,
        }
    }
}

fn print_rows(rows: &[StatusRow], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let docs: Vec<StatusDoc> = rows.iter().map(StatusDoc::from_row).collect();
            println!("{}", serde_json::to_string(&docs)?);
        }
        Format::Minimal => {
            for row in rows {
                let activity = row
                    .activity
                    .map_or_else(|| "-".to_string(), |a| a.to_string());
                println!("{} {} {activity}", row.desk.name, row.desk.state);
            }
        }
        Format::Pretty => print_table(rows),
    }
    Ok(())
}

const HEADERS: [&str; 7] = [
    "name",
    "state",
    "activity",
    "saved",
    "note",
    "procs",
    "top commands",
];

fn print_table(rows: &[StatusRow]) {
    let cells: Vec<[String; 7]> = rows.iter().map(row_cells).collect();

    let mut widths: [usize; 7] = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    println!("{}", "hotdesk status".bold());
    let header = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| pad(h, w))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header.dimmed());

    for (row, cell_row) in rows.iter().zip(&cells) {
        let mut parts = Vec::with_capacity(HEADERS.len());
        // Pad before colorizing so escape codes never skew alignment.
        for (i, (cell, width)) in cell_row.iter().zip(widths).enumerate() {
            let padded = pad(cell, width);
            parts.push(match i {
                0 => padded.bold().to_string(),
                1 => color_state(&padded, row.desk.state),
                2 => color_activity(&padded, row.activity),
                _ => padded,
            });
        }
        println!("{}", parts.join("  ").trim_end());
    }
}

/// Cell text per column: name, state, activity, saved, note, procs,
/// top commands.
fn row_cells(row: &StatusRow) -> [String; 7] {
    let desk = &row.desk;
    let activity = match row.activity {
        None => "-".to_string(),
        Some(Liveness::Running { pid_count }) => format!("running ({pid_count})"),
        Some(other) => other.to_string(),
    };
    let saved = if desk.saved_since_start() {
        "yes"
    } else if desk.started_at.is_none() {
        "-"
    } else {
        "no"
    };
    let procs = match row.activity {
        Some(Liveness::Running { pid_count }) => pid_count.to_string(),
        _ => String::new(),
    };
    [
        desk.name.clone(),
        desk.state.to_string(),
        activity,
        saved.to_string(),
        truncate_text(&desk.note, NOTE_COLUMN_MAX),
        procs,
        row.top.join(", "),
    ]
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.chars().count());
    format!("{text}{}", " ".repeat(fill))
}

fn color_state(padded: &str, state: DeskState) -> String {
    match state {
        DeskState::Reserved => padded.yellow().to_string(),
        DeskState::Active => padded.green().to_string(),
        DeskState::Saved => padded.cyan().to_string(),
        DeskState::Stopped => padded.dimmed().to_string(),
    }
}

fn color_activity(padded: &str, activity: Option<Liveness>) -> String {
    match activity {
        Some(Liveness::Running { .. }) => padded.green().to_string(),
        Some(Liveness::Idle) => padded.yellow().to_string(),
        Some(Liveness::Unreachable) => padded.red().to_string(),
        None => padded.to_string(),
    }
}
