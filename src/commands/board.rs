use colored::Colorize;

use crate::config::Config;
use crate::error::{HotdeskError, Result};
use crate::identity;
use crate::message_id::MessageId;
use crate::model::Message;
use crate::output::{Format, format_time_short, truncate_text};

pub fn msg(config: &Config, desk: &str, text: Option<String>, format: Format) -> Result<()> {
    let board = super::message_board(config);
    let author = identity::resolve_user();

    let text = match text {
        Some(text) => text,
        None => super::read_text_or_prompt("Message")?,
    };

    let message = board.post(desk, &author, &text, None)?;
    print_posted(&message, None, format)
}

pub fn reply(
    config: &Config,
    desk: &str,
    id: &str,
    text: Option<String>,
    format: Format,
) -> Result<()> {
    let board = super::message_board(config);
    let author = identity::resolve_user();

    let parent_id = parse_id(id)?;
    let parent = board.get(&parent_id)?;

    let text = match text {
        Some(text) => text,
        None => {
            eprintln!(
                "Replying to {}: {}",
                parent.desk,
                truncate_text(&parent.text, 50)
            );
            super::read_text_or_prompt("Reply")?
        }
    };

    // The parent is checked again under the board lock inside post.
    let message = board.post(desk, &author, &text, Some(&parent_id))?;
    print_posted(&message, Some(&parent), format)
}

pub fn messages(config: &Config, limit: usize, format: Format) -> Result<()> {
    let board = super::message_board(config);
    // Full log, not just the window: replies render their parent desk
    // even when the parent scrolled out of the recent slice.
    let all = board.list(None)?;

    if all.is_empty() {
        match format {
            Format::Json => println!("[]"),
            Format::Pretty => {
                println!("No messages yet. Post one with: hotdesk msg <name> <text>")
            }
            Format::Minimal => {}
        }
        return Ok(());
    }

    let start = all.len().saturating_sub(limit);
    let recent = &all[start..];

    match format {
        Format::Json => println!("{}", serde_json::to_string(recent)?),
        Format::Minimal => {
            for m in recent {
                println!("{} {} {}", m.seq, m.id, m.desk);
            }
        }
        Format::Pretty => print_board(&all, recent),
    }
    Ok(())
}

/// A malformed id can never resolve, so it reports the same way as an
/// unknown one.
fn parse_id(raw: &str) -> Result<MessageId> {
    raw.parse()
        .map_err(|_| HotdeskError::MessageNotFound(raw.to_string()))
}

fn print_posted(message: &Message, parent: Option<&Message>, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(message)?),
        Format::Pretty => match parent {
            Some(parent) => println!(
                "{} [{}] {} → {}: {}",
                "Replied".green(),
                message.id.to_string().cyan(),
                message.desk.bold(),
                parent.desk.dimmed(),
                message.text,
            ),
            None => println!(
                "{} [{}] {}: {}",
                "Posted".green(),
                message.id.to_string().cyan(),
                message.desk.bold(),
                message.text,
            ),
        },
        Format::Minimal => println!("{}", message.id),
    }
    Ok(())
}

fn print_board(all: &[Message], recent: &[Message]) {
    println!();
    println!(
        "{} (last {} of {})",
        "Message Board".bold(),
        recent.len(),
        all.len()
    );
    println!();

    for m in recent {
        let time = format_time_short(&m.created_at).dimmed();
        let id = format!("[{}]", m.id).cyan();
        let parent = m
            .parent
            .as_ref()
            .and_then(|pid| all.iter().find(|p| p.id == *pid));
        match parent {
            Some(parent) => println!(
                "  {time} {id} {} → {}: {}",
                m.desk.bold(),
                parent.desk.dimmed(),
                m.text
            ),
            None => println!("  {time} {id} {}: {}", m.desk.bold(), m.text),
        }
    }

    println!();
    println!(
        "{}",
        "Commands: hotdesk msg <name> <text> | hotdesk reply <name> <id> <text>".dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_reads_as_not_found() {
        let err = parse_id("not-an-id").unwrap_err();
        assert_eq!(err.code(), "message_not_found");
        assert!(err.to_string().contains("not-an-id"));
    }

    #[test]
    fn id_parse_normalizes_case() {
        let id = parse_id(" ABCD1234 ").unwrap();
        assert_eq!(id.as_str(), "abcd1234");
    }
}
