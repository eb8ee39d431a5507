pub mod board;
pub mod prepare;
pub mod resume;
pub mod save;
pub mod setup_cgroup;
pub mod start;
pub mod status;
pub mod stop;

use std::io::{IsTerminal, Read, Write};

use crate::config::Config;
use crate::error::Result;
use crate::store::board::MessageBoard;
use crate::store::desks::DeskStore;

pub(crate) fn desk_store(config: &Config) -> DeskStore {
    DeskStore::open(&config.state_dir, config.lock_timeout)
}

pub(crate) fn message_board(config: &Config) -> MessageBoard {
    MessageBoard::open(&config.state_dir, config.lock_timeout)
}

/// Read free text without dedicated flags: piped stdin is consumed
/// whole, an interactive terminal gets a one-line prompt. The prompt
/// goes to stderr so stdout stays machine-readable.
pub(crate) fn read_text_or_prompt(prompt: &str) -> Result<String> {
    let mut stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut text = String::new();
        stdin.read_to_string(&mut text)?;
        return Ok(text.trim().to_string());
    }
    eprint!("{prompt}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
