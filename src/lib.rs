//! Desk coordination for a shared Linux account.
//!
//! Several people share one OS user on one host. hotdesk gives each of
//! them a named "desk": a dedicated tmux server/session pair plus a
//! record on a shared board saying who holds the name, what state it
//! is in and which processes belong to it. Tracking uses a per-desk
//! cgroup v2 directory when the host allows it and falls back to tmux
//! pane ancestry when it does not. Coordination, not isolation:
//! everything still runs as the same account.

pub mod commands;
pub mod config;
pub mod error;
pub mod identity;
pub mod message_id;
pub mod model;
pub mod output;
pub mod store;
pub mod tmux;
pub mod track;
