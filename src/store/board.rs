use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::error::{HotdeskError, Result};
use crate::message_id::MessageId;
use crate::model::Message;
use crate::store::desks::DeskStore;
use crate::store::{lock, write_atomic};

/// Messages kept on the board; older ones are trimmed at post time.
pub const RETAIN_MESSAGES: usize = 500;

const ID_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Counter {
    next_seq: u64,
}

/// Shared message board for everyone on the host.
///
/// One JSON log plus a counter file under `board/`, serialized by a
/// single board lock. `seq` from the counter gives messages a total
/// order independent of wall-clock skew between writers. Reads take
/// no lock; writers replace the log atomically.
pub struct MessageBoard {
    root: PathBuf,
    lock_timeout: Duration,
}

impl MessageBoard {
    pub fn open(state_dir: &Path, lock_timeout: Duration) -> Self {
        Self {
            root: state_dir.to_path_buf(),
            lock_timeout,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.board_dir())?;
        fs::create_dir_all(self.locks_dir())?;

        let messages_path = self.messages_path();
        if !messages_path.exists() {
            fs::write(messages_path, "[]")?;
        }

        let counter_path = self.counter_path();
        if !counter_path.exists() {
            fs::write(counter_path, r#"{"next_seq":1}"#)?;
        }

        Ok(())
    }

    fn board_dir(&self) -> PathBuf {
        self.root.join("board")
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    fn messages_path(&self) -> PathBuf {
        self.board_dir().join("messages.json")
    }

    fn counter_path(&self) -> PathBuf {
        self.board_dir().join("counter.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.locks_dir().join("board.lock")
    }

    fn read_messages(&self) -> Result<Vec<Message>> {
        let path = self.messages_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| HotdeskError::StorageCorrupt(path.display().to_string(), e.to_string()))
    }

    fn write_messages_locked(&self, messages: &[Message]) -> Result<()> {
        write_atomic(&self.messages_path(), &serde_json::to_string_pretty(messages)?)
    }

    fn next_seq_locked(&self) -> Result<u64> {
        let path = self.counter_path();
        let content = fs::read_to_string(&path)?;
        let mut counter: Counter = serde_json::from_str(&content)
            .map_err(|e| HotdeskError::StorageCorrupt(path.display().to_string(), e.to_string()))?;

        let seq = counter.next_seq;
        counter.next_seq += 1;
        write_atomic(&path, &serde_json::to_string(&counter)?)?;
        Ok(seq)
    }

    fn fresh_id(existing: &[Message]) -> Result<MessageId> {
        for _ in 0..ID_ATTEMPTS {
            let id = MessageId::generate()?;
            if !existing.iter().any(|m| m.id == id) {
                return Ok(id);
            }
        }
        Err(HotdeskError::Io(io::Error::other(
            "could not allocate a unique message id",
        )))
    }

    /// Post a message, optionally as a reply. The parent is resolved
    /// against the log under the board lock, so a reply to a missing
    /// message fails before anything is appended.
    pub fn post(
        &self,
        desk: &str,
        author: &str,
        text: &str,
        parent: Option<&MessageId>,
    ) -> Result<Message> {
        DeskStore::validate_name(desk)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(HotdeskError::EmptyMessage);
        }

        self.ensure_dirs()?;

        let lock = lock::acquire_lock(&self.lock_path(), self.lock_timeout)?;

        let mut messages = self.read_messages()?;

        if let Some(parent) = parent
            && !messages.iter().any(|m| m.id == *parent)
        {
            return Err(HotdeskError::MessageNotFound(parent.to_string()));
        }

        let message = Message {
            id: Self::fresh_id(&messages)?,
            seq: self.next_seq_locked()?,
            desk: desk.to_string(),
            author: author.to_string(),
            parent: parent.cloned(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        messages.push(message.clone());
        if messages.len() > RETAIN_MESSAGES {
            let excess = messages.len() - RETAIN_MESSAGES;
            messages.drain(..excess);
        }
        self.write_messages_locked(&messages)?;

        lock::release_lock(lock)?;

        Ok(message)
    }

    /// All messages in `seq` order, optionally only the most recent
    /// `limit` (still returned oldest-first).
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<Message>> {
        let mut messages = self.read_messages()?;
        messages.sort_by_key(|m| m.seq);
        if let Some(limit) = limit {
            let len = messages.len();
            if len > limit {
                messages = messages.split_off(len - limit);
            }
        }
        Ok(messages)
    }

    pub fn get(&self, id: &MessageId) -> Result<Message> {
        self.read_messages()?
            .into_iter()
            .find(|m| m.id == *id)
            .ok_or_else(|| HotdeskError::MessageNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::{TempDir, tempdir};

    fn setup_board() -> (TempDir, MessageBoard) {
        let dir = tempdir().unwrap();
        let board = MessageBoard::open(dir.path(), Duration::from_secs(5));
        board.ensure_dirs().unwrap();
        (dir, board)
    }

    #[test]
    fn post_and_get_message() {
        let (_dir, board) = setup_board();

        let msg = board
            .post("gpu-a", "mika", "rebooting the data loader", None)
            .unwrap();
        assert_eq!(msg.seq, 1);
        assert_eq!(msg.desk, "gpu-a");
        assert!(msg.parent.is_none());

        let fetched = board.get(&msg.id).unwrap();
        assert_eq!(fetched.text, "rebooting the data loader");
        assert_eq!(fetched.author, "mika");
    }

    #[test]
    fn seq_is_monotonic_across_posts() {
        let (_dir, board) = setup_board();

        let first = board.post("gpu-a", "mika", "one", None).unwrap();
        let second = board.post("gpu-b", "ren", "two", None).unwrap();
        let third = board.post("gpu-a", "mika", "three", None).unwrap();

        assert_eq!(
            vec![first.seq, second.seq, third.seq],
            vec![1, 2, 3]
        );
    }

    #[test]
    fn empty_or_whitespace_text_rejected() {
        let (_dir, board) = setup_board();

        let err = board.post("gpu-a", "mika", "   ", None).unwrap_err();
        assert!(matches!(err, HotdeskError::EmptyMessage));
        assert!(board.list(None).unwrap().is_empty());
    }

    #[test]
    fn invalid_desk_name_rejected() {
        let (_dir, board) = setup_board();

        let err = board.post("bad desk", "mika", "hello", None).unwrap_err();
        assert!(matches!(err, HotdeskError::InvalidName(_)));
    }

    #[test]
    fn reply_links_parent_and_orders_after_it() {
        let (_dir, board) = setup_board();

        let parent = board.post("gpu-a", "mika", "anyone on gpu 3?", None).unwrap();
        let reply = board
            .post("gpu-b", "ren", "mine until 6pm", Some(&parent.id))
            .unwrap();

        assert_eq!(reply.parent.as_ref(), Some(&parent.id));
        assert!(reply.seq > parent.seq);

        let listed = board.list(None).unwrap();
        assert_eq!(listed[0].id, parent.id);
        assert_eq!(listed[1].id, reply.id);
    }

    #[test]
    fn reply_to_missing_parent_appends_nothing() {
        let (_dir, board) = setup_board();
        board.post("gpu-a", "mika", "only message", None).unwrap();

        let ghost: MessageId = "00000000".parse().unwrap();
        let err = board
            .post("gpu-b", "ren", "re: nothing", Some(&ghost))
            .unwrap_err();
        assert!(matches!(err, HotdeskError::MessageNotFound(_)));

        let listed = board.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "only message");
    }

    #[test]
    fn list_limit_keeps_most_recent_in_order() {
        let (_dir, board) = setup_board();
        for i in 0..5 {
            board.post("gpu-a", "mika", &format!("m{i}"), None).unwrap();
        }

        let tail = board.list(Some(2)).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "m3");
        assert_eq!(tail[1].text, "m4");
    }

    #[test]
    fn concurrent_posts_all_land_exactly_once() {
        let (dir, board) = setup_board();
        drop(board);

        let mut handles = Vec::new();
        for t in 0..4 {
            let root = dir.path().to_path_buf();
            handles.push(thread::spawn(move || {
                let board = MessageBoard::open(&root, Duration::from_secs(5));
                for i in 0..5 {
                    board
                        .post("gpu-a", &format!("user-{t}"), &format!("t{t}m{i}"), None)
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let board = MessageBoard::open(dir.path(), Duration::from_secs(5));
        let messages = board.list(None).unwrap();
        assert_eq!(messages.len(), 20);

        let mut seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 20, "every post should get a distinct seq");

        let mut ids: Vec<&MessageId> = messages.iter().map(|m| &m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20, "every post should get a distinct id");
    }

    #[test]
    fn retention_trims_oldest_messages() {
        let (_dir, board) = setup_board();

        for i in 0..(RETAIN_MESSAGES + 2) {
            board.post("gpu-a", "mika", &format!("m{i}"), None).unwrap();
        }

        let messages = board.list(None).unwrap();
        assert_eq!(messages.len(), RETAIN_MESSAGES);
        assert_eq!(messages[0].text, "m2");
        assert_eq!(
            messages.last().unwrap().text,
            format!("m{}", RETAIN_MESSAGES + 1)
        );
    }

    #[test]
    fn corrupt_log_returns_storage_corrupt() {
        let (dir, board) = setup_board();
        fs::write(dir.path().join("board/messages.json"), "not valid json").unwrap();

        let err = board.list(None).unwrap_err();
        assert!(matches!(err, HotdeskError::StorageCorrupt(_, _)));
        assert_eq!(err.code(), "storage_corrupt");
    }
}
