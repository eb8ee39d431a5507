use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{HotdeskError, Result};
use crate::model::DeskRecord;
use crate::store::{lock, write_atomic};

/// Manages desk records under the hotdesk state directory.
///
/// One JSON document per desk plus one lock file per desk, so
/// operations on different desks never serialize against each other.
/// Readers take no lock; the atomic replace on every write guarantees
/// they see a complete document.
pub struct DeskStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl DeskStore {
    pub fn open(state_dir: &Path, lock_timeout: Duration) -> Self {
        Self {
            root: state_dir.to_path_buf(),
            lock_timeout,
        }
    }

    /// Create the state directory layout. Idempotent.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.desks_dir())?;
        fs::create_dir_all(self.locks_dir())?;
        fs::create_dir_all(self.saves_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    // -- path helpers -------------------------------------------------------

    fn desks_dir(&self) -> PathBuf {
        self.root.join("desks")
    }

    pub(crate) fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    fn saves_dir(&self) -> PathBuf {
        self.root.join("saves")
    }

    fn desk_path(&self, name: &str) -> PathBuf {
        self.desks_dir().join(format!("{name}.json"))
    }

    fn desk_lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir().join(format!("desk.{name}.lock"))
    }

    // -- records ------------------------------------------------------------

    /// Validate a desk name: non-empty, ASCII alphanumeric + hyphen +
    /// underscore. Keeps names safe as file names, tmux socket names
    /// and cgroup directory names.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HotdeskError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Read a desk record without taking a lock.
    pub fn get(&self, name: &str) -> Result<DeskRecord> {
        Self::validate_name(name)?;
        self.read_record(name)?
            .ok_or_else(|| HotdeskError::DeskNotFound(name.to_string()))
    }

    fn read_record(&self, name: &str) -> Result<Option<DeskRecord>> {
        let path = self.desk_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&content).map_err(|e| {
            HotdeskError::StorageCorrupt(path.display().to_string(), e.to_string())
        })?;
        Ok(Some(record))
    }

    fn put_unlocked(&self, name: &str, record: &DeskRecord) -> Result<()> {
        debug_assert_eq!(record.name, name);
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&self.desk_path(name), &json)
    }

    /// Locked read-modify-write on one desk record.
    ///
    /// `apply` receives the committed record (or `None` when the name
    /// has never been used) and returns the record to persist, or an
    /// error to leave the file untouched. Two racing updates
    /// serialize on the desk lock; the loser's `apply` sees the
    /// winner's committed state.
    pub fn update<F>(&self, name: &str, apply: F) -> Result<DeskRecord>
    where
        F: FnOnce(Option<DeskRecord>) -> Result<DeskRecord>,
    {
        Self::validate_name(name)?;
        self.ensure_dirs()?;

        let lock = lock::acquire_lock(&self.desk_lock_path(name), self.lock_timeout)?;
        let result = self
            .read_record(name)
            .and_then(apply)
            .and_then(|mut record| {
                record.touch();
                self.put_unlocked(name, &record)?;
                Ok(record)
            });
        lock::release_lock(lock)?;
        result
    }

    /// List every desk record, sorted by name. A corrupt record is
    /// reported on stderr and skipped rather than failing the listing;
    /// `get` on that name still surfaces the corruption.
    pub fn list(&self) -> Result<Vec<DeskRecord>> {
        let dir = self.desks_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut desks = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<DeskRecord>(&content) {
                Ok(record) => desks.push(record),
                Err(e) => {
                    eprintln!("warning: skipping corrupt desk record {}: {e}", path.display());
                }
            }
        }
        desks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(desks)
    }

    // -- save documents -----------------------------------------------------

    /// Write a full save snapshot document for a desk. One file per
    /// save so history survives later saves.
    pub fn write_save(
        &self,
        name: &str,
        captured_at: DateTime<Utc>,
        document: &serde_json::Value,
    ) -> Result<PathBuf> {
        self.ensure_dirs()?;
        let ts = captured_at.format("%Y%m%dT%H%M%SZ");
        let path = self.saves_dir().join(format!("{name}.{ts}.json"));
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&path, &json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeskState;
    use std::thread;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, DeskStore) {
        let dir = tempdir().unwrap();
        let store = DeskStore::open(dir.path(), Duration::from_millis(500));
        store.ensure_dirs().unwrap();
        (dir, store)
    }

    fn record(name: &str) -> DeskRecord {
        DeskRecord::new(name, "mika", PathBuf::from("/tmp/work").join(name))
    }

    #[test]
    fn ensure_dirs_creates_structure() {
        let (dir, store) = setup();
        assert!(dir.path().join("desks").is_dir());
        assert!(dir.path().join("locks").is_dir());
        assert!(dir.path().join("saves").is_dir());
        // Idempotent
        store.ensure_dirs().unwrap();
    }

    #[test]
    fn validate_name_rules() {
        assert!(DeskStore::validate_name("gpu-a_1").is_ok());
        assert!(DeskStore::validate_name("").is_err());
        assert!(DeskStore::validate_name("bad name").is_err());
        assert!(DeskStore::validate_name("../escape").is_err());
        assert!(DeskStore::validate_name("sémantique").is_err());
    }

    #[test]
    fn update_creates_then_get_round_trips() {
        let (_dir, store) = setup();
        store.update("gpu-a", |_| Ok(record("gpu-a"))).unwrap();

        let read = store.get("gpu-a").unwrap();
        assert_eq!(read.name, "gpu-a");
        assert_eq!(read.state, DeskState::Reserved);
    }

    #[test]
    fn get_missing_is_desk_not_found() {
        let (_dir, store) = setup();
        let err = store.get("nope").unwrap_err();
        assert!(matches!(err, HotdeskError::DeskNotFound(_)));
        assert_eq!(err.code(), "desk_not_found");
    }

    #[test]
    fn update_sees_committed_record() {
        let (_dir, store) = setup();
        store.update("gpu-a", |_| Ok(record("gpu-a"))).unwrap();

        store
            .update("gpu-a", |existing| {
                let mut rec = existing.expect("record should exist");
                rec.state = DeskState::Active;
                Ok(rec)
            })
            .unwrap();

        assert_eq!(store.get("gpu-a").unwrap().state, DeskState::Active);
    }

    #[test]
    fn failed_update_leaves_record_untouched() {
        let (_dir, store) = setup();
        store.update("gpu-a", |_| Ok(record("gpu-a"))).unwrap();

        let err = store
            .update("gpu-a", |existing| {
                let rec = existing.expect("record should exist");
                Err(HotdeskError::NameTaken(rec.name, rec.state.to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, HotdeskError::NameTaken(_, _)));

        // And the lock is free again afterwards.
        let read = store.get("gpu-a").unwrap();
        assert_eq!(read.state, DeskState::Reserved);
        store
            .update("gpu-a", |existing| Ok(existing.unwrap()))
            .unwrap();
    }

    #[test]
    fn corrupt_record_surfaces_on_get_but_not_list() {
        let (dir, store) = setup();
        store.update("good", |_| Ok(record("good"))).unwrap();
        fs::write(dir.path().join("desks/bad.json"), "{not json").unwrap();

        let err = store.get("bad").unwrap_err();
        assert!(matches!(err, HotdeskError::StorageCorrupt(_, _)));

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "good");
    }

    #[test]
    fn list_sorts_by_name() {
        let (_dir, store) = setup();
        for name in ["zeta", "alpha", "mid"] {
            store.update(name, |_| Ok(record(name))).unwrap();
        }
        let names: Vec<String> = store.list().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn concurrent_updates_on_one_name_have_one_winner() {
        let (dir, store) = setup();
        drop(store);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let root = dir.path().to_path_buf();
            handles.push(thread::spawn(move || {
                let store = DeskStore::open(&root, Duration::from_secs(5));
                store.update("contested", |existing| match existing {
                    Some(rec) if rec.state.holds_name() => {
                        Err(HotdeskError::NameTaken(rec.name, rec.state.to_string()))
                    }
                    _ => Ok(record("contested")),
                })
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => wins += 1,
                Err(HotdeskError::NameTaken(_, _)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn concurrent_field_updates_serialize_without_lost_writes() {
        let (dir, store) = setup();
        store.update("busy", |_| Ok(record("busy"))).unwrap();
        drop(store);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let root = dir.path().to_path_buf();
            handles.push(thread::spawn(move || {
                let store = DeskStore::open(&root, Duration::from_secs(5));
                for _ in 0..10 {
                    store
                        .update("busy", |existing| {
                            let mut rec = existing.expect("record should exist");
                            rec.note.push('x');
                            Ok(rec)
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let store = DeskStore::open(dir.path(), Duration::from_secs(5));
        assert_eq!(store.get("busy").unwrap().note.len(), 40);
    }

    #[test]
    fn write_save_places_document_under_saves() {
        let (dir, store) = setup();
        let doc = serde_json::json!({"pids": [1, 2, 3]});
        let path = store.write_save("gpu-a", Utc::now(), &doc).unwrap();

        assert!(path.starts_with(dir.path().join("saves")));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("pids"));
    }
}
