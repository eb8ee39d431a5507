//! cgroup v2 membership tracking through cgroupfs.
//!
//! Each desk in cgroup mode owns one directory under the hotdesk base
//! (default `/sys/fs/cgroup/hotdesk`). The kernel maintains the member
//! list in `cgroup.procs`, so a desk's processes survive reparenting
//! to pid 1, which a pane-tree walk would lose.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{HotdeskError, Result};

/// True if the host has a cgroup v2 hierarchy mounted at the usual place.
pub fn is_cgroup2() -> bool {
    Path::new("/sys/fs/cgroup/cgroup.controllers").exists()
}

/// One desk's cgroup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupDir {
    path: PathBuf,
}

impl CgroupDir {
    /// Create `base/name`, making parents as needed. A permission
    /// failure means the base was never delegated to this user.
    pub fn create(base: &Path, name: &str) -> Result<Self> {
        let path = base.join(name);
        match fs::create_dir_all(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(HotdeskError::TrackingUnavailable(format!(
                    "cannot create cgroup {} (run `hotdesk setup-cgroup` for instructions)",
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wrap an existing path without touching the filesystem.
    pub fn open(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Move a process into this cgroup.
    pub fn add_pid(&self, pid: u32) -> Result<()> {
        fs::write(self.path.join("cgroup.procs"), format!("{pid}\n"))?;
        Ok(())
    }

    pub fn add_self(&self) -> Result<()> {
        self.add_pid(std::process::id())
    }

    /// Current member pids. A missing or unreadable cgroup reads as
    /// empty rather than an error, matching how status treats a desk
    /// whose processes have all exited.
    pub fn pids(&self) -> Vec<u32> {
        let Ok(text) = fs::read_to_string(self.path.join("cgroup.procs")) else {
            return Vec::new();
        };
        text.lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect()
    }

    /// Signal every member except the excluded pids. Returns how many
    /// signals were delivered; pids that raced to exit are skipped.
    pub fn signal_all(&self, sig: i32, exclude: &[u32]) -> usize {
        let mut count = 0;
        for pid in self.pids() {
            if exclude.contains(&pid) {
                continue;
            }
            let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
            if rc == 0 {
                count += 1;
            }
        }
        count
    }

    /// Remove the (empty) cgroup directory. Returns false when members
    /// remain or the directory is already gone.
    pub fn try_remove(&self) -> bool {
        fs::remove_dir(&self.path).is_ok()
    }
}

/// Best-effort check that we can create sub-cgroups under `base` and
/// move processes into them. Migrates this process into a throwaway
/// group and back out, then removes the group.
pub fn can_manage(base: &Path) -> bool {
    is_cgroup2() && probe(base).is_ok()
}

pub(crate) fn probe(base: &Path) -> std::io::Result<()> {
    fs::create_dir_all(base)?;
    let test = base.join(format!(".hotdesk_test_{}", std::process::id()));
    fs::create_dir(&test)?;
    let pid_line = format!("{}\n", std::process::id());
    let moved = fs::write(test.join("cgroup.procs"), &pid_line)
        .and_then(|()| fs::write(base.join("cgroup.procs"), &pid_line));
    // rmdir only succeeds once we are back in the parent group
    let removed = fs::remove_dir(&test);
    moved.and(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_makes_nested_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("cgroup/hotdesk");
        let cg = CgroupDir::create(&base, "alpha").unwrap();
        assert!(cg.exists());
        assert_eq!(cg.path(), base.join("alpha"));
    }

    #[test]
    fn pids_parses_member_list_and_tolerates_noise() {
        let dir = tempdir().unwrap();
        let cg = CgroupDir::create(dir.path(), "alpha").unwrap();
        assert!(cg.pids().is_empty());

        fs::write(cg.path().join("cgroup.procs"), "101\n\n202\nnot-a-pid\n303\n").unwrap();
        assert_eq!(cg.pids(), vec![101, 202, 303]);
    }

    #[test]
    fn add_pid_writes_procs_file() {
        let dir = tempdir().unwrap();
        let cg = CgroupDir::create(dir.path(), "alpha").unwrap();
        cg.add_pid(4242).unwrap();
        assert_eq!(cg.pids(), vec![4242]);
    }

    #[test]
    fn signal_zero_counts_live_members_and_honors_exclude() {
        let dir = tempdir().unwrap();
        let cg = CgroupDir::create(dir.path(), "alpha").unwrap();
        let me = std::process::id();
        cg.add_pid(me).unwrap();

        // Signal 0 probes liveness without delivering anything.
        assert_eq!(cg.signal_all(0, &[]), 1);
        assert_eq!(cg.signal_all(0, &[me]), 0);
    }

    #[test]
    fn try_remove_requires_empty_directory() {
        let dir = tempdir().unwrap();
        let cg = CgroupDir::create(dir.path(), "alpha").unwrap();
        cg.add_pid(1).unwrap();
        assert!(!cg.try_remove());

        fs::remove_file(cg.path().join("cgroup.procs")).unwrap();
        assert!(cg.try_remove());
        assert!(!cg.exists());
        assert!(!cg.try_remove());
    }

    #[test]
    fn probe_rejects_plain_directory() {
        // On a real cgroupfs the interface files vanish with the
        // directory; on a plain filesystem the written cgroup.procs
        // blocks rmdir, so the probe must come back negative.
        let dir = tempdir().unwrap();
        assert!(probe(dir.path()).is_err());
        assert!(!can_manage(dir.path()));
    }
}
