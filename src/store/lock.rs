use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{HotdeskError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Acquire an exclusive lock on a file, returning the locked File
/// handle. A held lock is retried every 50ms until `timeout` elapses,
/// then the attempt fails with `lock_timeout`. The lock is released
/// when the File is dropped.
pub fn acquire_lock(path: &Path, timeout: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    let started = Instant::now();
    loop {
        if file.try_lock_exclusive().is_ok() {
            return Ok(file);
        }
        if started.elapsed() >= timeout {
            return Err(HotdeskError::LockTimeout(path.display().to_string()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Release lock explicitly (normally handled by Drop).
pub fn release_lock(file: File) -> Result<()> {
    file.unlock()?;
    Ok(())
}
