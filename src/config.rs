use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How long a mutation waits for a desk or board lock before giving
/// up with a `lock_timeout` error. Override in milliseconds via
/// `HOTDESK_LOCK_TIMEOUT_MS`.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default cgroup v2 base under which per-desk groups are created.
pub const DEFAULT_CGROUP_BASE: &str = "/sys/fs/cgroup/hotdesk";

/// Runtime configuration, resolved once from the environment and
/// passed explicitly into stores and trackers.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub cgroup_base: PathBuf,
    pub work_base: Option<PathBuf>,
    pub lock_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            state_dir: resolve_state_dir(),
            cgroup_base: env::var("HOTDESK_CGROUP_BASE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CGROUP_BASE)),
            work_base: env::var("HOTDESK_WORK_BASE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            lock_timeout: resolve_lock_timeout(),
        }
    }

    #[cfg(test)]
    pub fn for_test(state_dir: &std::path::Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            cgroup_base: state_dir.join("cgroup"),
            work_base: Some(state_dir.join("work")),
            lock_timeout: Duration::from_millis(500),
        }
    }
}

/// `HOTDESK_STATE_DIR`, then `$XDG_STATE_HOME/hotdesk`, then
/// `~/.local/state/hotdesk`. `/var/tmp/hotdesk` is the last resort
/// when no home directory is resolvable.
fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = env::var("HOTDESK_STATE_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = env::var("XDG_STATE_HOME")
        && !xdg.is_empty()
    {
        return PathBuf::from(xdg).join("hotdesk");
    }
    if let Ok(home) = env::var("HOME")
        && !home.is_empty()
    {
        return PathBuf::from(home).join(".local/state/hotdesk");
    }
    PathBuf::from("/var/tmp/hotdesk")
}

fn resolve_lock_timeout() -> Duration {
    env::var("HOTDESK_LOCK_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_LOCK_TIMEOUT)
}

/// Pick a working directory for a new desk: `$HOTDESK_WORK_BASE/<name>`
/// when configured, else `~/work/<name>` if `~/work` already exists,
/// else the invoking directory. Never fails; the desk has to land
/// somewhere.
pub fn auto_workdir(config: &Config, name: &str) -> PathBuf {
    if let Some(base) = &config.work_base {
        return base.join(name);
    }
    if let Ok(home) = env::var("HOME")
        && !home.is_empty()
    {
        let work = PathBuf::from(home).join("work");
        if work.is_dir() {
            return work.join(name);
        }
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
