//! Process table snapshots from /proc.
//!
//! One sweep of `/proc` yields pid, ppid, command line and start time
//! for every process the caller can see. Desk membership in pane-tree
//! mode is "descendant of a tmux pane PID", computed over the sweep's
//! inverted ppid edges. A snapshot races with process churn by nature;
//! a process that exits mid-sweep is simply absent.

use std::collections::{HashMap, VecDeque};
use std::io;

/// A single process observed in one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub cmdline: String,
    /// Kernel start time in clock ticks since boot (stat field 22).
    /// Distinguishes a recycled pid from the process it replaced.
    pub start_time: u64,
}

/// All processes from one sweep, indexed by pid.
#[derive(Debug, Default, Clone)]
pub struct ProcessTable {
    procs: HashMap<u32, ProcessInfo>,
}

impl ProcessTable {
    pub fn from_infos(infos: Vec<ProcessInfo>) -> Self {
        Self {
            procs: infos.into_iter().map(|i| (i.pid, i)).collect(),
        }
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessInfo> {
        self.procs.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.procs.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    /// BFS over child edges from the given roots. Each live root and
    /// every transitive child is counted exactly once; roots that are
    /// not in the table (already exited) contribute nothing.
    pub fn descendants(&self, roots: &[u32]) -> Vec<u32> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for info in self.procs.values() {
            children.entry(info.ppid).or_default().push(info.pid);
        }

        let mut seen: Vec<u32> = Vec::new();
        let mut queue: VecDeque<u32> = VecDeque::new();
        for &root in roots {
            if self.contains(root) && !seen.contains(&root) {
                seen.push(root);
                queue.push_back(root);
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(kids) = children.get(&current) {
                for &child in kids {
                    if !seen.contains(&child) {
                        seen.push(child);
                        queue.push_back(child);
                    }
                }
            }
        }

        seen.sort_unstable();
        seen
    }

    /// Group pids by the first token of their command line and render
    /// `cmd xN` strings, most frequent first (ties break by name).
    pub fn summarize(&self, pids: &[u32], max_items: usize) -> Vec<String> {
        let mut buckets: HashMap<String, usize> = HashMap::new();
        for &pid in pids {
            let head = self
                .get(pid)
                .map(|i| i.cmdline.trim())
                .filter(|c| !c.is_empty())
                .and_then(|c| c.split_whitespace().next())
                .unwrap_or("(empty)")
                .to_string();
            *buckets.entry(head).or_insert(0) += 1;
        }

        let mut items: Vec<(String, usize)> = buckets.into_iter().collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(max_items);
        items
            .into_iter()
            .map(|(cmd, count)| format!("{cmd} x{count}"))
            .collect()
    }
}

/// Source of process snapshots. The production implementation reads
/// /proc; tests supply fabricated tables.
pub trait ProcessEnumerator {
    fn snapshot(&self) -> io::Result<ProcessTable>;
}

/// Reads the real /proc filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcFs;

impl ProcessEnumerator for ProcFs {
    fn snapshot(&self) -> io::Result<ProcessTable> {
        read_proc_all()
    }
}

#[cfg(target_os = "linux")]
fn read_proc_all() -> io::Result<ProcessTable> {
    let mut infos = Vec::new();
    for entry in std::fs::read_dir("/proc")? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(pid_str) = name.to_str() else {
            continue;
        };
        let Ok(pid) = pid_str.parse::<u32>() else {
            continue;
        };
        // The process may exit between readdir and the stat read.
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
            continue;
        };
        let Some((ppid, start_time)) = parse_stat(&stat) else {
            continue;
        };
        infos.push(ProcessInfo {
            pid,
            ppid,
            cmdline: read_cmdline(pid),
            start_time,
        });
    }
    Ok(ProcessTable::from_infos(infos))
}

#[cfg(not(target_os = "linux"))]
fn read_proc_all() -> io::Result<ProcessTable> {
    Ok(ProcessTable::default())
}

/// Parse `/proc/<pid>/stat`: "pid (name) state ppid ...".
/// The name can contain spaces and parens, so split at the last ')'.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat(stat: &str) -> Option<(u32, u64)> {
    let name_end = stat.rfind(')')?;
    let rest = stat.get(name_end + 2..)?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // fields[0] = state, fields[1] = ppid, fields[19] = start time
    // (stat field 22).
    let ppid = fields.get(1)?.parse::<u32>().ok()?;
    let start_time = fields.get(19)?.parse::<u64>().ok()?;
    Some((ppid, start_time))
}

#[cfg(target_os = "linux")]
fn read_cmdline(pid: u32) -> String {
    match std::fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(raw) => {
            let joined = raw
                .split(|&b| b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            if joined.is_empty() {
                "(empty)".to_string()
            } else {
                joined
            }
        }
        Err(_) => "(unknown)".to_string(),
    }
}

/// Fixed in-memory snapshot for tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeProcs {
    pub table: ProcessTable,
}

#[cfg(test)]
impl FakeProcs {
    pub fn with(infos: Vec<(u32, u32, &str)>) -> Self {
        let infos = infos
            .into_iter()
            .map(|(pid, ppid, cmdline)| ProcessInfo {
                pid,
                ppid,
                cmdline: cmdline.to_string(),
                start_time: u64::from(pid) * 100,
            })
            .collect();
        Self {
            table: ProcessTable::from_infos(infos),
        }
    }
}

#[cfg(test)]
impl ProcessEnumerator for FakeProcs {
    fn snapshot(&self) -> io::Result<ProcessTable> {
        Ok(self.table.clone())
    }
}
