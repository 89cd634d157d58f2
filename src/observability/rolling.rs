//! Rotating diagnostic log writer.
//!
//! # Responsibilities
//! - Serialize all writes to one log destination across request tasks
//! - Apply the rotation policy (size trigger, age and keep pruning)
//!   atomically with the write that crossed the threshold
//! - Report a write failure once per configuration generation, then
//!   drop quietly so logging can never fail a response
//!
//! # Design Decisions
//! - Owned resource behind a mutex; the file handle never escapes
//! - The file opens lazily on first write, so a bad log path degrades
//!   a generation's logging instead of failing its config load
//! - Backups are named `<stem>-<timestamp>[.<ext>]`, local or UTC per
//!   policy, with a numeric suffix only on same-millisecond collisions

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::{Local, Utc};

use crate::config::roller::RollPolicy;

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Where diagnostic lines go. The sentinel names `stderr` and `stdout`
/// select the process streams; anything else is a file path.
enum Destination {
    Stderr,
    Stdout,
    File(PathBuf),
}

#[derive(Default)]
struct SinkState {
    file: Option<File>,
    size: u64,
}

/// Append-only diagnostic log shared by every request of one
/// configuration generation.
pub struct DiagnosticLog {
    destination: Destination,
    policy: Option<RollPolicy>,
    state: Mutex<SinkState>,
    fault_reported: AtomicBool,
}

impl DiagnosticLog {
    pub fn new(destination: &str, policy: Option<RollPolicy>) -> Self {
        let destination = match destination {
            "stderr" => Destination::Stderr,
            "stdout" => Destination::Stdout,
            path => Destination::File(PathBuf::from(path)),
        };
        Self {
            destination,
            policy,
            state: Mutex::new(SinkState::default()),
            fault_reported: AtomicBool::new(false),
        }
    }

    /// Append one line. Never fails the caller: the first I/O error of
    /// this generation is reported through tracing, the rest are
    /// dropped.
    pub fn write_line(&self, line: &str) {
        if let Err(err) = self.append(line) {
            if !self.fault_reported.swap(true, Ordering::Relaxed) {
                tracing::error!(
                    error = %err,
                    "diagnostic log write failed; suppressing further reports for this generation"
                );
            }
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        match &self.destination {
            Destination::Stderr => writeln!(io::stderr().lock(), "{line}"),
            Destination::Stdout => writeln!(io::stdout().lock(), "{line}"),
            Destination::File(path) => {
                let mut state = match self.state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                self.append_to_file(&mut state, path, line)
            }
        }
    }

    /// Write under the lock; the rotate check and the write that
    /// triggered it form one critical section so rotation boundaries
    /// stay consistent and lines never interleave.
    fn append_to_file(&self, state: &mut SinkState, path: &Path, line: &str) -> io::Result<()> {
        if state.file.is_none() {
            let file = open_append(path)?;
            state.size = file.metadata()?.len();
            state.file = Some(file);
        }

        let pending = line.len() as u64 + 1;
        if let Some(policy) = &self.policy {
            let limit = policy.max_size_mb * 1024 * 1024;
            if limit > 0 && state.size > 0 && state.size + pending > limit {
                state.file = None;
                rotate_out(path, policy)?;
                state.file = Some(open_append(path)?);
                state.size = 0;
            }
        }

        if let Some(file) = state.file.as_mut() {
            writeln!(file, "{line}")?;
            state.size += pending;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Move the live file aside under a timestamped name, then prune
/// backups past the policy's age and keep limits.
fn rotate_out(path: &Path, policy: &RollPolicy) -> io::Result<()> {
    fs::rename(path, backup_path(path, policy))?;
    prune_backups(path, policy)
}

fn backup_path(path: &Path, policy: &RollPolicy) -> PathBuf {
    let stamp = if policy.local_time {
        Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string()
    } else {
        Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string()
    };

    let mut candidate = sibling(path, &stamp, None);
    let mut n = 1;
    while candidate.exists() {
        candidate = sibling(path, &stamp, Some(n));
        n += 1;
    }
    candidate
}

fn sibling(path: &Path, stamp: &str, collision: Option<u32>) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("diagnostic");
    let suffix = match collision {
        Some(n) => format!("-{n}"),
        None => String::new(),
    };
    let name = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}-{stamp}{suffix}.{ext}"),
        None => format!("{stem}-{stamp}{suffix}"),
    };
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn prune_backups(path: &Path, policy: &RollPolicy) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
        Some(dir) => dir,
        None => Path::new("."),
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("diagnostic");
    let prefix = format!("{stem}-");
    let live_name = path.file_name().and_then(|s| s.to_str()).map(String::from);

    let mut backups: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if !name.starts_with(&prefix) || Some(&name) == live_name.as_ref() {
            continue;
        }
        backups.push((name, entry.path()));
    }

    if policy.max_age_days > 0 {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(policy.max_age_days * 24 * 60 * 60));
        if let Some(cutoff) = cutoff {
            backups.retain(|(_, backup)| {
                let expired = fs::metadata(backup)
                    .and_then(|m| m.modified())
                    .map(|modified| modified < cutoff)
                    .unwrap_or(false);
                if expired {
                    let _ = fs::remove_file(backup);
                }
                !expired
            });
        }
    }

    if policy.max_backups > 0 {
        // Timestamped names sort chronologically; newest first.
        backups.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, stale) in backups.iter().skip(policy.max_backups as usize) {
            let _ = fs::remove_file(stale);
        }
    }
    Ok(())
}
