// Copyright (C) 2026  The eTunes Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The process lock marking a transaction in progress.
//!
//! The lock file holds the pid of the process running the transaction and
//! the start time of that process, one per line. A lock only counts as held
//! if a process with that pid is alive *and* started at the recorded time, so
//! a pid reused after a crash never locks the library for good.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use sysinfo::{Pid, System};
use tracing::{debug, warn};

use crate::{
    error::{ErrorKind, LibraryError, Result},
    util::fs::write_atomic,
};

pub(crate) const PROCESS_FILENAME: &str = "process";

/// Start times are compared with this tolerance, in seconds.
const START_TIME_TOLERANCE: f64 = 1.0;

/// Looks up running processes.
pub(crate) trait ProcessTable {
    /// The start time of a live process in seconds since the epoch, or
    /// `None` if no such process is running.
    fn start_time(&self, pid: u32) -> Option<f64>;
}

/// The processes of the running system.
pub(crate) struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn start_time(&self, pid: u32) -> Option<f64> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|process| process.start_time() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LockRecord {
    pub(crate) pid: u32,
    pub(crate) start_time: f64,
}

impl LockRecord {
    fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let pid = lines.next()?.trim().parse().ok()?;
        let start_time = lines.next()?.trim().parse().ok()?;
        Some(Self { pid, start_time })
    }

    fn is_live(&self, processes: &dyn ProcessTable) -> bool {
        processes
            .start_time(self.pid)
            .is_some_and(|actual| (actual - self.start_time).abs() <= START_TIME_TOLERANCE)
    }
}

/// Fails if the lock file names a transaction that is still running.
///
/// A missing or malformed lock file, a pid with no live process, or a live
/// process with a different start time all count as unlocked.
///
/// # Errors
///
/// Returns an [`ErrorKind::ConcurrentTransaction`] error naming the pid of the
/// running transaction.
pub(crate) fn check_no_concurrent_transaction(
    path: &Path,
    processes: &dyn ProcessTable,
) -> Result<()> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read lock file, ignoring");
            return Ok(());
        }
    };

    let Some(record) = LockRecord::parse(&text) else {
        warn!(path = %path.display(), "malformed lock file, ignoring");
        return Ok(());
    };

    if record.is_live(processes) {
        return Err(LibraryError::new(
            ErrorKind::ConcurrentTransaction,
            format!("another query is already running (PID {})", record.pid),
        ));
    }

    debug!(pid = record.pid, "stale lock file");
    Ok(())
}

/// A held lock, released when dropped.
#[derive(Debug)]
pub(crate) struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Checks for a concurrent transaction, then records the current process
    /// in the lock file.
    pub(crate) fn acquire(path: &Path, processes: &dyn ProcessTable) -> Result<Self> {
        check_no_concurrent_transaction(path, processes)?;

        let pid = std::process::id();
        let start_time = processes.start_time(pid).unwrap_or_else(now);

        write_atomic(path, |f| writeln!(f, "{pid}\n{start_time}"))?;
        debug!(pid, start_time, "acquired lock");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("released lock"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove lock file"),
        }
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;

    use super::ProcessTable;

    /// A fixed set of live processes.
    #[derive(Debug, Default)]
    pub(crate) struct FakeProcessTable(pub(crate) HashMap<u32, f64>);

    impl FakeProcessTable {
        pub(crate) fn with(pid: u32, start_time: f64) -> Self {
            Self(HashMap::from([(pid, start_time)]))
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn start_time(&self, pid: u32) -> Option<f64> {
            self.0.get(&pid).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fake::FakeProcessTable, *};
    use tempfile::TempDir;

    fn lock_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(PROCESS_FILENAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_lock_file_is_unlocked() {
        let dir = TempDir::new().unwrap();

        check_no_concurrent_transaction(&dir.path().join(PROCESS_FILENAME), &FakeProcessTable::default())
            .unwrap();
    }

    #[test]
    fn live_matching_process_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let path = lock_file(&dir, "4242\n1700000000.25\n");

        let err = check_no_concurrent_transaction(&path, &FakeProcessTable::with(4242, 1700000000.0))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConcurrentTransaction);
        assert_eq!(err.message(), "another query is already running (PID 4242)");
    }

    #[test]
    fn dead_process_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = lock_file(&dir, "4242\n1700000000\n");

        check_no_concurrent_transaction(&path, &FakeProcessTable::default()).unwrap();
    }

    #[test]
    fn reused_pid_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = lock_file(&dir, "4242\n1700000000\n");

        check_no_concurrent_transaction(&path, &FakeProcessTable::with(4242, 1700003600.0)).unwrap();
    }

    #[test]
    fn malformed_lock_file_is_ignored() {
        let dir = TempDir::new().unwrap();

        for content in ["", "abc\n", "4242\n", "4242\nsoon\n"] {
            let path = lock_file(&dir, content);
            check_no_concurrent_transaction(&path, &FakeProcessTable::with(4242, 0.0)).unwrap();
        }
    }

    #[test]
    fn acquire_writes_and_drop_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROCESS_FILENAME);
        let pid = std::process::id();
        let processes = FakeProcessTable::with(pid, 1700000000.0);

        let lock = ProcessLock::acquire(&path, &processes).unwrap();

        let record = LockRecord::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record, LockRecord { pid, start_time: 1700000000.0 });

        // A second transaction sees the lock as held.
        let err = ProcessLock::acquire(&path, &processes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrentTransaction);

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn acquire_replaces_stale_lock() {
        let dir = TempDir::new().unwrap();
        let path = lock_file(&dir, "1\n5\n");
        let processes = FakeProcessTable::with(std::process::id(), 1700000000.0);

        let _lock = ProcessLock::acquire(&path, &processes).unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().starts_with(&std::process::id().to_string()));
    }
}
