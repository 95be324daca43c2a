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

//! Transactions against a library.
//!
//! A transaction runs start to finish in one process:
//!
//! 1. The working tree must be clean, and the library file must load and
//!    decode.
//! 2. No other transaction may be running; the lock is then taken for the
//!    rest of the transaction.
//! 3. If the query names the last transaction it knows of, and another one
//!    happened since, the query fails with an `intervening-transaction` error.
//! 4. Option requests are applied. Nothing is written if any error was
//!    recorded so far.
//! 5. A fresh transaction id is always recorded and returned in the
//!    response, the response is written, and on success every change is
//!    committed.
//!
//! Errors that belong to one part of the query are recorded in the
//! [`Response`]; anything that invalidates the whole query is returned as a
//! [`LibraryError`] before anything is changed.

use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{ErrorKind, LibraryError, Result},
    library::{LibraryOptions, WORK_DIR, schema::DecodedOptions, store::LibraryStore},
    lock::{PROCESS_FILENAME, ProcessLock, ProcessTable},
    query::{ErrorRecord, Query, Response},
    util::fs::write_atomic,
    vcs::CommitLog,
};

pub(crate) const LAST_ID_FILENAME: &str = "last-id";

/// The commit message of a query without a description.
pub(crate) const DEFAULT_DESCRIPTION: &str = "Unnamed query";

/// An opaque token identifying one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransactionId(String);

impl TransactionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The library, validated and locked for one transaction.
struct Session {
    options: LibraryOptions,
    decoded: DecodedOptions,
    _lock: ProcessLock,
}

/// Runs transactions against one library.
pub(crate) struct Engine<'a> {
    library: LibraryStore<'a>,
    commit_log: CommitLog<'a>,
    processes: &'a dyn ProcessTable,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        library: LibraryStore<'a>,
        commit_log: CommitLog<'a>,
        processes: &'a dyn ProcessTable,
    ) -> Self {
        Self {
            library,
            commit_log,
            processes,
        }
    }

    pub(crate) fn library(&self) -> &LibraryStore<'a> {
        &self.library
    }

    fn work_dir(&self) -> PathBuf {
        self.library.root().join(WORK_DIR)
    }

    fn last_id_file(&self) -> PathBuf {
        self.work_dir().join(LAST_ID_FILENAME)
    }

    /// The id of the last transaction, if one was recorded and is readable.
    pub(crate) fn last_id(&self) -> Option<String> {
        std::fs::read_to_string(self.last_id_file())
            .ok()
            .map(|id| id.trim().to_string())
    }

    /// Checks the preconditions of a transaction and takes the lock.
    fn begin(&self) -> Result<Session> {
        debug!(library = %self.library.path().display(), "starting transaction");

        self.commit_log.ensure_clean()?;

        let options = self.library.load()?;
        let decoded = self.library.decode(&options)?;

        let work_dir = self.work_dir();
        std::fs::create_dir_all(&work_dir).map_err(|e| {
            LibraryError::new(
                ErrorKind::Io,
                format!("could not create directory '{}': {}", work_dir.display(), e),
            )
        })?;

        let lock = ProcessLock::acquire(&work_dir.join(PROCESS_FILENAME), self.processes)?;

        Ok(Session {
            options,
            decoded,
            _lock: lock,
        })
    }

    /// Records a fresh transaction id.
    fn record_transaction(&self) -> std::result::Result<TransactionId, ErrorRecord> {
        let id = TransactionId::generate();
        let path = self.last_id_file();

        write_atomic(&path, |f| writeln!(f, "{id}"))
            .map_err(|e| ErrorRecord::os_error(&path, e.message()))?;
        debug!(transaction_id = %id, "recorded transaction");

        Ok(id)
    }

    /// Executes a query, writing its response to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error, before changing anything, if the working tree is
    /// dirty, the library file is malformed, or another transaction is
    /// running. Also returns an error if the response cannot be written or
    /// the final commit fails.
    pub(crate) fn execute(&self, query: &Query, out: &mut dyn Write) -> Result<Response> {
        let session = self.begin()?;
        let mut response = Response::default();

        if let Some(expected) = query.expected_last_id() {
            if let Some(actual) = self.last_id() {
                if actual != expected {
                    debug!(%actual, %expected, "intervening transaction");
                    response
                        .errors
                        .push(ErrorRecord::intervening_transaction(&actual, expected));
                }
            }
        }

        let mut options = session.options.clone();
        if let Some(requests) = &query.options {
            let update = self.library.apply_requests(&session.options, requests);
            response.errors.extend(update.errors);
            response.options = Some(update.values);
            options = update.options;
        }

        if response.errors.is_empty() && options != session.options {
            if let Err(e) = self.library.save(&options) {
                response
                    .errors
                    .push(ErrorRecord::os_error(self.library.path(), e.message()));
            }
        }

        // Always false: a failed query never reports its side effects.
        response.partial = false;

        match self.record_transaction() {
            Ok(id) => response.last_id = Some(id.to_string()),
            Err(record) => response.errors.push(record),
        }
        response.success = response.errors.is_empty();

        response.write_to(out).map_err(|e| {
            LibraryError::new(ErrorKind::Io, format!("could not write query response: {e}"))
        })?;

        if response.success {
            let description = query.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION);
            self.commit_log.commit_all(description, true)?;
        } else {
            info!(errors = response.errors.len(), "query failed, nothing committed");
        }

        Ok(response)
    }

    /// Runs `change` as a transaction of its own.
    ///
    /// The change sees the library options and may write anywhere in the
    /// library. Its changes are committed with `description` if it succeeds.
    pub(crate) fn exclusive<T, F>(&self, description: &str, change: F) -> anyhow::Result<T>
    where
        F: FnOnce(&LibraryOptions, &DecodedOptions, &Path) -> anyhow::Result<T>,
    {
        let session = self.begin()?;

        let value = change(&session.options, &session.decoded, self.library.root())?;

        self.record_transaction()
            .map_err(|record| LibraryError::new(ErrorKind::Io, record.message))?;
        self.commit_log.commit_all(description, true)?;

        Ok(value)
    }
}
