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

//! Version control of the library.
//!
//! Every change to the library is recorded as a commit. Before a transaction
//! starts, the [`CommitLog`] checks that nobody has changed the library
//! behind its back; it detects such interference but does not prevent it.

pub(crate) mod git;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{ErrorKind, LibraryError, Result};

/// The operations eTunes needs from a version-control system.
pub(crate) trait VersionControl {
    /// True if there are no unstaged, staged-but-uncommitted, or untracked
    /// changes.
    fn is_working_tree_clean(&self) -> Result<bool>;

    fn stage_all(&self) -> Result<()>;

    /// Commits the index, even if nothing changed.
    fn commit(&self, message: &str) -> Result<()>;

    /// Shows the user what is uncommitted.
    fn show_status(&self) -> Result<()>;

    fn init(&self) -> Result<()>;
}

/// Guards the working tree of a library.
pub(crate) struct CommitLog<'a> {
    vcs: &'a dyn VersionControl,
    root: PathBuf,
}

impl<'a> CommitLog<'a> {
    pub(crate) fn new(vcs: &'a dyn VersionControl, root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            root: root.into(),
        }
    }

    /// Fails unless the working tree is clean.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::DirtyWorkingTree`] error, after showing the
    /// status to the user, if there are uncommitted changes.
    pub(crate) fn ensure_clean(&self) -> Result<()> {
        if self.vcs.is_working_tree_clean()? {
            return Ok(());
        }

        self.vcs.show_status()?;

        Err(
            LibraryError::new(ErrorKind::DirtyWorkingTree, "working directory is not clean")
                .with_hint(format!(
                    "you should clean up manually in '{}'",
                    self.root.display()
                )),
        )
    }

    /// Stages and commits every change.
    ///
    /// When `optional` is set and there is nothing to commit, no commit is
    /// made. Returns whether a commit was made.
    pub(crate) fn commit_all(&self, message: &str, optional: bool) -> Result<bool> {
        self.vcs.stage_all()?;

        if optional && self.vcs.is_working_tree_clean()? {
            debug!(commit_message = message, "nothing to commit");
            return Ok(false);
        }

        self.vcs.commit(message)?;
        info!(commit_message = message, "committed");

        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-memory [`VersionControl`] for tests.

    use std::{cell::RefCell, path::Path};

    use super::*;

    /// Tracks a single file: the tree is dirty when it was touched, or when
    /// the tracked file differs from its content at the last commit.
    #[derive(Debug, Default)]
    pub(crate) struct FakeVcs {
        pub(crate) dirty: RefCell<bool>,
        pub(crate) commits: RefCell<Vec<String>>,
        pub(crate) status_shown: RefCell<usize>,
        pub(crate) missing: bool,
        tracked: Option<PathBuf>,
        committed: RefCell<Option<String>>,
    }

    impl FakeVcs {
        pub(crate) fn tracking(path: &Path) -> Self {
            Self {
                tracked: Some(path.to_path_buf()),
                committed: RefCell::new(std::fs::read_to_string(path).ok()),
                ..Self::default()
            }
        }

        /// A repository whose `git` binary cannot be run.
        pub(crate) fn missing() -> Self {
            Self {
                missing: true,
                ..Self::default()
            }
        }

        pub(crate) fn touch(&self) {
            *self.dirty.borrow_mut() = true;
        }

        fn tracked_content(&self) -> Option<String> {
            self.tracked
                .as_ref()
                .and_then(|path| std::fs::read_to_string(path).ok())
        }
    }

    impl VersionControl for FakeVcs {
        fn is_working_tree_clean(&self) -> Result<bool> {
            if self.missing {
                return Err(LibraryError::tool_unavailable("git", "No such file or directory"));
            }
            Ok(!*self.dirty.borrow() && *self.committed.borrow() == self.tracked_content())
        }

        fn stage_all(&self) -> Result<()> {
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<()> {
            self.commits.borrow_mut().push(message.to_string());
            *self.dirty.borrow_mut() = false;
            *self.committed.borrow_mut() = self.tracked_content();
            Ok(())
        }

        fn show_status(&self) -> Result<()> {
            *self.status_shown.borrow_mut() += 1;
            Ok(())
        }

        fn init(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fake::FakeVcs, *};

    #[test]
    fn clean_tree_passes() {
        let vcs = FakeVcs::default();

        CommitLog::new(&vcs, "/music").ensure_clean().unwrap();
    }

    #[test]
    fn dirty_tree_is_fatal() {
        let vcs = FakeVcs::default();
        vcs.touch();

        let err = CommitLog::new(&vcs, "/music").ensure_clean().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DirtyWorkingTree);
        assert!(err.render().contains("hint: you should clean up manually in '/music'"));
        assert_eq!(*vcs.status_shown.borrow(), 1);
    }

    #[test]
    fn optional_commit_skips_clean_tree() {
        let vcs = FakeVcs::default();
        let log = CommitLog::new(&vcs, "/music");

        assert!(!log.commit_all("Unnamed query", true).unwrap());
        assert!(vcs.commits.borrow().is_empty());

        vcs.touch();
        assert!(log.commit_all("Set options", true).unwrap());
        assert_eq!(*vcs.commits.borrow(), vec!["Set options".to_string()]);
    }

    #[test]
    fn mandatory_commit_is_always_made() {
        let vcs = FakeVcs::default();

        assert!(CommitLog::new(&vcs, "/music").commit_all("Add pre-existing files", false).unwrap());
        assert_eq!(vcs.commits.borrow().len(), 1);
    }

    #[test]
    fn missing_tool_propagates() {
        let vcs = FakeVcs::missing();

        let err = CommitLog::new(&vcs, "/music").ensure_clean().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ToolUnavailable);
        assert_eq!(*vcs.status_shown.borrow(), 0);
    }

    #[test]
    fn missing_tool_fails_optional_commit() {
        let vcs = FakeVcs::missing();

        let err = CommitLog::new(&vcs, "/music").commit_all("Unnamed query", true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ToolUnavailable);
        assert!(vcs.commits.borrow().is_empty());
    }
}
