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

//! The `git` command-line tool as a [`VersionControl`].
//!
//! Every command runs with the library root as its working directory. A
//! failure to start `git`, or an unexpected non-zero exit, is reported as an
//! [`ErrorKind::ToolUnavailable`] error.

use std::{
    io,
    path::PathBuf,
    process::{Command, Output, Stdio},
};

use tracing::trace;

use super::VersionControl;
use crate::{
    error::{ErrorKind, LibraryError, Result},
    library::schema::DefaultResolver,
};

const GIT: &str = "git";

pub(crate) struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(GIT);
        command.args(args).current_dir(&self.root);
        command
    }

    /// Runs git, capturing its output, without checking the exit status.
    fn run(&self, args: &[&str]) -> Result<Output> {
        trace!(?args, "running git");
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| LibraryError::tool_unavailable(GIT, e))
    }

    /// Runs git and fails if it exits unsuccessfully.
    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(output);
        }

        let mut words = vec![GIT];
        words.extend_from_slice(args);
        let quoted = shlex::try_join(words.iter().copied()).unwrap_or_else(|_| words.join(" "));

        let mut err = LibraryError::tool_unavailable(GIT, format!("command failed: {quoted}"));
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            err = err.with_detail(stderr.trim_end().to_string());
        }
        Err(err)
    }

    /// Returns a git configuration value.
    ///
    /// # Errors
    ///
    /// Returns an error with a hint on how to set the key if it has no value.
    pub(crate) fn config_value(&self, key: &str) -> Result<String> {
        let output = self.run(&["config", "--get", key])?;

        if !output.status.success() {
            return Err(LibraryError::new(
                ErrorKind::MalformedConfig,
                format!("Git configuration value '{key}' is not set"),
            )
            .with_hint(format!("to set, run 'git config {key} <value>'")));
        }

        let value = String::from_utf8_lossy(&output.stdout);
        Ok(value.strip_suffix('\n').unwrap_or(&value).to_string())
    }
}

impl VersionControl for GitCli {
    fn is_working_tree_clean(&self) -> Result<bool> {
        // The working tree must match the index.
        if !self.run(&["diff-files", "--quiet"])?.status.success() {
            return Ok(false);
        }

        // The index must match HEAD, or be empty if there are no commits yet.
        let no_commits_yet = !self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])?.status.success();
        if no_commits_yet {
            if !self.run_checked(&["ls-files"])?.stdout.is_empty() {
                return Ok(false);
            }
        } else if !self
            .run(&["diff-index", "--cached", "--quiet", "HEAD"])?
            .status
            .success()
        {
            return Ok(false);
        }

        let untracked = self.run_checked(&["ls-files", "--others", "--exclude-standard"])?;

        Ok(untracked.stdout.is_empty())
    }

    fn stage_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"]).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "--quiet", "--allow-empty", "-m", message])
            .map(|_| ())
    }

    fn show_status(&self) -> Result<()> {
        // stdout carries query responses, so the status goes to stderr.
        let status = self
            .command(&["status"])
            .stdin(Stdio::null())
            .stdout(Stdio::from(io::stderr()))
            .status()
            .map_err(|e| LibraryError::tool_unavailable(GIT, e))?;

        if !status.success() {
            return Err(LibraryError::tool_unavailable(GIT, "command failed: git status"));
        }
        Ok(())
    }

    fn init(&self) -> Result<()> {
        self.run_checked(&["init", "--quiet"]).map(|_| ())
    }
}

impl DefaultResolver for GitCli {
    fn resolve(&self, key: &str) -> Result<String> {
        self.config_value(key)
    }
}
