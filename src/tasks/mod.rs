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

//! Command processing.
//!
//! Each subcommand of the command line becomes an [`AppTask`], which is run
//! by [`handle_task`] against a [`TaskContext`] holding everything the task
//! may touch: the user config, the working directory, the process table, and
//! the standard streams.
//!
//! Query responses are the only thing written to `stdout`; notes and
//! progress go to `stderr`.

mod handlers;
mod init;

use anyhow::Result;
use std::{
    io::{Read, Write},
    path::PathBuf,
};

use crate::{config::AppConfig, lock::ProcessTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AppTask {
    /// Create a library in the given file or directory, or the working
    /// directory.
    Init(Option<PathBuf>),

    /// Run a query given as `-`, `@file` or inline JSON.
    Query(String),

    /// Write album metadata files from the tags of a media directory.
    Translate(PathBuf),

    Version,
}

/// Bundles shared resources required by task handlers to simplify resource
/// passing when invoking those handler functions.
pub(crate) struct TaskContext<'a> {
    pub(crate) config: &'a AppConfig,

    /// The directory relative paths on the command line are resolved against.
    pub(crate) cwd: PathBuf,

    /// The library given by `--library` or `ETUNES_LIBRARY`.
    pub(crate) library: Option<PathBuf>,

    pub(crate) processes: &'a dyn ProcessTable,

    pub(crate) stdin: &'a mut dyn Read,
    pub(crate) stdout: &'a mut dyn Write,
    pub(crate) stderr: &'a mut dyn Write,
}

impl TaskContext<'_> {
    /// The library to use when none is discovered from the working directory.
    fn explicit_library(&self) -> Option<PathBuf> {
        self.library.clone().or_else(|| self.config.library.clone())
    }
}

/// Runs a single task to completion.
///
/// # Errors
///
/// Returns an error if the task fails. Errors that only affect one part of a
/// query are reported in the query response instead.
pub(crate) fn handle_task(task: AppTask, ctx: &mut TaskContext) -> Result<()> {
    match task {
        AppTask::Init(path) => init::init(ctx, path.as_deref()),
        AppTask::Query(source) => handlers::query(ctx, &source),
        AppTask::Translate(media_dir) => handlers::translate(ctx, &media_dir),
        AppTask::Version => handlers::version(ctx),
    }
}
