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

//! # eTunes.
//!
//! A declarative, version-controlled music library manager.
//!
//! The library is a directory of human-editable metadata files under Git.
//! It is only changed through transactions: a query names the options to
//! read or write, and every successful query becomes a commit.
//!
//! ## Architecture
//!
//! * **Library** - the library file and its options ([`library`]).
//! * **Metadata** - album files with shared album attributes and per-song
//!   overrides ([`metadata`]).
//! * **Transactions** - the engine tying the commit log, the process lock,
//!   and the library together ([`transaction`]).
//! * **Tasks** - one handler per subcommand ([`tasks`]).
//!
//! Query responses are written to `stdout` as JSON; everything else,
//! including logs, goes to `stderr`.

mod config;
mod error;
mod library;
mod lock;
mod metadata;
mod query;
mod tags;
mod tasks;
mod transaction;
mod util;
mod vcs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{io, path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{
    config::AppConfig,
    error::LibraryError,
    lock::SystemProcessTable,
    tasks::{AppTask, TaskContext, handle_task},
};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "ETUNES_LOG";

#[derive(Parser, Debug)]
#[command(name = "etunes", about = "The declarative, version-controlled music library manager")]
struct Cli {
    /// Library file, or directory containing `etunes.yml`.
    #[arg(long, global = true, env = "ETUNES_LIBRARY", value_name = "PATH")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a library with default settings.
    Init {
        /// Library file or directory (default: the working directory).
        path: Option<PathBuf>,
    },

    /// Run a query and print its response as JSON.
    Query {
        /// Inline JSON, `@<query-file>`, or `-` for stdin.
        #[arg(allow_hyphen_values = true)]
        source: String,
    },

    /// Write album metadata files from the tags of a media directory.
    Translate {
        /// Directory laid out as `<artist>/<album>/<song>`.
        media_dir: PathBuf,
    },

    /// Print the version.
    Version,
}

impl From<Command> for AppTask {
    fn from(command: Command) -> Self {
        match command {
            Command::Init { path } => AppTask::Init(path),
            Command::Query { source } => AppTask::Query(source),
            Command::Translate { media_dir } => AppTask::Translate(media_dir),
            Command::Version => AppTask::Version,
        }
    }
}

/// The entry point of the application.
///
/// Exits with status 0 on success, including a query whose response reports
/// errors, and 1 if the command itself fails.
fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = config::load_config();
    init_logging(&config);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", report(&e));
            ExitCode::FAILURE
        }
    }
}

/// Sends logs to stderr, filtered by `ETUNES_LOG` or the configured level.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let processes = SystemProcessTable;

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    let mut ctx = TaskContext {
        config,
        cwd,
        library: cli.library,
        processes: &processes,
        stdin: &mut stdin,
        stdout: &mut stdout,
        stderr: &mut stderr,
    };

    handle_task(cli.command.into(), &mut ctx)
}

/// Formats a fatal error for stderr.
fn report(err: &anyhow::Error) -> String {
    match err.downcast_ref::<LibraryError>() {
        Some(err) => {
            debug!(kind = ?err.kind(), "fatal error");
            err.render()
        }
        None => format!("etunes: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_global_library_after_subcommand() {
        let cli = Cli::try_parse_from(["etunes", "query", "-", "--library", "/music"]).unwrap();

        assert_eq!(cli.library, Some(PathBuf::from("/music")));
        assert_eq!(AppTask::from(cli.command), AppTask::Query("-".to_string()));
    }

    #[test]
    fn init_path_is_optional() {
        let cli = Cli::try_parse_from(["etunes", "init"]).unwrap();

        assert_eq!(AppTask::from(cli.command), AppTask::Init(None));
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["etunes"]).is_err());
    }

    #[test]
    fn report_renders_library_errors() {
        let err = anyhow::Error::new(
            LibraryError::new(ErrorKind::Usage, "string 'x' does not identify a query")
                .with_usage("etunes query (<json> | @<query-file> | -)"),
        );

        assert_eq!(
            report(&err),
            "etunes: string 'x' does not identify a query\nusage: etunes query (<json> | @<query-file> | -)"
        );
    }

    #[test]
    fn report_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("could not write");

        assert_eq!(report(&err), "etunes: could not write: disk full");
    }
}
