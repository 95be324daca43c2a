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

//! Creating a library.

use anyhow::{Context, Result};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{
    error::{ErrorKind, LibraryError},
    library::{DEFAULT_LIBRARY_FILENAME, WORK_DIR, schema::LibrarySchema, store::LibraryStore},
    tasks::TaskContext,
    util::fs::{locate_dominating_file, write_atomic},
    vcs::{CommitLog, VersionControl, git::GitCli},
};

/// Creates a library file with default settings.
///
/// The path may name the library file, or a directory to create the default
/// library file in; it defaults to the working directory. Unless the library
/// is already inside a Git repository, one is created around it. The `work/`
/// directory is ignored through a new `.gitignore` at the repository root.
/// Existing `.gitignore` and library files are never overwritten.
///
/// # Errors
///
/// Returns an error if the working tree is dirty before a file would be
/// created, if Git is not installed, or if a default value cannot be
/// computed.
pub(super) fn init(ctx: &mut TaskContext, path: Option<&Path>) -> Result<()> {
    let path = path.map_or_else(|| ctx.cwd.clone(), |path| ctx.cwd.join(path));
    let library_file = if path.is_dir() {
        path.join(DEFAULT_LIBRARY_FILENAME)
    } else {
        path
    };

    let filename = library_file
        .file_name()
        .context("library path has no file name")?
        .to_owned();
    let library_dir = library_file
        .parent()
        .context("library path has no parent directory")?;

    std::fs::create_dir_all(library_dir).map_err(|e| {
        LibraryError::new(
            ErrorKind::Io,
            format!(
                "could not create library directory '{}': {}",
                library_dir.display(),
                e
            ),
        )
    })?;
    let library_dir = library_dir
        .canonicalize()
        .unwrap_or_else(|_| library_dir.to_path_buf());
    let library_file = library_dir.join(&filename);
    let filename = filename.to_string_lossy();

    let preexisting = locate_dominating_file(&filename, &library_dir);

    let git = GitCli::new(&library_dir);
    let log = CommitLog::new(&git, &library_dir);

    let repo_root = match locate_dominating_file(".git", &library_dir) {
        Some(git_dir) => {
            writeln!(
                ctx.stderr,
                "note: not initializing Git repository, already exists: '{}'",
                git_dir.display()
            )?;
            git_dir
                .parent()
                .map_or_else(|| library_dir.clone(), Path::to_path_buf)
        }
        None => {
            git.init()?;
            log.commit_all("Add pre-existing files", false)?;
            library_dir.clone()
        }
    };

    let gitignore = repo_root.join(".gitignore");
    let rule = work_dir_rule(&repo_root, &library_dir);
    if gitignore.exists() || gitignore.is_symlink() {
        writeln!(
            ctx.stderr,
            "note: not creating .gitignore, already exists: '{}'",
            gitignore.display()
        )?;
        writeln!(ctx.stderr, "note: please make sure '{rule}' is in your .gitignore")?;
    } else {
        log.ensure_clean()?;
        write_atomic(&gitignore, |f| writeln!(f, "{rule}"))?;
        log.commit_all(&format!("Add .gitignore for '{rule}'"), false)?;
    }

    if let Some(existing) = preexisting {
        writeln!(
            ctx.stderr,
            "note: not creating library file, already exists: '{}'",
            existing.display()
        )?;
        return Ok(());
    }

    log.ensure_clean()?;

    let schema = LibrarySchema::standard();
    let store = LibraryStore::new(&schema, &git, &library_file);
    store.save(&store.defaults()?)?;
    info!(path = %library_file.display(), "created library");
    writeln!(
        ctx.stderr,
        "Created library file with default settings in '{}'",
        library_file.display()
    )?;

    log.commit_all(&format!("Create {filename} with default settings"), false)?;

    Ok(())
}

/// The `.gitignore` rule matching the work directory of a library in
/// `library_dir`, relative to the repository root.
fn work_dir_rule(repo_root: &Path, library_dir: &Path) -> String {
    let relative: PathBuf = library_dir
        .strip_prefix(repo_root)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut rule = String::from("/");
    for component in relative.components() {
        rule.push_str(&component.as_os_str().to_string_lossy());
        rule.push('/');
    }
    rule.push_str(WORK_DIR);
    rule.push('/');
    rule
}
