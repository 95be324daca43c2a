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

//! Filesystem helpers shared by the library and metadata stores.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{ErrorKind, LibraryError, Result};

/// Writes a file atomically.
///
/// The content is produced by `write` into a temporary file created in the
/// same directory as `path`, flushed to disk, and then renamed over `path`.
/// Readers observe either the previous content or the complete new content,
/// never a partially written file.
///
/// # Errors
///
/// Returns an [`ErrorKind::Io`] error if the temporary file cannot be created,
/// if `write` fails, or if the rename fails. In every case the file at `path`
/// is left untouched.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let fail = |e: &dyn std::fmt::Display| {
        LibraryError::new(
            ErrorKind::Io,
            format!("could not write to file '{}': {}", path.display(), e),
        )
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail(&e))?;
    write(tmp.as_file_mut()).map_err(|e| fail(&e))?;
    tmp.as_file().sync_all().map_err(|e| fail(&e))?;
    tmp.persist(path).map_err(|e| fail(&e.error))?;

    Ok(())
}

/// Finds `filename` in `start` or the nearest parent directory containing it.
///
/// Returns the full path to the first match, or `None` if the filesystem root
/// is reached first. Dangling symlinks count as a match.
pub(crate) fn locate_dominating_file(filename: &str, start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    start.ancestors().find_map(|dir| {
        let candidate = dir.join(filename);
        (candidate.exists() || candidate.is_symlink()).then_some(candidate)
    })
}
