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

//! The library file and its options.
//!
//! A library is a directory holding a library file (`etunes.yml` by default)
//! with the library-wide options, the album metadata files, and a `work/`
//! scratch directory excluded from version control.
//!
//! # Layout
//!
//! * `<root>/etunes.yml` - Option name to string value.
//! * `<root>/work/process` - The lock of the transaction in progress.
//! * `<root>/work/last-id` - The id of the last transaction.
//! * `<root>/metadata/...` - One metadata file per album.

pub(crate) mod schema;
pub(crate) mod store;
pub(crate) mod template;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    error::{ErrorKind, LibraryError, Result},
    util::fs::locate_dominating_file,
};

/// The file searched for when no library is given, and created by `init`.
pub(crate) const DEFAULT_LIBRARY_FILENAME: &str = "etunes.yml";

pub(crate) const WORK_DIR: &str = "work";

/// Option name to string value, as stored in the library file.
pub(crate) type LibraryOptions = BTreeMap<String, String>;

/// Finds the library file to operate on.
///
/// An explicit path (from `--library`, `ETUNES_LIBRARY` or the user config)
/// wins; otherwise the working directory and its parents are searched. A
/// directory resolves to the default filename inside it.
///
/// # Errors
///
/// Returns an [`ErrorKind::LibraryNotFound`] error if no library file exists.
pub(crate) fn locate_library(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => cwd.join(path),
        None => locate_dominating_file(DEFAULT_LIBRARY_FILENAME, cwd).ok_or_else(|| {
            LibraryError::new(
                ErrorKind::LibraryNotFound,
                format!(
                    "cannot find file '{DEFAULT_LIBRARY_FILENAME}' in working or parent directories"
                ),
            )
            .with_hint("to create, run 'etunes init'")
        })?,
    };

    let path = if path.is_dir() {
        path.join(DEFAULT_LIBRARY_FILENAME)
    } else {
        path
    };

    if !path.is_file() {
        return Err(LibraryError::new(
            ErrorKind::LibraryNotFound,
            format!("library file does not exist: '{}'", path.display()),
        ));
    }

    Ok(path.canonicalize().unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_directory_resolves_to_default_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_LIBRARY_FILENAME), "{}\n").unwrap();

        let path = locate_library(Some(dir.path()), Path::new("/")).unwrap();

        assert_eq!(path.file_name().unwrap(), DEFAULT_LIBRARY_FILENAME);
    }

    #[test]
    fn discovered_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("metadata").join("Low");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(DEFAULT_LIBRARY_FILENAME), "{}\n").unwrap();

        let path = locate_library(None, &nested).unwrap();

        assert_eq!(path.parent().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn missing_explicit_file_is_reported() {
        let dir = TempDir::new().unwrap();

        let err = locate_library(Some(Path::new("nope.yml")), dir.path()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LibraryNotFound);
        assert!(err.message().starts_with("library file does not exist"));
    }
}
