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

//! Album metadata files.
//!
//! Each album is stored as a mapping `{album: {...}, songs: [{...}, ...]}`.
//! The file extension selects the serialisation format; YAML and JSON files
//! describe the same data.

use std::{io, path::Path};

use tracing::debug;

use super::{AlbumRecord, Attributes, split};
use crate::{
    error::{ErrorKind, LibraryError, Result},
    util::fs::write_atomic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataFormat {
    Json,
    Yaml,
}

impl DataFormat {
    /// Selects the format from the file extension.
    pub(crate) fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(DataFormat::Json),
            Some("yml" | "yaml") => Ok(DataFormat::Yaml),
            _ => Err(LibraryError::new(
                ErrorKind::MalformedMetadata,
                format!("unknown metadata file type: '{}'", path.display()),
            )
            .with_hint("use a '.yml' or '.json' extension")),
        }
    }
}

/// Reads an album metadata file and returns the effective song attributes.
///
/// # Errors
///
/// Returns an [`ErrorKind::MalformedMetadata`] error if the file is not a
/// mapping with exactly the keys `album` and `songs`, or if any attribute is
/// not a string. Song attributes may also be `null`.
pub(crate) fn read_album(path: &Path) -> Result<Vec<Attributes>> {
    Ok(read_record(path)?.expand())
}

pub(crate) fn read_record(path: &Path) -> Result<AlbumRecord> {
    let format = DataFormat::from_path(path)?;

    let text = std::fs::read_to_string(path).map_err(|e| {
        LibraryError::new(
            ErrorKind::Io,
            format!("could not read metadata file '{}': {}", path.display(), e),
        )
    })?;

    let malformed = |e: &dyn std::fmt::Display| {
        LibraryError::new(
            ErrorKind::MalformedMetadata,
            format!("malformed album metadata file '{}': {}", path.display(), e),
        )
    };

    match format {
        DataFormat::Json => serde_json::from_str(&text).map_err(|e| malformed(&e)),
        DataFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| malformed(&e)),
    }
}

/// Writes the songs of an album, storing shared attributes once.
///
/// Parent directories are created as needed and the file is replaced
/// atomically.
pub(crate) fn write_album(path: &Path, songs: &[Attributes]) -> Result<()> {
    let format = DataFormat::from_path(path)?;
    let record = split(songs);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            LibraryError::new(
                ErrorKind::Io,
                format!("could not create directory '{}': {}", parent.display(), e),
            )
        })?;
    }

    debug!(
        path = %path.display(),
        songs = songs.len(),
        shared = record.album.len(),
        "writing album metadata"
    );

    write_atomic(path, |f| match format {
        DataFormat::Json => {
            serde_json::to_writer_pretty(&mut *f, &record)?;
            io::Write::write_all(f, b"\n")
        }
        DataFormat::Yaml => serde_yaml::to_writer(f, &record).map_err(io::Error::other),
    })
}
