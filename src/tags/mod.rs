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

//! Reading the tags embedded in media files.
//!
//! A media directory is laid out as `<artist>/<album>/<song>`. It is walked
//! with `WalkDir`, and the tags of each song are read with `Lofty` into the
//! same attribute names the album metadata files use.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::metadata::Attributes;

/// File extensions of the media files that are read.
const MEDIA_EXTENSIONS: [&str; 3] = ["mp3", "m4a", "aiff"];

/// The songs found in one album directory.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AlbumDir {
    pub(crate) path: PathBuf,
    pub(crate) songs: Vec<Attributes>,
}

pub(crate) fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

/// Reads the tags of one media file.
///
/// Only non-empty tags are returned. The album artist falls back to the
/// artist when the file has none.
///
/// # Errors
///
/// Returns an error if the file cannot be read or carries no tags at all.
pub(crate) fn read_embedded_metadata(path: &Path) -> Result<Attributes> {
    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .with_context(|| format!("could not read tags from '{}'", path.display()))?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .with_context(|| format!("no tags in '{}'", path.display()))?;

    let text = |key: &ItemKey| {
        tag.get(key)
            .and_then(|item| item.value().text())
            .map(str::to_string)
    };

    let candidates = [
        ("album", tag.album().map(|s| s.to_string())),
        ("artist", tag.artist().map(|s| s.to_string())),
        ("album-artist", text(&ItemKey::AlbumArtist)),
        ("comment", tag.comment().map(|s| s.to_string())),
        ("composer", text(&ItemKey::Composer)),
        ("genre", tag.genre().map(|s| s.to_string())),
        ("disk", tag.disk().map(|n| n.to_string())),
        ("total-disks", tag.disk_total().map(|n| n.to_string())),
        ("track", tag.track().map(|n| n.to_string())),
        ("total-tracks", tag.track_total().map(|n| n.to_string())),
        ("title", tag.title().map(|s| s.to_string())),
        ("year", text(&ItemKey::RecordingDate)),
    ];

    let mut attributes: Attributes = candidates
        .into_iter()
        .filter_map(|(key, value)| Some((key.to_string(), value.filter(|v| !v.is_empty())?)))
        .collect();

    if !attributes.contains_key("album-artist") {
        if let Some(artist) = attributes.get("artist").cloned() {
            attributes.insert("album-artist".to_string(), artist);
        }
    }

    Ok(attributes)
}

/// Reads every song under `root`, grouped by album directory.
///
/// Songs sit exactly two directories below `root`. Files that cannot be read
/// are skipped with a warning. Albums and their songs are in file name order.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub(crate) fn scan_albums(root: &Path) -> Result<Vec<AlbumDir>> {
    if !root.is_dir() {
        anyhow::bail!("media directory '{}' does not exist", root.display());
    }

    let mut albums: BTreeMap<PathBuf, Vec<Attributes>> = BTreeMap::new();

    for entry in WalkDir::new(root)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_media_file(e.path()))
    {
        let path = entry.path();

        let attributes = match read_embedded_metadata(path) {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(path = %path.display(), "skipping: {e:#}");
                continue;
            }
        };

        let Some(dir) = path.parent() else {
            continue;
        };
        debug!(path = %path.display(), tags = attributes.len(), "read tags");
        albums.entry(dir.to_path_buf()).or_default().push(attributes);
    }

    Ok(albums
        .into_iter()
        .map(|(path, songs)| AlbumDir { path, songs })
        .collect())
}
