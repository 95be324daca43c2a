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

//! Album metadata normalisation.
//!
//! An album metadata file stores the attributes its songs have in common once,
//! under `album`, and for each song only the attributes that differ. This
//! module converts between that compact form ([`AlbumRecord`]) and the
//! effective per-song attribute maps.
//!
//! # Round trip
//!
//! For any list of songs `c`, `split(c).expand() == c`. To make this hold when
//! a song lacks an attribute the album declares, the song record carries an
//! explicit `null` for that attribute, meaning "unset, do not inherit".
//!
//! # Tie-break
//!
//! When two values each account for exactly half of the songs, the value that
//! appears first (by song index) becomes the album value.

pub(crate) mod file;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Effective attributes of one song.
pub(crate) type Attributes = BTreeMap<String, String>;

/// Per-song deviations from the album attributes. `None` unsets an attribute.
pub(crate) type Overrides = BTreeMap<String, Option<String>>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct AlbumRecord {
    pub(crate) album: Attributes,
    pub(crate) songs: Vec<Overrides>,
}

impl AlbumRecord {
    /// Expands every song record against the album attributes.
    pub(crate) fn expand(&self) -> Vec<Attributes> {
        self.songs.iter().map(|song| merge(&self.album, song)).collect()
    }
}

/// Computes the effective attributes of a song.
///
/// Every attribute of `parent` is inherited unless `child` overrides it; a
/// `None` override removes the attribute.
pub(crate) fn merge(parent: &Attributes, child: &Overrides) -> Attributes {
    let mut merged = parent.clone();

    for (key, value) in child {
        match value {
            Some(value) => {
                merged.insert(key.clone(), value.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }

    merged
}

/// Splits effective song attributes into album attributes plus overrides.
///
/// An attribute value is promoted to the album when it is non-empty and held
/// by at least half of the songs. Songs then record only the attributes that
/// differ from the album.
pub(crate) fn split(children: &[Attributes]) -> AlbumRecord {
    let keys: BTreeSet<&String> = children.iter().flat_map(|child| child.keys()).collect();

    let mut album = Attributes::new();
    for key in keys {
        if let Some(value) = majority_value(children, key) {
            album.insert(key.clone(), value.to_string());
        }
    }

    let songs = children.iter().map(|child| diff(&album, child)).collect();

    AlbumRecord { album, songs }
}

/// Picks the first non-empty value of `key` held by at least half the songs.
fn majority_value<'a>(children: &'a [Attributes], key: &str) -> Option<&'a str> {
    // Candidates in order of first appearance, which fixes the tie-break.
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for value in children.iter().filter_map(|child| child.get(key)) {
        match counts.iter_mut().find(|(v, _)| *v == value.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((value.as_str(), 1)),
        }
    }

    counts
        .into_iter()
        .find(|(value, count)| !value.is_empty() && count * 2 >= children.len())
        .map(|(value, _)| value)
}

fn diff(parent: &Attributes, child: &Attributes) -> Overrides {
    let mut overrides = Overrides::new();

    for (key, value) in child {
        if parent.get(key) != Some(value) {
            overrides.insert(key.clone(), Some(value.clone()));
        }
    }

    for key in parent.keys() {
        if !child.contains_key(key) {
            overrides.insert(key.clone(), None);
        }
    }

    overrides
}
