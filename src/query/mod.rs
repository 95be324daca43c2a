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

//! Queries and their responses.
//!
//! A query is a JSON document describing one transaction against the
//! library. Its shape is checked while deserialising: any deviation is a
//! fatal [`ErrorKind::MalformedQuery`] error, reported before anything on
//! disk is touched.

mod matcher;
mod response;

pub(crate) use matcher::Matcher;
pub(crate) use response::{ErrorReason, ErrorRecord, Response};

use serde::{Deserialize, Deserializer};
use std::{
    collections::BTreeMap,
    io::Read,
    path::{Path, PathBuf},
};

use crate::error::{ErrorKind, LibraryError, Result};

pub(crate) const QUERY_USAGE: &str = "etunes query (<json> | @<query-file> | -)";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Query {
    /// Commit message for the transaction.
    #[serde(default, deserialize_with = "non_null")]
    pub(crate) description: Option<String>,

    /// The transaction id the caller last observed.
    #[serde(default, deserialize_with = "non_null")]
    pub(crate) last_id: Option<String>,

    #[serde(default, deserialize_with = "non_null")]
    pub(crate) options: Option<Vec<OptionRequest>>,

    #[serde(default)]
    pub(crate) songs: Vec<SongOperation>,

    #[serde(default)]
    pub(crate) import: Vec<Matcher>,
}

/// Reads an option, or sets it when `value` is present.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct OptionRequest {
    pub(crate) name: String,
    #[serde(default, deserialize_with = "non_null")]
    pub(crate) value: Option<String>,
}

/// An operation on the songs selected by `filter`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct SongOperation {
    #[serde(default)]
    pub(crate) filter: BTreeMap<String, Matcher>,
    #[serde(default)]
    pub(crate) get: Vec<String>,
    #[serde(default)]
    pub(crate) set: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) extract: Vec<String>,
    #[serde(default)]
    pub(crate) embed: Vec<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub(crate) rename: Option<bool>,
    #[serde(default, deserialize_with = "non_null")]
    pub(crate) check: Option<bool>,
}

impl Query {
    /// Parses and validates query text.
    ///
    /// `name` identifies where the text came from and is only used in error
    /// messages.
    pub(crate) fn parse(text: &str, name: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            LibraryError::new(
                ErrorKind::MalformedQuery,
                format!("could not parse query JSON: {e}"),
            )
            .with_detail(format!("query:\n{text}"))
        })?;

        let malformed = |e: &dyn std::fmt::Display| {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string());
            LibraryError::new(ErrorKind::MalformedQuery, format!("{name} was malformed: {e}"))
                .with_detail(format!("\nquery:\n{pretty}"))
        };

        let query = Query::deserialize(&value).map_err(|e| malformed(&e))?;
        query.matchers().try_for_each(Matcher::validate).map_err(|e| malformed(&e))?;

        Ok(query)
    }

    /// Every matcher in the song filters and imports.
    fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.songs
            .iter()
            .flat_map(|op| op.filter.values())
            .chain(self.import.iter())
    }

    /// The last id to compare against, ignoring an empty string.
    pub(crate) fn expected_last_id(&self) -> Option<&str> {
        self.last_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Deserializes an optional field that may be left out but not set to
/// `null`.
fn non_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Where the text of a query comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QuerySource {
    Stdin,
    File(PathBuf),
    Inline(String),
}

impl QuerySource {
    /// Interprets a query argument: `-` for stdin, `@file` for a file relative
    /// to `cwd`, or inline JSON starting with `{` or `[`.
    pub(crate) fn from_arg(arg: &str, cwd: &Path) -> Result<Self> {
        if arg == "-" {
            Ok(QuerySource::Stdin)
        } else if let Some(file) = arg.strip_prefix('@') {
            Ok(QuerySource::File(cwd.join(file)))
        } else if arg.starts_with('{') || arg.starts_with('[') {
            Ok(QuerySource::Inline(arg.to_string()))
        } else {
            Err(LibraryError::new(
                ErrorKind::Usage,
                format!("string '{arg}' does not identify a query"),
            )
            .with_usage(QUERY_USAGE))
        }
    }

    /// Reads the query text, returning it with a description of its origin.
    pub(crate) fn read(&self, stdin: &mut dyn Read) -> Result<(String, String)> {
        match self {
            QuerySource::Stdin => {
                let mut text = String::new();
                stdin.read_to_string(&mut text).map_err(|e| {
                    LibraryError::new(ErrorKind::Io, format!("could not read query from stdin: {e}"))
                })?;
                Ok((text, "query from stdin".to_string()))
            }
            QuerySource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    LibraryError::new(
                        ErrorKind::Io,
                        format!("could not read query file '{}': {}", path.display(), e),
                    )
                })?;
                Ok((text, format!("query from file '{}'", path.display())))
            }
            QuerySource::Inline(text) => {
                Ok((text.clone(), "query from command-line argument".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_query() {
        let text = r#"{
            "description": "Retag Kind of Blue",
            "last-id": "T1",
            "options": [{"name": "media-path"}, {"name": "deduplication-threshold", "value": "0.5"}],
            "songs": [{
                "filter": {"album": "Kind of Blue", "artist": {"type": "regex", "query": "miles", "case-fold": true}},
                "set": {"genre": "Jazz"},
                "get": ["title"],
                "rename": true
            }],
            "import": ["*.mp3", {"type": "missing", "query": false}]
        }"#;

        let query = Query::parse(text, "query from command-line argument").unwrap();

        assert_eq!(query.description.as_deref(), Some("Retag Kind of Blue"));
        assert_eq!(query.expected_last_id(), Some("T1"));
        let options = query.options.unwrap();
        assert_eq!(options[0].value, None);
        assert_eq!(options[1].value.as_deref(), Some("0.5"));
        assert_eq!(query.songs[0].set.get("genre").unwrap(), "Jazz");
        assert_eq!(query.songs[0].rename, Some(true));
        assert_eq!(query.import.len(), 2);
    }

    #[test]
    fn empty_object_is_a_valid_query() {
        let query = Query::parse("{}", "q").unwrap();

        assert_eq!(query, Query::default());
        assert!(query.options.is_none());
    }

    #[test]
    fn empty_last_id_is_ignored() {
        let query = Query::parse(r#"{"last-id": ""}"#, "q").unwrap();

        assert_eq!(query.expected_last_id(), None);
    }

    #[test]
    fn invalid_json_is_fatal() {
        let err = Query::parse("{not json", "q").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedQuery);
        assert!(err.message().starts_with("could not parse query JSON"));
    }

    #[test]
    fn wrong_shape_names_the_source() {
        let err = Query::parse(r#"{"options": [{"value": "x"}]}"#, "query from stdin").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedQuery);
        assert!(err.message().starts_with("query from stdin was malformed"));
        assert!(!err.annotations().is_empty());
    }

    #[test]
    fn unknown_option_request_field_is_rejected() {
        let err = Query::parse(r#"{"options": [{"name": "a", "default": "x"}]}"#, "q").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedQuery);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = Query::parse(
            r#"{"songs": [{"filter": {"title": {"type": "regex", "query": "(unclosed"}}}]}"#,
            "q",
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedQuery);
        assert!(err.message().starts_with("q was malformed"));
    }

    #[test]
    fn top_level_array_is_rejected() {
        assert!(Query::parse("[]", "q").is_err());
    }

    #[test]
    fn explicit_nulls_are_rejected() {
        for text in [
            r#"{"options": null}"#,
            r#"{"description": null}"#,
            r#"{"last-id": null}"#,
            r#"{"options": [{"name": "media-path", "value": null}]}"#,
            r#"{"songs": [{"rename": null}]}"#,
        ] {
            let err = Query::parse(text, "q").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedQuery, "{text}");
        }
    }

    #[test]
    fn non_string_option_value_is_rejected() {
        assert!(Query::parse(r#"{"options": [{"name": "a", "value": 1}]}"#, "q").is_err());
    }

    #[test]
    fn source_from_arg() {
        let cwd = Path::new("/music");

        assert_eq!(QuerySource::from_arg("-", cwd).unwrap(), QuerySource::Stdin);
        assert_eq!(
            QuerySource::from_arg("@q.json", cwd).unwrap(),
            QuerySource::File(PathBuf::from("/music/q.json"))
        );
        assert_eq!(
            QuerySource::from_arg("{}", cwd).unwrap(),
            QuerySource::Inline("{}".to_string())
        );

        let err = QuerySource::from_arg("options", cwd).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.render().contains("usage: etunes query"));
    }

    #[test]
    fn stdin_source_reads_text() {
        let mut stdin = "{\"description\": \"x\"}".as_bytes();

        let (text, name) = QuerySource::Stdin.read(&mut stdin).unwrap();

        assert_eq!(name, "query from stdin");
        assert!(text.contains("description"));
    }
}
