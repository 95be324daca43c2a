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

use serde::Serialize;
use std::{io, path::Path};

use crate::error::{Annotation, LibraryError};

/// Why one part of a query failed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ErrorReason {
    UnknownOption,
    MalformedOptionValue,
    OptionDefaultFailed,
    InterveningTransaction,
    OsError,
}

/// A recoverable error, reported in the response rather than on stderr.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ErrorRecord {
    pub(crate) reason: ErrorReason,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) file: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) notes: Vec<String>,
}

impl ErrorRecord {
    pub(crate) fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            name: None,
            value: None,
            file: None,
            notes: Vec::new(),
        }
    }

    pub(crate) fn unknown_option(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(ErrorReason::UnknownOption, format!("Unknown option '{name}'"))
        }
    }

    pub(crate) fn malformed_option_value(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            ..Self::new(
                ErrorReason::MalformedOptionValue,
                format!("Malformed value '{value}' for option '{name}'"),
            )
        }
    }

    /// Reports a failure to compute an option's default, keeping the
    /// annotations of the underlying error as notes.
    pub(crate) fn option_default_failed(name: &str, err: &LibraryError) -> Self {
        Self {
            name: Some(name.to_string()),
            notes: err.annotations().iter().map(Annotation::to_string).collect(),
            ..Self::new(ErrorReason::OptionDefaultFailed, err.message())
        }
    }

    pub(crate) fn intervening_transaction(actual: &str, expected: &str) -> Self {
        Self::new(
            ErrorReason::InterveningTransaction,
            format!("Another transaction ({actual}) happened after {expected} but before this one"),
        )
    }

    pub(crate) fn os_error(file: &Path, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.display().to_string()),
            ..Self::new(ErrorReason::OsError, message)
        }
    }
}

/// The outcome of a query, written to stdout as JSON.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub(crate) struct Response {
    pub(crate) success: bool,

    /// Set when some durable change was made although the query failed.
    pub(crate) partial: bool,

    pub(crate) errors: Vec<ErrorRecord>,

    /// The id recorded for this transaction, to pass as the next query's
    /// `last-id`. Absent only when it could not be recorded.
    #[serde(rename = "last-id", skip_serializing_if = "Option::is_none")]
    pub(crate) last_id: Option<String>,

    /// The value of each requested option, in request order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<Vec<Option<String>>>,
}

impl Response {
    /// Writes the response as indented JSON followed by a newline.
    pub(crate) fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        out.flush()
    }
}
