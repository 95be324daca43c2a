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

//! Fatal, process-level errors.
//!
//! Every error that aborts a command is a [`LibraryError`]: a primary message
//! tagged with an [`ErrorKind`], followed by an ordered list of
//! [`Annotation`]s (usage lines, notes, hints). The annotations are rendered
//! by [`LibraryError::render`] at the process boundary, one per line.
//!
//! Errors that can be attributed to a single part of a query are not
//! represented here; they become records in the query response instead.

use std::fmt::{self, Write as _};

/// Classifies a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Usage,
    MalformedQuery,
    MalformedConfig,
    MalformedValue,
    MalformedMetadata,
    DirtyWorkingTree,
    ToolUnavailable,
    ConcurrentTransaction,
    LibraryNotFound,
    Io,
}

/// A secondary line attached to an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Annotation {
    Usage(String),
    Note(String),
    Hint(String),
    /// Printed verbatim, e.g. the offending query text.
    Detail(String),
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Usage(text) => write!(f, "usage: {text}"),
            Annotation::Note(text) => write!(f, "note: {text}"),
            Annotation::Hint(text) => write!(f, "hint: {text}"),
            Annotation::Detail(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub(crate) struct LibraryError {
    kind: ErrorKind,
    message: String,
    annotations: Vec<Annotation>,
}

pub(crate) type Result<T> = std::result::Result<T, LibraryError>;

impl LibraryError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            annotations: Vec::new(),
        }
    }

    /// Wraps a failure to run an external tool, adding the installation note.
    pub(crate) fn tool_unavailable(tool: &str, message: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ToolUnavailable,
            format!("unexpected failure while running '{tool}': {message}"),
        )
        .with_note(format!("{} must be installed in order to use eTunes", capitalise(tool)))
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub(crate) fn with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub(crate) fn with_usage(self, usage: impl Into<String>) -> Self {
        self.with(Annotation::Usage(usage.into()))
    }

    pub(crate) fn with_note(self, note: impl Into<String>) -> Self {
        self.with(Annotation::Note(note.into()))
    }

    pub(crate) fn with_hint(self, hint: impl Into<String>) -> Self {
        self.with(Annotation::Hint(hint.into()))
    }

    pub(crate) fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with(Annotation::Detail(detail.into()))
    }

    /// Renders the error as the multi-line text written to stderr.
    ///
    /// The first line is the primary message prefixed by `etunes: `, then
    /// each annotation follows in the order it was attached.
    pub(crate) fn render(&self) -> String {
        let mut out = format!("etunes: {}", self.message);
        for annotation in &self.annotations {
            let _ = write!(out, "\n{annotation}");
        }
        out
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
