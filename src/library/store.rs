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

//! Loading, validating and persisting the library file.

use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
};

use serde_yaml::Value;
use tracing::{debug, info};

use super::{
    LibraryOptions,
    schema::{DecodedOptions, DefaultResolver, LibrarySchema, OptionDefault},
};
use crate::{
    error::{ErrorKind, LibraryError, Result},
    query::{ErrorRecord, OptionRequest},
    util::fs::write_atomic,
};

/// The result of applying the option requests of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct OptionUpdate {
    pub(crate) options: LibraryOptions,

    /// One entry per request: the option's value after all writes.
    pub(crate) values: Vec<Option<String>>,

    pub(crate) errors: Vec<ErrorRecord>,
}

/// Reads and writes the options stored in one library file.
pub(crate) struct LibraryStore<'a> {
    schema: &'a LibrarySchema,
    resolver: &'a dyn DefaultResolver,
    path: PathBuf,
}

impl<'a> LibraryStore<'a> {
    pub(crate) fn new(
        schema: &'a LibrarySchema,
        resolver: &'a dyn DefaultResolver,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            schema,
            resolver,
            path: path.into(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// The directory containing the library file.
    pub(crate) fn root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Loads and validates the library file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML, and
    /// an [`ErrorKind::MalformedConfig`] error if it is not a flat mapping of
    /// strings to strings or mentions an unknown option.
    pub(crate) fn load(&self) -> Result<LibraryOptions> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            LibraryError::new(
                ErrorKind::Io,
                format!("could not read YAML file '{}': {}", self.path.display(), e),
            )
        })?;

        let value: Value = serde_yaml::from_str(&text).map_err(|e| {
            LibraryError::new(
                ErrorKind::MalformedConfig,
                format!("malformed YAML file '{}': {}", self.path.display(), e),
            )
        })?;

        self.validate(value)
    }

    fn validate(&self, value: Value) -> Result<LibraryOptions> {
        let malformed = |message: String| {
            LibraryError::new(
                ErrorKind::MalformedConfig,
                format!("library file '{}' {}", self.path.display(), message),
            )
        };

        let Value::Mapping(mapping) = value else {
            return Err(malformed("does not contain map at top level".to_string()));
        };

        let mut options = LibraryOptions::new();
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(malformed(format!("contains non-string key: {key:?}")));
            };
            let Value::String(value) = value else {
                return Err(malformed(format!("contains non-string value: {value:?}")));
            };
            if !self.schema.is_known(&key) {
                return Err(malformed(format!("contains unexpected key: '{key}'")));
            }
            options.insert(key, value);
        }

        Ok(options)
    }

    /// Decodes every option present in `options`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::MalformedValue`] error naming the first option
    /// whose value does not decode.
    pub(crate) fn decode(&self, options: &LibraryOptions) -> Result<DecodedOptions> {
        let mut decoded = DecodedOptions::default();

        for (name, value) in options {
            let Some(spec) = self.schema.get(name) else {
                continue;
            };
            let value = spec.decode(value).map_err(|_| {
                LibraryError::new(
                    ErrorKind::MalformedValue,
                    format!(
                        "library file '{}' contains malformed value '{}' for option '{}'",
                        self.path.display(),
                        value,
                        name
                    ),
                )
            })?;
            decoded.0.insert(name.clone(), value);
        }

        Ok(decoded)
    }

    /// Returns the value of an option, computing its default if unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the option is unknown, or if computing an ambient
    /// default fails. The latter is annotated with a note naming the option
    /// and a hint to set it in the library file.
    pub(crate) fn get(&self, options: &LibraryOptions, name: &str) -> Result<String> {
        if let Some(value) = options.get(name) {
            return Ok(value.clone());
        }

        let spec = self.schema.get(name).ok_or_else(|| {
            LibraryError::new(ErrorKind::MalformedConfig, format!("unknown option '{name}'"))
        })?;

        match spec.default {
            OptionDefault::Literal(value) => Ok(value.to_string()),
            OptionDefault::Ambient(key) => self.resolver.resolve(key).map_err(|e| {
                e.with_note(format!(
                    "error occurred while generating default value for option '{name}'"
                ))
                .with_hint(format!("set option directly in '{}'", self.path.display()))
            }),
        }
    }

    /// Returns every option with its default filled in, as written by `init`.
    pub(crate) fn defaults(&self) -> Result<LibraryOptions> {
        let empty = LibraryOptions::new();

        self.schema
            .options()
            .map(|spec| Ok((spec.name.to_string(), self.get(&empty, spec.name)?)))
            .collect()
    }

    /// Applies the option requests of a query.
    ///
    /// Requests with a value overwrite the option; requests without one read
    /// it. Unknown options, malformed values and failing defaults become
    /// error records rather than failing the whole query.
    pub(crate) fn apply_requests(
        &self,
        options: &LibraryOptions,
        requests: &[OptionRequest],
    ) -> OptionUpdate {
        let mut update = OptionUpdate {
            options: options.clone(),
            ..OptionUpdate::default()
        };
        let mut unknown = BTreeSet::new();

        for request in requests {
            let Some(spec) = self.schema.get(&request.name) else {
                unknown.insert(request.name.as_str());
                continue;
            };
            if let Some(value) = &request.value {
                debug!(option = %request.name, value = %value, "setting option");
                update.options.insert(request.name.clone(), value.clone());
                if spec.decode(value).is_err() {
                    update
                        .errors
                        .push(ErrorRecord::malformed_option_value(&request.name, value));
                }
            }
        }

        for request in requests {
            if unknown.contains(request.name.as_str()) {
                update.values.push(None);
                continue;
            }
            match self.get(&update.options, &request.name) {
                Ok(value) => update.values.push(Some(value)),
                Err(e) => {
                    update.values.push(None);
                    update
                        .errors
                        .push(ErrorRecord::option_default_failed(&request.name, &e));
                }
            }
        }

        update
            .errors
            .extend(unknown.into_iter().map(ErrorRecord::unknown_option));

        update
    }

    /// Persists the options, replacing the library file atomically.
    pub(crate) fn save(&self, options: &LibraryOptions) -> Result<()> {
        info!(path = %self.path.display(), "writing library file");

        write_atomic(&self.path, |f| {
            serde_yaml::to_writer(f, options).map_err(io::Error::other)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        library::schema::{DEDUPLICATION_THRESHOLD, MEDIA_PATH, OWNER, fake::FixedResolver},
        query::ErrorReason,
    };
    use tempfile::TempDir;

    fn request(name: &str, value: Option<&str>) -> OptionRequest {
        OptionRequest {
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    fn store_with(dir: &TempDir, content: &str, resolver: &'static FixedResolver) -> LibraryStore<'static> {
        let schema: &'static LibrarySchema = Box::leak(Box::new(LibrarySchema::standard()));
        let path = dir.path().join("etunes.yml");
        std::fs::write(&path, content).unwrap();
        LibraryStore::new(schema, resolver, path)
    }

    static ANONYMOUS: FixedResolver = FixedResolver(None);
    static ALICE: FixedResolver = FixedResolver(Some("Alice"));

    #[test]
    fn load_accepts_string_mapping() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "deduplication-threshold: '0.5'\nmedia-path: m/{title}\n", &ANONYMOUS);

        let options = store.load().unwrap();

        assert_eq!(options.get(DEDUPLICATION_THRESHOLD).unwrap(), "0.5");
        assert_eq!(store.decode(&options).unwrap().deduplication_threshold(), Some(0.5));
    }

    #[test]
    fn load_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "bogus-key: x\n", &ANONYMOUS);

        let err = store.load().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedConfig);
        assert!(err.message().contains("unexpected key: 'bogus-key'"));
    }

    #[test]
    fn load_rejects_non_string_value() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "deduplication-threshold: 0.5\n", &ANONYMOUS);

        assert_eq!(store.load().unwrap_err().kind(), ErrorKind::MalformedConfig);
    }

    #[test]
    fn load_rejects_non_mapping() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "- a\n- b\n", &ANONYMOUS);

        let err = store.load().unwrap_err();

        assert!(err.message().contains("does not contain map at top level"));
    }

    #[test]
    fn decode_names_offending_option() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "deduplication-threshold: high\n", &ANONYMOUS);
        let options = store.load().unwrap();

        let err = store.decode(&options).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedValue);
        assert!(err.message().contains("'high' for option 'deduplication-threshold'"));
    }

    #[test]
    fn get_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "{}\n", &ALICE);
        let options = store.load().unwrap();

        assert_eq!(store.get(&options, DEDUPLICATION_THRESHOLD).unwrap(), "0.75");
        assert_eq!(store.get(&options, OWNER).unwrap(), "Alice");
    }

    #[test]
    fn failing_default_is_annotated() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "{}\n", &ANONYMOUS);

        let err = store.get(&LibraryOptions::new(), OWNER).unwrap_err();

        let rendered = err.render();
        assert!(rendered.contains("note: error occurred while generating default value for option 'owner'"));
        assert!(rendered.contains("hint: set option directly in"));
    }

    #[test]
    fn apply_requests_reads_and_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "{}\n", &ALICE);
        let options = store.load().unwrap();

        let update = store.apply_requests(
            &options,
            &[request(MEDIA_PATH, Some("media/{title}.{ext}")), request(MEDIA_PATH, None), request(OWNER, None)],
        );

        assert!(update.errors.is_empty());
        assert_eq!(update.options.get(MEDIA_PATH).unwrap(), "media/{title}.{ext}");
        assert_eq!(
            update.values,
            vec![
                Some("media/{title}.{ext}".to_string()),
                Some("media/{title}.{ext}".to_string()),
                Some("Alice".to_string()),
            ]
        );
    }

    #[test]
    fn apply_requests_collects_errors() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "{}\n", &ANONYMOUS);

        let update = store.apply_requests(
            &LibraryOptions::new(),
            &[
                request("bogus-key", None),
                request(DEDUPLICATION_THRESHOLD, Some("lots")),
                request(OWNER, None),
                request("bogus-key", Some("x")),
            ],
        );

        let reasons: Vec<_> = update.errors.iter().map(|e| e.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ErrorReason::MalformedOptionValue,
                ErrorReason::OptionDefaultFailed,
                ErrorReason::UnknownOption,
            ]
        );
        assert_eq!(update.values, vec![None, Some("lots".to_string()), None, None]);
        assert!(!update.options.contains_key("bogus-key"));
    }

    #[test]
    fn save_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "{}\n", &ALICE);

        let defaults = store.defaults().unwrap();
        store.save(&defaults).unwrap();

        assert_eq!(store.load().unwrap(), defaults);
        assert_eq!(defaults.len(), 4);
    }
}
