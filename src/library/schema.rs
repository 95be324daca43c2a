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

//! The set of library options, their defaults, and their decoders.
//!
//! A [`LibrarySchema`] is built once at startup and passed by reference to
//! everything that reads or writes options.

use std::collections::BTreeMap;

use crate::error::{ErrorKind, LibraryError, Result};

pub(crate) const DEDUPLICATION_THRESHOLD: &str = "deduplication-threshold";
pub(crate) const MEDIA_PATH: &str = "media-path";
pub(crate) const METADATA_PATH: &str = "metadata-path";
pub(crate) const OWNER: &str = "owner";

/// How an option's default is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OptionDefault {
    Literal(&'static str),
    /// Read lazily from an ambient setting through a [`DefaultResolver`].
    Ambient(&'static str),
}

/// How an option's string value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoder {
    Text,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DecodedValue {
    Text(String),
    Float(f64),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OptionSpec {
    pub(crate) name: &'static str,
    pub(crate) default: OptionDefault,
    pub(crate) decoder: Decoder,
}

/// Computes defaults that depend on the user's environment, such as their
/// version-control identity.
pub(crate) trait DefaultResolver {
    /// Returns the value of the ambient setting `key`.
    fn resolve(&self, key: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub(crate) struct LibrarySchema {
    options: Vec<OptionSpec>,
}

impl LibrarySchema {
    /// The options understood by this version of eTunes.
    pub(crate) fn standard() -> Self {
        Self {
            options: vec![
                OptionSpec {
                    name: DEDUPLICATION_THRESHOLD,
                    default: OptionDefault::Literal("0.75"),
                    decoder: Decoder::Float,
                },
                OptionSpec {
                    name: MEDIA_PATH,
                    default: OptionDefault::Literal("media/{album-artist}/{album}/{title}.{ext}"),
                    decoder: Decoder::Text,
                },
                OptionSpec {
                    name: METADATA_PATH,
                    default: OptionDefault::Literal("metadata/{album-artist}/{album}.yml"),
                    decoder: Decoder::Text,
                },
                OptionSpec {
                    name: OWNER,
                    default: OptionDefault::Ambient("user.name"),
                    decoder: Decoder::Text,
                },
            ],
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    pub(crate) fn is_known(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub(crate) fn options(&self) -> impl Iterator<Item = &OptionSpec> {
        self.options.iter()
    }
}

impl OptionSpec {
    /// Decodes a value of this option.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::MalformedValue`] error naming the option and
    /// the value if it cannot be decoded.
    pub(crate) fn decode(&self, value: &str) -> Result<DecodedValue> {
        match self.decoder {
            Decoder::Text => Ok(DecodedValue::Text(value.to_string())),
            Decoder::Float => value.trim().parse::<f64>().map(DecodedValue::Float).map_err(|_| {
                LibraryError::new(
                    ErrorKind::MalformedValue,
                    format!(
                        "for option {}: malformed floating-point value: '{}'",
                        self.name, value
                    ),
                )
            }),
        }
    }
}

/// Decoded option values, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DecodedOptions(pub(crate) BTreeMap<String, DecodedValue>);

impl DecodedOptions {
    pub(crate) fn deduplication_threshold(&self) -> Option<f64> {
        match self.0.get(DEDUPLICATION_THRESHOLD) {
            Some(DecodedValue::Float(threshold)) => Some(*threshold),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::DefaultResolver;
    use crate::error::{ErrorKind, LibraryError, Result};

    /// Resolves every ambient setting to the same value, or fails if unset.
    pub(crate) struct FixedResolver(pub(crate) Option<&'static str>);

    impl DefaultResolver for FixedResolver {
        fn resolve(&self, key: &str) -> Result<String> {
            self.0.map(str::to_string).ok_or_else(|| {
                LibraryError::new(
                    ErrorKind::MalformedConfig,
                    format!("Git configuration value '{key}' is not set"),
                )
            })
        }
    }
}
