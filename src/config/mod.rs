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

//! User configuration.
//!
//! This module manages the per-user configuration file. Library-wide options
//! are not kept here; they live in the library file so they are versioned
//! with the library.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_NAME: &str = "etunes";

/// Log filter used when neither `ETUNES_LOG` nor the config sets one.
pub(crate) const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) version: u32,

    /// The library used when none is given on the command line.
    pub(crate) library: Option<PathBuf>,

    /// A `tracing` filter directive such as `info` or `etunes=debug`.
    pub(crate) log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            library: None,
            log_level: None,
        }
    }
}

impl AppConfig {
    pub(crate) fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Loads the user configuration, falling back to defaults if it is missing
/// or unreadable.
pub(crate) fn load_config() -> AppConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: AppConfig = serde_yaml::from_str("log_level: debug\n").unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.library, None);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(AppConfig::default().log_level(), DEFAULT_LOG_LEVEL);
    }
}
