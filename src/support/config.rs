//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Tunables for the message parsing core.
///
/// This is typically embedded in a larger configuration file as a `[parser]`
/// table, but can also be loaded on its own. Every field has a sensible
/// default, so an empty file is a valid configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Bounds on how much of a message the section engine will decompose.
    pub limits: Limits,

    /// Adjustments to charset resolution.
    pub charsets: CharsetConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    /// Sections nested this deep are treated as leaves, regardless of their
    /// content type.
    pub max_depth: u32,
    /// The maximum number of sections which will be materialised under a
    /// single root. Parts beyond this are silently dropped from the tree.
    pub max_parts: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: 20,
            max_parts: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CharsetConfig {
    /// Charset labels to rewrite before lookup, keyed by the label as it
    /// appears in messages (case-insensitive).
    ///
    /// This is mainly useful for vendor-specific labels such as
    /// `x-mac-roman` which would otherwise be rejected as unsupported.
    pub aliases: BTreeMap<String, String>,
}

impl ParserConfig {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ParserConfig::from_toml("").unwrap();
        assert_eq!(Limits::default(), config.limits);
        assert!(config.charsets.aliases.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let config = ParserConfig::from_toml(
            r#"
[limits]
max_depth = 5

[charsets.aliases]
"x-mac-roman" = "macintosh"
"#,
        )
        .unwrap();

        assert_eq!(5, config.limits.max_depth);
        assert_eq!(1000, config.limits.max_parts);
        assert_eq!(
            Some("macintosh"),
            config.charsets.aliases.get("x-mac-roman").map(String::as_str)
        );
    }

    #[test]
    fn bad_config_is_reported() {
        assert_matches!(
            Err(Error::Config(_)),
            ParserConfig::from_toml("[limits]\nmax_depth = \"deep\"\n")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        assert_matches!(
            Err(Error::Io(_)),
            ParserConfig::load(Path::new("/nonexistent/parser.toml"))
        );
    }
}
