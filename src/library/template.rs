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

//! Path templates such as `metadata/{album-artist}/{album}.yml`.

use std::path::PathBuf;

use crate::metadata::Attributes;

/// Expands `{key}` placeholders from `attributes`.
///
/// `{ext}` is replaced by `ext`. Path separators inside values are replaced
/// with `_`, as are values of `.` and `..`, so every value stays a single
/// path component below its directory. Unset or empty attributes expand to
/// `Unknown <key>`. An unterminated `{` is kept as is.
pub(crate) fn expand(template: &str, attributes: &Attributes, ext: &str) -> PathBuf {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = &after[..end];
        let value = if key == "ext" {
            ext.to_string()
        } else {
            match attributes.get(key) {
                Some(value) if !value.is_empty() => path_component(value),
                _ => format!("Unknown {key}"),
            }
        };
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    PathBuf::from(out)
}

fn path_component(value: &str) -> String {
    match value {
        "." | ".." => "_".to_string(),
        _ => value.replace(['/', '\\'], "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_known_keys() {
        let attributes = attrs(&[("album-artist", "AC/DC"), ("album", "Back in Black")]);

        let path = expand("metadata/{album-artist}/{album}.yml", &attributes, "yml");

        assert_eq!(path, PathBuf::from("metadata/AC_DC/Back in Black.yml"));
    }

    #[test]
    fn missing_keys_and_ext() {
        let attributes = attrs(&[("title", "Intro"), ("album", "")]);

        let path = expand("media/{album-artist}/{album}/{title}.{ext}", &attributes, "mp3");

        assert_eq!(
            path,
            PathBuf::from("media/Unknown album-artist/Unknown album/Intro.mp3")
        );
    }

    #[test]
    fn unterminated_brace_is_literal() {
        assert_eq!(expand("a/{b", &Attributes::new(), "x"), PathBuf::from("a/{b"));
    }

    #[test]
    fn dot_values_stay_inside_their_directory() {
        let attributes = attrs(&[("album-artist", ".."), ("album", "etunes")]);

        let path = expand("metadata/{album-artist}/{album}.yml", &attributes, "yml");

        assert_eq!(path, PathBuf::from("metadata/_/etunes.yml"));
        assert_eq!(
            expand("metadata/{album}/x", &attrs(&[("album", ".")]), "yml"),
            PathBuf::from("metadata/_/x")
        );
    }

    #[test]
    fn dots_inside_values_are_kept() {
        let attributes = attrs(&[("album-artist", "...And You Will Know Us"), ("album", "..x")]);

        let path = expand("{album-artist}/{album}", &attributes, "yml");

        assert_eq!(path, PathBuf::from("...And You Will Know Us/..x"));
    }
}
