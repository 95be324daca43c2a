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

//! Attribute matchers used by song filters and imports.

use regex::RegexBuilder;
use serde::Deserialize;

/// Tests a single attribute value.
///
/// A bare string matches that exact value. The object forms allow literal or
/// regex matching, optionally as a substring and case-insensitively, or
/// testing whether the attribute is missing.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub(crate) enum Matcher {
    Exact(String),
    Pattern(PatternMatcher),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) enum PatternMatcher {
    Literal {
        query: String,
        #[serde(default)]
        substring: bool,
        #[serde(default, rename = "case-fold")]
        case_fold: bool,
    },
    Regex {
        query: String,
        #[serde(default)]
        substring: bool,
        #[serde(default, rename = "case-fold")]
        case_fold: bool,
    },
    Missing {
        query: bool,
    },
}

impl Matcher {
    /// Checks that a regex matcher compiles.
    pub(crate) fn validate(&self) -> Result<(), regex::Error> {
        self.matches(Some("")).map(|_| ())
    }

    /// Evaluates the matcher against an attribute value, `None` if the
    /// attribute is not set.
    ///
    /// # Errors
    ///
    /// Returns an error if a regex matcher does not compile.
    pub(crate) fn matches(&self, value: Option<&str>) -> Result<bool, regex::Error> {
        match self {
            Matcher::Exact(query) => Ok(value == Some(query.as_str())),
            Matcher::Pattern(PatternMatcher::Missing { query }) => Ok(value.is_none() == *query),
            Matcher::Pattern(PatternMatcher::Literal {
                query,
                substring,
                case_fold,
            }) => {
                let Some(value) = value else {
                    return Ok(false);
                };
                let (value, query) = if *case_fold {
                    (value.to_lowercase(), query.to_lowercase())
                } else {
                    (value.to_string(), query.clone())
                };
                Ok(if *substring {
                    value.contains(&query)
                } else {
                    value == query
                })
            }
            Matcher::Pattern(PatternMatcher::Regex {
                query,
                substring,
                case_fold,
            }) => {
                let Some(value) = value else {
                    return Ok(false);
                };
                let pattern = if *substring {
                    query.clone()
                } else {
                    format!("^(?:{query})$")
                };
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(*case_fold)
                    .build()?;
                Ok(regex.is_match(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Matcher {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn bare_string_is_exact() {
        let matcher = parse(r#""Blue""#);

        assert!(matcher.matches(Some("Blue")).unwrap());
        assert!(!matcher.matches(Some("blue")).unwrap());
        assert!(!matcher.matches(None).unwrap());
    }

    #[test]
    fn literal_substring_case_fold() {
        let matcher = parse(r#"{"type": "literal", "query": "BLUE", "substring": true, "case-fold": true}"#);

        assert!(matcher.matches(Some("Kind of Blue")).unwrap());
        assert!(!matcher.matches(Some("Red")).unwrap());
    }

    #[test]
    fn regex_is_anchored_unless_substring() {
        let anchored = parse(r#"{"type": "regex", "query": "Blue.*"}"#);
        let substring = parse(r#"{"type": "regex", "query": "Blue", "substring": true}"#);

        assert!(anchored.matches(Some("Blue Train")).unwrap());
        assert!(!anchored.matches(Some("Kind of Blue")).unwrap());
        assert!(substring.matches(Some("Kind of Blue")).unwrap());
    }

    #[test]
    fn bad_regex_is_an_error() {
        let matcher = parse(r#"{"type": "regex", "query": "("}"#);

        assert!(matcher.matches(Some("x")).is_err());
    }

    #[test]
    fn missing_matcher() {
        let missing = parse(r#"{"type": "missing", "query": true}"#);
        let present = parse(r#"{"type": "missing", "query": false}"#);

        assert!(missing.matches(None).unwrap());
        assert!(!missing.matches(Some("x")).unwrap());
        assert!(present.matches(Some("x")).unwrap());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Matcher>(r#"{"type": "glob", "query": "*"}"#).is_err());
        assert!(serde_json::from_str::<Matcher>(r#"{"type": "missing", "query": "yes"}"#).is_err());
    }
}
