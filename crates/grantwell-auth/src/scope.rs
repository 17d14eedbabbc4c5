//! OAuth 2.0 scope sets.
//!
//! A scope travels on the wire as a space-delimited string
//! (RFC 6749 Section 3.3). [`Scope`] is the parsed form: a set of
//! permission strings with duplicates collapsed.
//!
//! # Examples
//!
//! ```
//! use grantwell_auth::scope::Scope;
//!
//! let granted = Scope::parse("read write");
//! let requested = Scope::parse("read read");
//!
//! assert_eq!(requested.len(), 1);
//! assert!(requested.is_subset_of(&granted));
//! assert!(!granted.is_subset_of(&requested));
//! assert_eq!(granted.to_string(), "read write");
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set of scope tokens.
///
/// Tokens keep the order in which they first appeared so that a scope echoed
/// back to a client reads the way the client wrote it. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    tokens: IndexSet<String>,
}

impl Scope {
    /// Creates an empty scope.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a space-delimited scope string.
    ///
    /// Any run of ASCII whitespace separates tokens. An empty or blank string
    /// yields the empty set.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        s.split_ascii_whitespace().map(str::to_owned).collect()
    }

    /// Returns `true` if every token in `self` is also in `other`.
    ///
    /// The empty set is a subset of every scope. Whether an empty request
    /// means "no narrowing" is for the caller to decide.
    #[must_use]
    pub fn is_subset_of(&self, other: &Scope) -> bool {
        self.tokens.iter().all(|t| other.tokens.contains(t))
    }

    /// Returns `true` if the token is part of this scope.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Returns `true` if the scope has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Iterates over the tokens in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset_of(other)
    }
}

impl Eq for Scope {}

impl<S: Into<String>> FromIterator<S> for Scope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(token)?;
        }
        Ok(())
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collapses_duplicates() {
        let scope = Scope::parse("foo bar foo");
        assert_eq!(scope.len(), 2);
        assert!(scope.contains("foo"));
        assert!(scope.contains("bar"));
    }

    #[test]
    fn test_parse_empty_and_blank() {
        assert!(Scope::parse("").is_empty());
        assert!(Scope::parse("   \t ").is_empty());
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        let scope = Scope::parse("  foo \t bar  ");
        assert_eq!(scope.to_string(), "foo bar");
    }

    #[test]
    fn test_display_keeps_request_order() {
        assert_eq!(Scope::parse("foo bar").to_string(), "foo bar");
        assert_eq!(Scope::parse("bar foo").to_string(), "bar foo");
    }

    #[test]
    fn test_subset() {
        let granted = Scope::parse("foo bar");

        assert!(Scope::parse("foo").is_subset_of(&granted));
        assert!(Scope::parse("bar foo").is_subset_of(&granted));
        assert!(Scope::empty().is_subset_of(&granted));
        assert!(!Scope::parse("foo bar qux").is_subset_of(&granted));
        assert!(!Scope::parse("qux").is_subset_of(&granted));
    }

    #[test]
    fn test_subset_of_empty() {
        let empty = Scope::empty();
        assert!(empty.is_subset_of(&empty));
        assert!(!Scope::parse("foo").is_subset_of(&empty));
    }

    #[test]
    fn test_equality_ignores_order() {
        assert_eq!(Scope::parse("foo bar"), Scope::parse("bar foo"));
        assert_ne!(Scope::parse("foo"), Scope::parse("foo bar"));
    }

    #[test]
    fn test_from_iterator_drops_empty_tokens() {
        let scope: Scope = vec!["read", "", "write"].into_iter().collect();
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_serde_as_string() {
        let scope = Scope::parse("openid offline_access");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#""openid offline_access""#);

        let back: Scope = serde_json::from_str(r#""a b a""#).unwrap();
        assert_eq!(back, Scope::parse("a b"));
    }
}
