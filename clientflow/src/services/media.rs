//! Media type parsing and compatibility.

use crate::errors::EntityError;
use std::fmt;
use std::str::FromStr;

/// A `type/subtype` media type. Parameters are accepted and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    kind: String,
    subtype: String,
}

impl MediaType {
    /// Creates a media type from its two halves, lowercased.
    #[must_use]
    pub fn new(kind: impl AsRef<str>, subtype: impl AsRef<str>) -> Self {
        Self {
            kind: kind.as_ref().to_ascii_lowercase(),
            subtype: subtype.as_ref().to_ascii_lowercase(),
        }
    }

    /// `application/json`
    #[must_use]
    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    /// `text/plain`
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// `*/*`
    #[must_use]
    pub fn wildcard() -> Self {
        Self::new("*", "*")
    }

    /// Returns the primary type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the subtype.
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Returns true if either half is a wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.kind == "*" || self.subtype == "*"
    }

    /// Returns true if the two media types can describe the same content.
    ///
    /// Wildcards on either side match anything in that position.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        let kind_matches = self.kind == "*" || other.kind == "*" || self.kind == other.kind;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        kind_matches && subtype_matches
    }
}

impl FromStr for MediaType {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or_else(|| EntityError::InvalidMediaType(s.to_string()))?;

        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "*+-.!#$&^_".contains(c))
        };
        if !valid(kind) || !valid(subtype) || (kind == "*" && subtype != "*") {
            return Err(EntityError::InvalidMediaType(s.to_string()));
        }

        Ok(Self::new(kind, subtype))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_parameters() {
        let media: MediaType = "Application/JSON; charset=utf-8".parse().unwrap();
        assert_eq!(media, MediaType::application_json());
        assert_eq!(media.to_string(), "application/json");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("json".parse::<MediaType>().is_err());
        assert!("/json".parse::<MediaType>().is_err());
        assert!("*/json".parse::<MediaType>().is_err());
        assert!("text/pl ain".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_wildcard_compatibility() {
        let json = MediaType::application_json();
        let any_app: MediaType = "application/*".parse().unwrap();

        assert!(json.is_compatible(&MediaType::wildcard()));
        assert!(any_app.is_compatible(&json));
        assert!(!json.is_compatible(&MediaType::text_plain()));
        assert!(any_app.is_wildcard());
    }
}
