//! Topic names, topic filters and wildcard matching.
//!
//! A [`Topic`] is either empty (invalid) or holds a name that passed
//! [`validate`] and fits the length limit it was built with. Names starting
//! with `$` are system topics; they skip the syntax rules and never match the
//! bare `#` filter.

use std::fmt;

use crate::error::{TopicError, TopicViolation};

/// Default maximum topic length in bytes.
pub const DEFAULT_MAX_TOPIC_LENGTH: usize = 50;

/// Check a topic name or filter against the broker's syntax rules.
///
/// Rules apply in order and the first one that decides wins.
pub fn validate(name: &str) -> Result<(), TopicViolation> {
    if name.is_empty() {
        return Err(TopicViolation::Empty);
    }
    if name.starts_with('/') {
        return Err(TopicViolation::LeadingSlash);
    }
    if name.starts_with('$') {
        return Ok(());
    }
    if name.contains(' ') {
        return Err(TopicViolation::ContainsSpace);
    }
    if name.contains("//") {
        return Err(TopicViolation::EmptyLevel);
    }

    let hashes = name.matches('#').count();
    let pluses = name.matches('+').count();
    if hashes > 0 && pluses > 0 {
        return Err(TopicViolation::MixedWildcards);
    }
    if hashes > 1 || pluses > 1 {
        return Err(TopicViolation::RepeatedWildcard);
    }
    if name == "#" {
        return Ok(());
    }
    if hashes == 1 {
        return if name.ends_with("/#") {
            Ok(())
        } else {
            Err(TopicViolation::MisplacedMultiLevel)
        };
    }
    if let Some(i) = name.find('+') {
        let bytes = name.as_bytes();
        let before = i > 0 && bytes[i - 1] == b'/';
        let after = bytes.get(i + 1) == Some(&b'/');
        if !(before && after) {
            return Err(TopicViolation::MisplacedSingleLevel);
        }
    }
    Ok(())
}

pub fn is_valid_name(name: &str) -> bool {
    validate(name).is_ok()
}

/// A validated topic name or filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Topic {
    name: String,
    wildcards: bool,
}

impl Topic {
    /// Validate `name` with the default length limit.
    pub fn new(name: &str) -> Result<Self, TopicError> {
        Self::with_max_length(name, DEFAULT_MAX_TOPIC_LENGTH)
    }

    pub fn with_max_length(name: &str, max_length: usize) -> Result<Self, TopicError> {
        if name.len() > max_length {
            return Err(TopicError::TooLong {
                len: name.len(),
                max: max_length,
            });
        }
        validate(name)?;
        Ok(Self {
            name: name.to_string(),
            wildcards: name.contains(['+', '#']),
        })
    }

    /// Replace the name; on failure the topic is left reset.
    pub fn set(&mut self, name: &str, max_length: usize) -> Result<(), TopicError> {
        match Self::with_max_length(name, max_length) {
            Ok(topic) => {
                *self = topic;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Clear to the empty, invalid topic.
    pub fn reset(&mut self) {
        self.name.clear();
        self.wildcards = false;
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn has_wildcards(&self) -> bool {
        self.wildcards
    }

    pub fn is_system(&self) -> bool {
        self.name.starts_with('$')
    }

    /// Whether a concrete topic and a filter select each other.
    ///
    /// Either side may be the filter. Two filters never match, and two
    /// concrete names match only when equal.
    pub fn matches(&self, other: &Topic) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }

        match (self.wildcards, other.wildcards) {
            (true, true) => false,
            (false, false) => self.name == other.name,
            _ => {
                if self.name == "#" || other.name == "#" {
                    return !(self.is_system() || other.is_system());
                }
                match_levels(&self.name, &other.name)
            }
        }
    }
}

fn match_levels(a: &str, b: &str) -> bool {
    let mut left = a.split('/');
    let mut right = b.split('/');
    loop {
        match (left.next(), right.next()) {
            (Some("#"), _) | (_, Some("#")) => return true,
            (Some(l), Some(r)) => {
                if l != r && l != "+" && r != "+" {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl TryFrom<&str> for Topic {
    type Error = TopicError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Topic::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[test]
    fn test_validation_table() {
        let cases = [
            ("", false),
            ("house/frontroom/tempurature", true),
            ("/house/frontroom/tempurature", false),
            ("house//frontroom", false),
            ("#", true),
            ("#a", false),
            ("house/frontroom/#", true),
            ("house/frontroom/#/", false),
            ("house/#/frontroom/#", false),
            ("house/+/frontroom/#", false),
            ("+", false),
            ("house/frontroom/+", false),
            ("house/+/tempurature", true),
            ("house/+/frontroom/+/size", false),
            ("house/front room/tempurature", false),
            ("$SYS/anything goes//", true),
        ];
        for (name, valid) in cases {
            assert_eq!(is_valid_name(name), valid, "{name:?}");
        }
    }

    #[test]
    fn test_violation_reasons() {
        assert_eq!(validate(""), Err(TopicViolation::Empty));
        assert_eq!(validate("/a"), Err(TopicViolation::LeadingSlash));
        assert_eq!(validate("a b"), Err(TopicViolation::ContainsSpace));
        assert_eq!(validate("a//b"), Err(TopicViolation::EmptyLevel));
        assert_eq!(validate("a/+/#"), Err(TopicViolation::MixedWildcards));
        assert_eq!(validate("a/#/#"), Err(TopicViolation::RepeatedWildcard));
        assert_eq!(validate("a#"), Err(TopicViolation::MisplacedMultiLevel));
        assert_eq!(validate("a/b+/c"), Err(TopicViolation::MisplacedSingleLevel));
    }

    #[test]
    fn test_lengths() {
        assert_eq!(topic("house/frontroom/tempurature").len(), 27);
        assert_eq!(topic("#").len(), 1);
        assert_eq!(topic("house/frontroom/#").len(), 17);
    }

    #[test]
    fn test_length_limit() {
        let name = "a".repeat(DEFAULT_MAX_TOPIC_LENGTH);
        assert!(Topic::new(&name).is_ok());
        let name = "a".repeat(DEFAULT_MAX_TOPIC_LENGTH + 1);
        assert_eq!(
            Topic::new(&name),
            Err(TopicError::TooLong {
                len: DEFAULT_MAX_TOPIC_LENGTH + 1,
                max: DEFAULT_MAX_TOPIC_LENGTH
            })
        );
    }

    #[test]
    fn test_set_and_reset() {
        let mut t = topic("a/b");
        assert!(t.set("a//b", DEFAULT_MAX_TOPIC_LENGTH).is_err());
        assert!(!t.is_valid());
        assert_eq!(t.len(), 0);

        t.set("a/#", DEFAULT_MAX_TOPIC_LENGTH).unwrap();
        assert!(t.has_wildcards());
        t.reset();
        assert!(t.is_empty());
        assert!(!t.has_wildcards());
    }

    #[test]
    fn test_matching() {
        let temp = topic("house/frontroom/tempurature");
        assert!(temp.matches(&topic("house/frontroom/tempurature")));
        assert!(!temp.matches(&topic("house/frontroom/humidity")));
        assert!(temp.matches(&topic("house/frontroom/#")));
        assert!(topic("house/frontroom/#").matches(&temp));

        let plus = topic("house/+/tempurature");
        assert!(plus.matches(&topic("house/frontroom/tempurature")));
        assert!(plus.matches(&topic("house/kitchen/tempurature")));
        assert!(!plus.matches(&topic("house/frontroom/humidity")));
        assert!(!plus.matches(&topic("house/frontroom/cupboard/tempurature")));
    }

    #[test]
    fn test_matching_edge_cases() {
        // Two filters never match each other
        assert!(!topic("house/#").matches(&topic("house/#")));
        assert!(!topic("#").matches(&topic("house/+/x")));

        // Bare '#' matches everything except system topics
        assert!(topic("#").matches(&topic("a/b")));
        assert!(!topic("#").matches(&topic("$SYS/uptime")));
        assert!(topic("$SYS/#").matches(&topic("$SYS/uptime")));

        // Multi-level wildcard also covers its parent level
        assert!(topic("house/#").matches(&topic("house")));

        // Different depth without a wildcard
        assert!(!topic("a/b").matches(&topic("a/b/c")));
        assert!(!topic("a/+/c").matches(&topic("a/b")));

        // Invalid topics match nothing
        assert!(!Topic::default().matches(&Topic::default()));
    }
}
