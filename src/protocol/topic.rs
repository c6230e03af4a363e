//! Notification topics and per-connection subscription sets.
//!
//! A connection receives a [`NotificationMessage`](super::NotificationMessage)
//! only when the message's topic is in its [`TopicSet`].

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Topic
// ============================================================================

/// Notification category; doubles as the wire `type` of outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Structured [`ProgressUpdate`](super::ProgressUpdate) payloads.
    Progress,
    /// Status changes, including the post-connect greeting.
    Status,
    /// Final results of an operation.
    Result,
    /// Operation failures.
    Error,
    /// Free-form log lines.
    Log,
}

impl Topic {
    /// All topics in wire order.
    pub const ALL: [Topic; 5] = [
        Topic::Progress,
        Topic::Status,
        Topic::Result,
        Topic::Error,
        Topic::Log,
    ];

    /// Returns the wire name of the topic.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Status => "status",
            Self::Result => "result",
            Self::Error => "error",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| Error::protocol(format!("unknown topic: {s}")))
    }
}

// ============================================================================
// TopicSet
// ============================================================================

/// Set of topics a connection is subscribed to.
///
/// Serializes as a sorted JSON array of topic names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicSet(BTreeSet<Topic>);

impl TopicSet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions applied when the handshake carries no `subscribe`.
    #[must_use]
    pub fn handshake_default() -> Self {
        [Topic::Progress, Topic::Status].into_iter().collect()
    }

    /// Parses a comma-separated list such as `progress,error`.
    ///
    /// Returns the recognized topics and the entries that were rejected.
    /// Blank entries are skipped silently.
    #[must_use]
    pub fn parse_list(list: &str) -> (Self, Vec<String>) {
        let mut set = Self::new();
        let mut rejected = Vec::new();

        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.parse::<Topic>() {
                Ok(topic) => {
                    set.insert(topic);
                }
                Err(_) => rejected.push(entry.to_owned()),
            }
        }

        (set, rejected)
    }

    /// Returns `true` if the topic is subscribed.
    #[inline]
    #[must_use]
    pub fn contains(&self, topic: Topic) -> bool {
        self.0.contains(&topic)
    }

    /// Adds a topic, returning `true` if it was not present.
    #[inline]
    pub fn insert(&mut self, topic: Topic) -> bool {
        self.0.insert(topic)
    }

    /// Removes a topic, returning `true` if it was present.
    #[inline]
    pub fn remove(&mut self, topic: Topic) -> bool {
        self.0.remove(&topic)
    }

    /// Unions every topic of `other` into this set.
    pub fn union_with(&mut self, other: &TopicSet) {
        self.0.extend(other.iter());
    }

    /// Returns the number of subscribed topics.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates topics in wire order.
    pub fn iter(&self) -> impl Iterator<Item = Topic> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Topic> for TopicSet {
    fn from_iter<I: IntoIterator<Item = Topic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Topic> for TopicSet {
    fn extend<I: IntoIterator<Item = Topic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use proptest::sample::subsequence;

    #[test]
    fn test_handshake_default() {
        let set = TopicSet::handshake_default();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Topic::Progress));
        assert!(set.contains(Topic::Status));
        assert!(!set.contains(Topic::Log));
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let (set, rejected) = TopicSet::parse_list("progress, error,bogus,,");
        assert!(set.contains(Topic::Progress));
        assert!(set.contains(Topic::Error));
        assert_eq!(set.len(), 2);
        assert_eq!(rejected, vec!["bogus".to_owned()]);
    }

    #[test]
    fn test_parse_empty_list() {
        let (set, rejected) = TopicSet::parse_list("");
        assert!(set.is_empty());
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_serializes_sorted_names() {
        let set: TopicSet = [Topic::Log, Topic::Progress].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["progress","log"]"#);
    }

    #[test]
    fn test_topic_from_str() {
        assert_eq!("result".parse::<Topic>().unwrap(), Topic::Result);
        assert!("Result".parse::<Topic>().is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_list_keeps_exactly_named_topics(
            picked in subsequence(Topic::ALL.to_vec(), 0..=Topic::ALL.len())
        ) {
            let list = picked.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(",");
            let (set, rejected) = TopicSet::parse_list(&list);

            prop_assert!(rejected.is_empty());
            prop_assert_eq!(set.len(), picked.len());
            for topic in Topic::ALL {
                prop_assert_eq!(set.contains(topic), picked.contains(&topic));
            }
        }
    }
}
