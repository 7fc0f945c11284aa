//! Match priority levels.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Priority of a rule match, ordered from most to least urgent.
///
/// The derived `Ord` follows declaration order, so an ascending sort puts
/// `Critical` first. Unknown priority strings normalize to [`Priority::Medium`]
/// rather than failing, both in [`Priority::parse`] and in deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority string, normalizing anything unknown to `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    /// The canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriorityVisitor;

        impl Visitor<'_> for PriorityVisitor {
            type Value = Priority;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a priority string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Priority, E> {
                Ok(Priority::parse(v))
            }
        }

        deserializer.deserialize_str(PriorityVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_puts_critical_first() {
        let mut prios = vec![
            Priority::Low,
            Priority::Critical,
            Priority::Medium,
            Priority::High,
        ];
        prios.sort();
        assert_eq!(
            prios,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Medium,
                Priority::Low
            ]
        );
    }

    #[test]
    fn unknown_normalizes_to_medium() {
        assert_eq!(Priority::parse("urgent"), Priority::Medium);
        assert_eq!(Priority::parse(""), Priority::Medium);
        assert_eq!(Priority::parse("CRITICAL"), Priority::Critical);
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: Priority = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(back, Priority::Medium);
    }
}
