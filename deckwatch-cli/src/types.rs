//! Common types used across CLI modules

use deckwatch_core::domain::job::JobId;
use uuid::Uuid;

/// Identifier that can be either a full job ID or an unambiguous prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOrPrefix {
    /// Full ID, used as-is
    Full(JobId),
    /// Prefix that should uniquely identify a job
    Prefix(String),
}

impl IdOrPrefix {
    /// Parse a string into an IdOrPrefix
    ///
    /// The service hands out UUIDs, so anything that parses as one is taken
    /// as a full ID; everything else is a prefix.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Uuid::parse_str(input) {
            Ok(uuid) => IdOrPrefix::Full(JobId::new(uuid.hyphenated().to_string())),
            Err(_) => IdOrPrefix::Prefix(input.to_lowercase()),
        }
    }

    /// Get the ID if this is a full one
    pub fn as_full(&self) -> Option<&JobId> {
        match self {
            IdOrPrefix::Full(id) => Some(id),
            IdOrPrefix::Prefix(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IdOrPrefix::Full(id) => id.as_str(),
            IdOrPrefix::Prefix(prefix) => prefix,
        }
    }
}

impl std::fmt::Display for IdOrPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for IdOrPrefix {
    fn from(s: &str) -> Self {
        IdOrPrefix::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_uuid_is_full() {
        let parsed = IdOrPrefix::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF");
        assert_eq!(
            parsed.as_full(),
            Some(&JobId::from("6f9619ff-8b86-d011-b42d-00c04fc964ff"))
        );
    }

    #[test]
    fn test_anything_else_is_prefix() {
        assert_eq!(IdOrPrefix::parse(" 6F96 "), IdOrPrefix::Prefix("6f96".to_string()));
        assert_eq!(IdOrPrefix::from("abc").as_full(), None);
        assert_eq!(IdOrPrefix::from("abc").to_string(), "abc");
    }
}
