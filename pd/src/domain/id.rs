//! User identity
//!
//! Identity is the name a user typed in. It is opaque and case-sensitive, and
//! two sessions under the same name are the same user as far as pairing goes.

use serde::{Deserialize, Serialize};

use super::PairingError;

/// Longest accepted name, in bytes
///
/// Keeps every IPC response carrying a partner name well inside the
/// response size limit, whatever the name escapes to in JSON.
pub const MAX_USER_ID_LEN: usize = 256;

/// User identifier wrapper for type-safe name handling
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap a user name
    ///
    /// Empty, whitespace-only and over-long names are rejected. Accepted
    /// names are kept verbatim, surrounding whitespace included.
    pub fn parse(name: &str) -> Result<Self, PairingError> {
        Self::try_from(name.to_string())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = PairingError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        if name.trim().is_empty() {
            return Err(PairingError::InvalidUser(name));
        }
        if name.len() > MAX_USER_ID_LEN {
            return Err(PairingError::NameTooLong {
                len: name.len(),
                max: MAX_USER_ID_LEN,
            });
        }
        Ok(Self(name))
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_plain_name() {
        let id = UserId::parse("Alice").unwrap();
        assert_eq!(id.as_str(), "Alice");
        assert_eq!(id.to_string(), "Alice");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(UserId::parse(""), Err(PairingError::InvalidUser(_))));
    }

    #[test]
    fn test_parse_rejects_whitespace_only() {
        assert!(UserId::parse("   ").is_err());
        assert!(UserId::parse("\t\n").is_err());
    }

    #[test]
    fn test_parse_keeps_name_verbatim() {
        let id = UserId::parse(" Bob ").unwrap();
        assert_eq!(id.as_str(), " Bob ");
    }

    #[test]
    fn test_parse_length_limit() {
        assert!(UserId::parse(&"a".repeat(MAX_USER_ID_LEN)).is_ok());
        assert!(matches!(
            UserId::parse(&"a".repeat(MAX_USER_ID_LEN + 1)),
            Err(PairingError::NameTooLong { len, max: MAX_USER_ID_LEN }) if len == MAX_USER_ID_LEN + 1
        ));
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        let lower = UserId::parse("carol").unwrap();
        let upper = UserId::parse("Carol").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_deserialize_rejects_blank_name() {
        let result: Result<UserId, _> = serde_json::from_str(r#""  ""#);
        assert!(result.is_err());

        let id: UserId = serde_json::from_str(r#""Dave""#).unwrap();
        assert_eq!(id.as_str(), "Dave");
    }
}
