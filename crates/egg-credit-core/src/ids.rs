//! Identifier types for the egg credit ledger.
//!
//! User, trace, agent, package and subscription identifiers are issued by other
//! systems as opaque strings, so they are validated string newtypes rather than
//! UUIDs. Ledger event identifiers are ULIDs generated here.
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro reduces boilerplate for the string identifiers,
//! ensuring consistent validation, serialization, parsing, and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock, PoisonError};
use ulid::{Generator, Ulid};

/// Maximum accepted length of a string identifier, in bytes.
pub const MAX_ID_LEN: usize = 128;

/// Validate a raw identifier and return its trimmed form.
fn validate(raw: &str) -> Result<&str, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(IdError::TooLong { max: MAX_ID_LEN });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(IdError::InvalidCharacter);
    }
    Ok(trimmed)
}

/// Macro to define a validated string identifier type.
///
/// Generates a newtype wrapper around `String` with:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as string, validated on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`, `AsRef<str>`
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, validating the input.
            ///
            /// # Errors
            ///
            /// Returns an error if the identifier is empty, too long, or contains
            /// control characters.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, IdError> {
                validate(raw.as_ref()).map(|s| Self(s.to_string()))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_type!(UserId, "A user identifier, as issued by the account system.");
string_id_type!(TraceId, "A usage trace identifier, shared with the cost provider.");
string_id_type!(AgentId, "An agent identifier attached to usage for attribution.");
string_id_type!(PackageId, "A package identifier in the package master data.");
string_id_type!(
    SubscriptionId,
    "A subscription identifier linking a user to a main package."
);

/// Process-wide monotonic ULID source.
fn generator() -> &'static Mutex<Generator> {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR.get_or_init(|| Mutex::new(Generator::new()))
}

/// A ledger event identifier using ULID for time-ordering.
///
/// Identifiers generated by one process are strictly increasing, even within a
/// single millisecond, so they order events created at the same instant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new `EventId` greater than every one generated before it.
    #[must_use]
    pub fn generate() -> Self {
        let mut generator = generator().lock().unwrap_or_else(PoisonError::into_inner);
        // Overflow needs 2^80 ids in one millisecond; a fresh random ULID is fine then.
        Self(generator.generate().unwrap_or_else(|_| Ulid::new()))
    }

    /// Return the bytes of the ULID (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }
}

impl FromStr for EventId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EventId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty or whitespace only.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds the maximum length.
    #[error("identifier longer than {max} bytes")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// The identifier contains control characters.
    #[error("identifier contains control characters")]
    InvalidCharacter,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_is_trimmed() {
        let id = UserId::new("  user-42 ").unwrap();
        assert_eq!(id.as_str(), "user-42");
    }

    #[test]
    fn empty_id_rejected() {
        assert_eq!(UserId::new("   "), Err(IdError::Empty));
        assert_eq!("".parse::<TraceId>(), Err(IdError::Empty));
    }

    #[test]
    fn long_id_rejected() {
        let raw = "x".repeat(MAX_ID_LEN + 1);
        assert_eq!(
            PackageId::new(raw),
            Err(IdError::TooLong { max: MAX_ID_LEN })
        );
    }

    #[test]
    fn control_characters_rejected() {
        assert_eq!(UserId::new("a\0b"), Err(IdError::InvalidCharacter));
    }

    #[test]
    fn user_id_serde_json_validates() {
        let id: UserId = serde_json::from_str("\"u-1\"").unwrap();
        assert_eq!(id.to_string(), "u-1");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn event_id_serde_json() {
        let id = EventId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn event_ids_increase_within_a_millisecond() {
        let ids: Vec<EventId> = (0..1000).map(|_| EventId::generate()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn event_id_rejects_garbage() {
        assert_eq!("not-a-ulid".parse::<EventId>(), Err(IdError::InvalidUlid));
    }
}
