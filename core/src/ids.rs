//! Strongly-typed identifiers and the per-item ledger sequence.
//!
//! Every reference the ledger touches (items, events, actors, institutions and
//! the related records shown on the read side) is a UUID wrapped in its own
//! newtype, so an actor id can never be passed where an item id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid identifier: {0}")]
pub struct ParseIdError(String);

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`.")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Wraps an existing `Uuid` as a `", stringify!($name), "`.")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| ParseIdError(format!("{s}: {e}")))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a tracked item (a demand or an indication).
    ItemId
);
uuid_id!(
    /// Identifier of a single ledger event.
    EventId
);
uuid_id!(
    /// Identifier of the user performing an operation or authoring a record.
    ActorId
);
uuid_id!(
    /// Identifier of the institution (office) owning items.
    InstitutionId
);
uuid_id!(
    /// Identifier of a constituent record referenced as an item's requester.
    ConstituentId
);
uuid_id!(
    /// Identifier of a category/tag attached to an item.
    CategoryId
);

/// Position of an event within its item's ledger.
///
/// Sequences are assigned by the store on append, start at 1 for the first
/// event, and grow by one per appended event. They are the primary ordering
/// key of a ledger, so two events written within the same clock tick still
/// replay in insertion order.
///
/// # Examples
///
/// ```
/// use status_ledger_core::ids::Sequence;
///
/// let first = Sequence::FIRST;
/// assert_eq!(first.next(), Sequence::new(2));
/// assert!(Sequence::new(3) > first);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    /// Sequence of the first event appended to a ledger.
    pub const FIRST: Self = Self(1);

    /// Create a sequence with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the sequence number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The sequence that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Sequence> for u64 {
    fn from(sequence: Sequence) -> Self {
        sequence.0
    }
}
