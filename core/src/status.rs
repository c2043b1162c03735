//! Status labels.
//!
//! Statuses form an open label set: each family has well-known values, and
//! institutions may add their own. The only reserved label is
//! [`Status::OBSERVATION`], which marks a free-text annotation rather than a
//! state change.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A status label recorded in the ledger.
///
/// Labels are stored trimmed; comparison is exact.
///
/// # Examples
///
/// ```
/// use status_ledger_core::status::Status;
///
/// let status = Status::new(" in_progress ");
/// assert_eq!(status.as_str(), "in_progress");
/// assert!(!status.is_observation());
/// assert!(Status::observation().is_observation());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    /// The reserved pseudo-status for annotations.
    pub const OBSERVATION: &'static str = "observation";

    /// Demand awaiting action (demand creation default).
    pub const PENDING: &'static str = "pending";
    /// Work has started.
    pub const IN_PROGRESS: &'static str = "in_progress";
    /// Demand answered.
    pub const RESOLVED: &'static str = "resolved";
    /// Abandoned by the office.
    pub const CANCELLED: &'static str = "cancelled";

    /// Indication recorded (indication creation default).
    pub const CREATED: &'static str = "created";
    /// Formal document generated.
    pub const FORMALIZED: &'static str = "formalized";
    /// Filed with the legislature under a protocol number.
    pub const FILED: &'static str = "filed";
    /// Executive has acted on the indication.
    pub const FULFILLED: &'static str = "fulfilled";

    /// Create a status label, trimming surrounding whitespace.
    #[must_use]
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_string())
    }

    /// The reserved `observation` pseudo-status.
    #[must_use]
    pub fn observation() -> Self {
        Self(Self::OBSERVATION.to_string())
    }

    /// Whether this label is the reserved `observation` pseudo-status.
    #[must_use]
    pub fn is_observation(&self) -> bool {
        self.0 == Self::OBSERVATION
    }

    /// Whether the label is empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Status {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Status {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl AsRef<str> for Status {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Status {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Status {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
