//! Item families and their typed event payloads.
//!
//! Demands and indications share one ledger design but carry different
//! side-channel metadata on their events. Each family is a zero-sized marker
//! implementing [`ItemFamily`]; the family picks the [`EventDetails`] payload
//! type, so a demand event can never carry a protocol number and an
//! indication event can never carry a revised deadline.

use crate::error::ValidationError;
use crate::status::Status;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime tag of an item family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Service demand raised on behalf of a constituent.
    Demand,
    /// Legislative indication filed with the executive.
    Indication,
}

impl ItemKind {
    /// Stable lowercase name, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demand => "demand",
            Self::Indication => "indication",
        }
    }

    /// Permission module guarding writes to this family.
    #[must_use]
    pub const fn module(self) -> &'static str {
        match self {
            Self::Demand => "demands",
            Self::Indication => "indications",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family-specific metadata carried by a status event.
///
/// Every field is optional; a `None` field means "this event says nothing
/// about it", which is what lets latched values carry forward.
pub trait EventDetails:
    Clone + fmt::Debug + Default + PartialEq + Eq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The latched view: the last non-null value of every field.
    type Latched: Clone + fmt::Debug + Default + PartialEq + Eq + Serialize + Send + Sync + 'static;

    /// Overwrite the latched fields this event supplies a value for.
    fn latch_into(&self, latched: &mut Self::Latched);

    /// Blank strings become `None`; surrounding whitespace is trimmed.
    #[must_use]
    fn normalized(self) -> Self;

    /// Reject malformed metadata for an item created on `created_on`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the offending field.
    fn check(&self, created_on: NaiveDate) -> Result<(), ValidationError>;

    /// Whether no field is set.
    fn is_empty(&self) -> bool;
}

/// A family of ledger-tracked items.
pub trait ItemFamily:
    Copy + Clone + fmt::Debug + Default + PartialEq + Eq + Send + Sync + 'static
{
    /// Metadata carried by this family's events.
    type Details: EventDetails;

    /// Runtime tag for storage, logs and permission checks.
    const KIND: ItemKind;

    /// Status an item starts in when no explicit initial status is given.
    fn default_status() -> Status;
}

/// Service demands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Demand;

impl ItemFamily for Demand {
    type Details = DemandDetails;

    const KIND: ItemKind = ItemKind::Demand;

    fn default_status() -> Status {
        Status::new(Status::PENDING)
    }
}

/// Legislative indications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Indication;

impl ItemFamily for Indication {
    type Details = IndicationDetails;

    const KIND: ItemKind = ItemKind::Indication;

    fn default_status() -> Status {
        Status::new(Status::CREATED)
    }
}

/// Demand event metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandDetails {
    /// Deadline revision recorded alongside the status change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_deadline: Option<NaiveDate>,
}

impl DemandDetails {
    /// Details revising the deadline.
    #[must_use]
    pub const fn with_deadline(new_deadline: NaiveDate) -> Self {
        Self {
            new_deadline: Some(new_deadline),
        }
    }
}

/// Latched demand metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DemandLatched {
    /// Most recent deadline revision, if any event supplied one.
    pub revised_deadline: Option<NaiveDate>,
}

impl EventDetails for DemandDetails {
    type Latched = DemandLatched;

    fn latch_into(&self, latched: &mut Self::Latched) {
        if let Some(deadline) = self.new_deadline {
            latched.revised_deadline = Some(deadline);
        }
    }

    fn normalized(self) -> Self {
        self
    }

    /// `created_on` is a UTC date, so one day of slack keeps a deadline on
    /// the local creation day valid in any time zone.
    fn check(&self, created_on: NaiveDate) -> Result<(), ValidationError> {
        let earliest = created_on.pred_opt().unwrap_or(created_on);
        match self.new_deadline {
            Some(deadline) if deadline < earliest => Err(ValidationError::Metadata {
                field: "new_deadline",
                reason: format!("{deadline} is before the item was created ({created_on})"),
            }),
            _ => Ok(()),
        }
    }

    fn is_empty(&self) -> bool {
        self.new_deadline.is_none()
    }
}

/// Indication event metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicationDetails {
    /// Protocol number assigned when the indication is filed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_number: Option<String>,
    /// Location of the generated protocol document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_document_url: Option<String>,
}

impl IndicationDetails {
    /// Details carrying a protocol number only.
    #[must_use]
    pub fn with_protocol(protocol_number: impl Into<String>) -> Self {
        Self {
            protocol_number: Some(protocol_number.into()),
            protocol_document_url: None,
        }
    }

    /// Details carrying a generated document only.
    #[must_use]
    pub fn with_document(protocol_document_url: impl Into<String>) -> Self {
        Self {
            protocol_number: None,
            protocol_document_url: Some(protocol_document_url.into()),
        }
    }
}

/// Latched indication metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndicationLatched {
    /// Most recent protocol number.
    pub protocol_number: Option<String>,
    /// Most recent protocol document.
    pub protocol_document_url: Option<String>,
}

impl EventDetails for IndicationDetails {
    type Latched = IndicationLatched;

    fn latch_into(&self, latched: &mut Self::Latched) {
        if let Some(number) = non_blank(self.protocol_number.as_deref()) {
            latched.protocol_number = Some(number.to_string());
        }
        if let Some(url) = non_blank(self.protocol_document_url.as_deref()) {
            latched.protocol_document_url = Some(url.to_string());
        }
    }

    fn normalized(self) -> Self {
        Self {
            protocol_number: non_blank(self.protocol_number.as_deref()).map(str::to_string),
            protocol_document_url: non_blank(self.protocol_document_url.as_deref())
                .map(str::to_string),
        }
    }

    fn check(&self, _created_on: NaiveDate) -> Result<(), ValidationError> {
        if let Some(url) = non_blank(self.protocol_document_url.as_deref()) {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ValidationError::Metadata {
                    field: "protocol_document_url",
                    reason: format!("'{url}' is not an http(s) URL"),
                });
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        non_blank(self.protocol_number.as_deref()).is_none()
            && non_blank(self.protocol_document_url.as_deref()).is_none()
    }
}

/// `Some(trimmed)` unless the value is missing or whitespace only.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
