//! Error taxonomy for ledger operations.
//!
//! Four kinds of failure reach callers:
//!
//! - [`LedgerError::PermissionDenied`] and [`LedgerError::Validation`] are
//!   raised before any write is attempted, so they never leave partial state.
//! - [`LedgerError::NotFound`] reports an unknown item reference.
//! - [`LedgerError::TransientStore`] wraps a failed backing-store call. It is
//!   surfaced for the primary append and swallowed for the advisory cache
//!   write-through.
//!
//! [`LedgerError::user_message`] gives the text shown to end users: specific
//! for rejections, generic for infrastructure failures.

use crate::family::ItemKind;
use crate::ids::{ActorId, InstitutionId, ItemId};
use crate::status::Status;
use thiserror::Error;

/// Result alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Reasons a transition or observation draft is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The requested status requires explanatory notes.
    #[error("Status '{status}' requires notes explaining the change")]
    NotesRequired {
        /// The status that was requested.
        status: Status,
    },

    /// An observation was submitted without text.
    #[error("Observation text cannot be empty")]
    EmptyObservation,

    /// No status label was given.
    #[error("A target status is required")]
    MissingStatus,

    /// The reserved `observation` label was used as a status change.
    #[error("'observation' is reserved for annotations; add an observation instead")]
    ReservedStatus,

    /// A metadata field failed validation.
    #[error("Invalid {field}: {reason}")]
    Metadata {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors that can occur during ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The actor lacks the capability for this operation.
    #[error("Actor {actor} may not {action} {module} in institution {institution}")]
    PermissionDenied {
        /// Who attempted the operation.
        actor: ActorId,
        /// Institution owning the item.
        institution: InstitutionId,
        /// Permission module checked.
        module: &'static str,
        /// Action checked (`read`, `write`).
        action: &'static str,
    },

    /// The request was rejected by validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced item does not exist (or is not visible to the actor).
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Family of the missing item.
        kind: ItemKind,
        /// The unknown item id.
        id: ItemId,
    },

    /// A backing-store call failed.
    #[error("Store error: {0}")]
    TransientStore(String),
}

impl LedgerError {
    /// Wrap any displayable backing-store failure.
    pub fn store(error: impl std::fmt::Display) -> Self {
        Self::TransientStore(error.to_string())
    }

    /// Whether the operation may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }

    /// Message suitable for showing to an end user.
    ///
    /// Store failures never expose internal detail.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied { module, action, .. } => {
                let verb = if *action == "read" { "view" } else { "update" };
                format!(
                    "You do not have permission to {verb} {module}. Contact your office administrator."
                )
            }
            Self::Validation(error) => error.to_string(),
            Self::NotFound { kind, .. } => {
                format!("This {kind} no longer exists or is not available to you.")
            }
            Self::TransientStore(_) => {
                "Something went wrong while saving. Please try again.".to_string()
            }
        }
    }
}
