//! Injected collaborators.
//!
//! Everything the ledger needs from the outside world besides storage sits
//! behind a trait here, so services can be assembled from production
//! adapters or from the in-memory doubles in `status-ledger-testing`.

use crate::error::Result;
use crate::ids::{ActorId, CategoryId, ConstituentId, InstitutionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use status_ledger_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let earlier = clock.now();
/// assert!(clock.now() >= earlier);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The authenticated user performing an operation, in their active institution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Actor {
    /// The user.
    pub user_id: ActorId,
    /// Institution the user is acting for.
    pub institution_id: InstitutionId,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(user_id: ActorId, institution_id: InstitutionId) -> Self {
        Self {
            user_id,
            institution_id,
        }
    }
}

/// Action checked against a permission module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// View records.
    Read,
    /// Create records and append to ledgers.
    Write,
}

impl Capability {
    /// Action name as understood by the permission collaborator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership/role resolution, reduced to a single capability check.
pub trait PermissionChecker: Send + Sync {
    /// Whether `user_id` may perform `action` on `module` within `institution_id`.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the permission source could not be reached
    fn has_capability(
        &self,
        user_id: ActorId,
        institution_id: InstitutionId,
        module: &'static str,
        action: Capability,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;
}

/// Raw full names keyed by actor.
pub type NameMap = HashMap<ActorId, String>;

/// Source of actor display names.
///
/// Both lookups are batched: one call per set of ids, never one per id.
pub trait IdentityDirectory: Send + Sync {
    /// Full names of current members of an institution among `actor_ids`.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the roster could not be read
    fn roster_names(
        &self,
        institution_id: InstitutionId,
        actor_ids: Vec<ActorId>,
    ) -> Pin<Box<dyn Future<Output = Result<NameMap>> + Send + '_>>;

    /// Full names from the global profile store, for anyone among `actor_ids`.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the profile store could not be read
    fn profile_names(
        &self,
        actor_ids: Vec<ActorId>,
    ) -> Pin<Box<dyn Future<Output = Result<NameMap>> + Send + '_>>;
}

/// Labels of records that items reference but the ledger does not own.
pub trait RelatedDirectory: Send + Sync {
    /// Names of the given constituents; unknown ids are simply absent.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the lookup failed
    fn constituent_names(
        &self,
        ids: Vec<ConstituentId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<ConstituentId, String>>> + Send + '_>>;

    /// Labels of the given categories; unknown ids are simply absent.
    ///
    /// # Errors
    ///
    /// - `TransientStore`: the lookup failed
    fn category_labels(
        &self,
        ids: Vec<CategoryId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<CategoryId, String>>> + Send + '_>>;
}
