//! In-memory permission, identity and label collaborators.
//!
//! Each double counts its backing calls so tests can assert batching.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned locks panic

use status_ledger_core::environment::{
    Capability, IdentityDirectory, NameMap, PermissionChecker, RelatedDirectory,
};
use status_ledger_core::error::{LedgerError, Result};
use status_ledger_core::ids::{ActorId, CategoryId, ConstituentId, InstitutionId};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

type Grant = (ActorId, InstitutionId, &'static str, Capability);

/// Explicit capability grants.
///
/// Nothing is allowed until granted.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    grants: RwLock<HashSet<Grant>>,
    calls: AtomicUsize,
}

impl StaticPermissions {
    /// Create an empty grant table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `actor` to perform `capability` on `module` within `institution`.
    pub fn grant(
        &self,
        actor: ActorId,
        institution: InstitutionId,
        module: &'static str,
        capability: Capability,
    ) {
        self.grants
            .write()
            .unwrap()
            .insert((actor, institution, module, capability));
    }

    /// Withdraw a grant.
    pub fn revoke(
        &self,
        actor: ActorId,
        institution: InstitutionId,
        module: &'static str,
        capability: Capability,
    ) {
        self.grants
            .write()
            .unwrap()
            .remove(&(actor, institution, module, capability));
    }

    /// Capability checks performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PermissionChecker for StaticPermissions {
    fn has_capability(
        &self,
        user_id: ActorId,
        institution_id: InstitutionId,
        module: &'static str,
        action: Capability,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let allowed = self
            .grants
            .read()
            .unwrap()
            .contains(&(user_id, institution_id, module, action));
        Box::pin(async move { Ok(allowed) })
    }
}

/// Rosters per institution plus a global profile store.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    rosters: RwLock<HashMap<InstitutionId, NameMap>>,
    profiles: RwLock<NameMap>,
    fail_roster: AtomicBool,
    fail_profiles: AtomicBool,
    roster_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a current member of an institution.
    pub fn add_member(&self, institution: InstitutionId, actor: ActorId, full_name: &str) {
        self.rosters
            .write()
            .unwrap()
            .entry(institution)
            .or_default()
            .insert(actor, full_name.to_string());
    }

    /// Remove a member from an institution's roster, keeping their profile.
    pub fn remove_member(&self, institution: InstitutionId, actor: ActorId) {
        if let Some(roster) = self.rosters.write().unwrap().get_mut(&institution) {
            roster.remove(&actor);
        }
    }

    /// Add a global profile.
    pub fn add_profile(&self, actor: ActorId, full_name: &str) {
        self.profiles
            .write()
            .unwrap()
            .insert(actor, full_name.to_string());
    }

    /// Make roster lookups fail.
    pub fn set_fail_roster(&self, fail: bool) {
        self.fail_roster.store(fail, Ordering::SeqCst);
    }

    /// Make profile lookups fail.
    pub fn set_fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    /// Roster lookups performed so far.
    #[must_use]
    pub fn roster_calls(&self) -> usize {
        self.roster_calls.load(Ordering::SeqCst)
    }

    /// Profile lookups performed so far.
    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    /// Total backing calls.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.roster_calls() + self.profile_calls()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn roster_names(
        &self,
        institution_id: InstitutionId,
        actor_ids: Vec<ActorId>,
    ) -> Pin<Box<dyn Future<Output = Result<NameMap>> + Send + '_>> {
        self.roster_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_roster.load(Ordering::SeqCst) {
            Err(LedgerError::store("roster unavailable"))
        } else {
            let rosters = self.rosters.read().unwrap();
            Ok(rosters
                .get(&institution_id)
                .map(|roster| pick(roster, &actor_ids))
                .unwrap_or_default())
        };
        Box::pin(async move { result })
    }

    fn profile_names(
        &self,
        actor_ids: Vec<ActorId>,
    ) -> Pin<Box<dyn Future<Output = Result<NameMap>> + Send + '_>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_profiles.load(Ordering::SeqCst) {
            Err(LedgerError::store("profiles unavailable"))
        } else {
            Ok(pick(&self.profiles.read().unwrap(), &actor_ids))
        };
        Box::pin(async move { result })
    }
}

fn pick(source: &NameMap, ids: &[ActorId]) -> NameMap {
    ids.iter()
        .filter_map(|id| source.get(id).map(|name| (*id, name.clone())))
        .collect()
}

/// Constituent names and category labels.
#[derive(Debug, Default)]
pub struct InMemoryRelated {
    constituents: RwLock<HashMap<ConstituentId, String>>,
    categories: RwLock<HashMap<CategoryId, String>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryRelated {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constituent.
    pub fn add_constituent(&self, id: ConstituentId, name: &str) {
        self.constituents
            .write()
            .unwrap()
            .insert(id, name.to_string());
    }

    /// Register a category.
    pub fn add_category(&self, id: CategoryId, label: &str) {
        self.categories
            .write()
            .unwrap()
            .insert(id, label.to_string());
    }

    /// Make every lookup fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Lookups performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup<K, V>(&self, source: &RwLock<HashMap<K, V>>, ids: &[K]) -> Result<HashMap<K, V>>
    where
        K: Copy + Eq + std::hash::Hash,
        V: Clone,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(LedgerError::store("related records unavailable"));
        }
        let source = source.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| source.get(id).map(|value| (*id, value.clone())))
            .collect())
    }
}

impl RelatedDirectory for InMemoryRelated {
    fn constituent_names(
        &self,
        ids: Vec<ConstituentId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<ConstituentId, String>>> + Send + '_>> {
        let result = self.lookup(&self.constituents, &ids);
        Box::pin(async move { result })
    }

    fn category_labels(
        &self,
        ids: Vec<CategoryId>,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<CategoryId, String>>> + Send + '_>> {
        let result = self.lookup(&self.categories, &ids);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_are_exact() {
        let permissions = StaticPermissions::new();
        let actor = ActorId::new();
        let institution = InstitutionId::new();
        permissions.grant(actor, institution, "demands", Capability::Write);

        assert!(permissions
            .has_capability(actor, institution, "demands", Capability::Write)
            .await
            .unwrap());
        assert!(!permissions
            .has_capability(actor, institution, "indications", Capability::Write)
            .await
            .unwrap());
        assert!(!permissions
            .has_capability(actor, InstitutionId::new(), "demands", Capability::Write)
            .await
            .unwrap());

        permissions.revoke(actor, institution, "demands", Capability::Write);
        assert!(!permissions
            .has_capability(actor, institution, "demands", Capability::Write)
            .await
            .unwrap());
        assert_eq!(permissions.calls(), 4);
    }

    #[tokio::test]
    async fn roster_is_scoped_to_institution() {
        let directory = InMemoryDirectory::new();
        let actor = ActorId::new();
        let institution = InstitutionId::new();
        directory.add_member(institution, actor, "Bruna Castro");

        let own = directory.roster_names(institution, vec![actor]).await.unwrap();
        let other = directory
            .roster_names(InstitutionId::new(), vec![actor])
            .await
            .unwrap();

        assert_eq!(own.get(&actor).map(String::as_str), Some("Bruna Castro"));
        assert!(other.is_empty());
        assert_eq!(directory.roster_calls(), 2);
    }
}
