//! Batched actor display-name resolution.
//!
//! Names come from two sources tried in order: the owning institution's
//! current roster, then the global profile store for whoever is left (former
//! staff, historical authors). Anyone still unknown is shown as
//! [`UNIDENTIFIED_USER`]. Resolution never fails; a failing source is logged
//! and treated as having returned nothing.
//!
//! At most two backing calls are made per batch, whatever its size.

use crate::environment::{IdentityDirectory, NameMap};
use crate::ids::{ActorId, InstitutionId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Display name used when no source knows an actor.
pub const UNIDENTIFIED_USER: &str = "Unidentified User";

/// Resolved display names for a batch of actors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identities {
    names: HashMap<ActorId, String>,
}

impl Identities {
    /// An empty set; every lookup yields the sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Display name for an actor, or [`UNIDENTIFIED_USER`].
    #[must_use]
    pub fn name_of(&self, actor_id: ActorId) -> &str {
        self.names
            .get(&actor_id)
            .map_or(UNIDENTIFIED_USER, String::as_str)
    }

    /// Whether a source resolved this actor.
    #[must_use]
    pub fn is_resolved(&self, actor_id: ActorId) -> bool {
        self.names.contains_key(&actor_id)
    }

    /// Number of resolved actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nobody was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(ActorId, String)> for Identities {
    fn from_iter<I: IntoIterator<Item = (ActorId, String)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .filter_map(|(id, name)| display_name(&name).map(|n| (id, n)))
                .collect(),
        }
    }
}

/// Shorten a full name to its first two words.
///
/// Returns `None` for blank names so they count as unresolved.
///
/// # Examples
///
/// ```
/// use status_ledger_core::identity::display_name;
///
/// assert_eq!(display_name("Maria  da Silva Santos").as_deref(), Some("Maria da"));
/// assert_eq!(display_name(" Ana ").as_deref(), Some("Ana"));
/// assert_eq!(display_name("   "), None);
/// ```
#[must_use]
pub fn display_name(full_name: &str) -> Option<String> {
    let words: Vec<&str> = full_name.split_whitespace().take(2).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Resolves actor ids to display names against an [`IdentityDirectory`].
#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn IdentityDirectory>,
}

impl IdentityResolver {
    /// Create a resolver over a directory.
    #[must_use]
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a batch of actors in the context of an institution.
    ///
    /// Duplicate ids are collapsed. An empty batch makes no backing call; the
    /// profile fallback is skipped when the roster resolves everyone.
    #[tracing::instrument(skip(self, actor_ids), fields(institution = %institution_id))]
    pub async fn resolve_batch(
        &self,
        actor_ids: impl IntoIterator<Item = ActorId>,
        institution_id: InstitutionId,
    ) -> Identities {
        let wanted: BTreeSet<ActorId> = actor_ids.into_iter().collect();
        if wanted.is_empty() {
            return Identities::empty();
        }

        let mut resolved = match self
            .directory
            .roster_names(institution_id, wanted.iter().copied().collect())
            .await
        {
            Ok(names) => keep_wanted(names, &wanted),
            Err(error) => {
                tracing::warn!(%error, "Roster lookup failed, falling back to profiles");
                Identities::empty()
            }
        };

        let remaining: Vec<ActorId> = wanted
            .iter()
            .copied()
            .filter(|id| !resolved.is_resolved(*id))
            .collect();
        if remaining.is_empty() {
            return resolved;
        }

        match self.directory.profile_names(remaining.clone()).await {
            Ok(names) => {
                let fallback = keep_wanted(names, &wanted);
                for id in &remaining {
                    if let Some(name) = fallback.names.get(id) {
                        resolved.names.insert(*id, name.clone());
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "Profile lookup failed, names left unidentified");
            }
        }

        let unresolved = wanted.len() - resolved.len();
        if unresolved > 0 {
            tracing::debug!(unresolved, "Actors left unidentified");
            metrics::counter!("status_ledger.identity.unresolved").increment(unresolved as u64);
        }

        resolved
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

fn keep_wanted(names: NameMap, wanted: &BTreeSet<ActorId>) -> Identities {
    names
        .into_iter()
        .filter(|(id, _)| wanted.contains(id))
        .collect()
}
