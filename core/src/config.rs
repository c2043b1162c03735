//! Ledger configuration.
//!
//! Loads per-family policy from environment variables with sensible defaults.
//! Status lists are comma-separated labels; blank entries are ignored.

use crate::family::{ItemFamily, ItemKind};
use crate::status::Status;
use std::collections::BTreeSet;
use std::env;

/// Per-family policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyConfig {
    /// Statuses that may only be entered with non-blank notes.
    pub notes_required: BTreeSet<Status>,
    /// Statuses labelled terminal on the read side.
    pub terminal: BTreeSet<Status>,
    /// Append an initial event carrying the creation status when an item is created.
    pub record_creation_event: bool,
    /// Notes attached to the creation event.
    pub creation_notes: String,
}

impl FamilyConfig {
    /// Whether `status` requires notes.
    #[must_use]
    pub fn requires_notes(&self, status: &Status) -> bool {
        self.notes_required.contains(status)
    }

    /// Whether `status` is a terminal label.
    #[must_use]
    pub fn is_terminal(&self, status: &Status) -> bool {
        self.terminal.contains(status)
    }
}

/// Configuration for both item families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Demand policy.
    pub demand: FamilyConfig,
    /// Indication policy.
    pub indication: FamilyConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            demand: FamilyConfig {
                notes_required: statuses(&[Status::IN_PROGRESS]),
                terminal: statuses(&[Status::RESOLVED, Status::CANCELLED]),
                record_creation_event: false,
                creation_notes: "Demand created".to_string(),
            },
            indication: FamilyConfig {
                notes_required: BTreeSet::new(),
                terminal: statuses(&[Status::FULFILLED]),
                record_creation_event: true,
                creation_notes: "Indication created and saved".to_string(),
            },
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// | variable | default |
    /// |----------|---------|
    /// | `LEDGER_DEMAND_NOTES_REQUIRED` | `in_progress` |
    /// | `LEDGER_DEMAND_TERMINAL` | `resolved,cancelled` |
    /// | `LEDGER_DEMAND_CREATION_EVENT` | `false` |
    /// | `LEDGER_INDICATION_NOTES_REQUIRED` | (none) |
    /// | `LEDGER_INDICATION_TERMINAL` | `fulfilled` |
    /// | `LEDGER_INDICATION_CREATION_EVENT` | `true` |
    ///
    /// Unparseable booleans fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            demand: FamilyConfig {
                notes_required: env::var("LEDGER_DEMAND_NOTES_REQUIRED")
                    .map_or(defaults.demand.notes_required, |s| parse_statuses(&s)),
                terminal: env::var("LEDGER_DEMAND_TERMINAL")
                    .map_or(defaults.demand.terminal, |s| parse_statuses(&s)),
                record_creation_event: env::var("LEDGER_DEMAND_CREATION_EVENT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.demand.record_creation_event),
                creation_notes: defaults.demand.creation_notes,
            },
            indication: FamilyConfig {
                notes_required: env::var("LEDGER_INDICATION_NOTES_REQUIRED")
                    .map_or(defaults.indication.notes_required, |s| parse_statuses(&s)),
                terminal: env::var("LEDGER_INDICATION_TERMINAL")
                    .map_or(defaults.indication.terminal, |s| parse_statuses(&s)),
                record_creation_event: env::var("LEDGER_INDICATION_CREATION_EVENT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.indication.record_creation_event),
                creation_notes: defaults.indication.creation_notes,
            },
        }
    }

    /// Policy for a family.
    #[must_use]
    pub const fn family<F: ItemFamily>(&self) -> &FamilyConfig {
        match F::KIND {
            ItemKind::Demand => &self.demand,
            ItemKind::Indication => &self.indication,
        }
    }
}

/// Parse a comma-separated status list.
#[must_use]
pub fn parse_statuses(list: &str) -> BTreeSet<Status> {
    list.split(',')
        .map(Status::new)
        .filter(|status| !status.is_blank())
        .collect()
}

fn statuses(labels: &[&str]) -> BTreeSet<Status> {
    labels.iter().map(Status::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Demand, Indication};

    #[test]
    fn parses_lists_ignoring_blanks() {
        let parsed = parse_statuses(" in_progress, ,cancelled,");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&Status::new("in_progress")));
        assert!(parsed.contains(&Status::new("cancelled")));
    }

    #[test]
    fn empty_list_parses_to_empty_set() {
        assert!(parse_statuses("").is_empty());
    }

    #[test]
    fn defaults_per_family() {
        let config = LedgerConfig::default();
        assert!(config.family::<Demand>().requires_notes(&Status::new("in_progress")));
        assert!(!config.family::<Demand>().requires_notes(&Status::new("resolved")));
        assert!(config.family::<Demand>().is_terminal(&Status::new("cancelled")));
        assert!(config.family::<Indication>().record_creation_event);
        assert!(!config.family::<Demand>().record_creation_event);
    }
}
