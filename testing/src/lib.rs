//! # Status Ledger Testing
//!
//! Testing utilities and helpers for the status ledger.
//!
//! This crate provides:
//! - In-memory implementations of every collaborator trait
//! - Deterministic clocks
//! - A harness wiring a [`LedgerService`] to in-memory collaborators
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use status_ledger_core::family::{Demand, DemandDetails};
//! use status_ledger_core::item::NewItem;
//! use status_ledger_testing::LedgerHarness;
//!
//! # async fn example() -> status_ledger_core::error::Result<()> {
//! let harness = LedgerHarness::<Demand>::new();
//! let item = harness
//!     .service
//!     .create_item(&harness.actor, NewItem::titled("Broken streetlight"))
//!     .await?;
//! harness
//!     .service
//!     .advance_status(&harness.actor, item.id, "resolved", None, DemandDetails::default())
//!     .await?;
//! assert_eq!(harness.store.cached_status(item.id), Some("resolved".into()));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use status_ledger_core::config::LedgerConfig;
use status_ledger_core::environment::{Actor, Capability, Clock};
use status_ledger_core::family::ItemFamily;
use status_ledger_core::ids::{ActorId, InstitutionId};
use status_ledger_core::service::{LedgerEnvironment, LedgerService};
use std::sync::Arc;

pub mod directory_mocks;
pub mod ledger_mocks;

/// Deterministic clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use status_ledger_testing::mocks::FixedClock;
    /// use status_ledger_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock advancing by a fixed step on every reading.
    ///
    /// Gives each created item and appended event a distinct timestamp.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: chrono::Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing by `step` after each reading.
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }

        /// Start at the [`test_clock`] time, one second per reading.
        #[must_use]
        pub fn seconds() -> Self {
            Self::new(test_clock().now(), chrono::Duration::seconds(1))
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)] // Panics: only on a poisoned lock
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap();
            let now = *next;
            *next = now + self.step;
            now
        }
    }
}

/// Property-based testing strategies for ledger inputs.
pub mod properties {
    use proptest::prelude::*;
    use status_ledger_core::family::{DemandDetails, IndicationDetails};

    /// One caller operation against an item.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum LedgerOp<D> {
        /// Status change with optional notes and metadata.
        Advance {
            /// Target status.
            status: &'static str,
            /// Notes.
            notes: Option<String>,
            /// Metadata.
            details: D,
        },
        /// Annotation.
        Observe(String),
    }

    /// Indication statuses, the reserved label excluded.
    pub fn indication_status() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("created"),
            Just("formalized"),
            Just("filed"),
            Just("pending"),
            Just("fulfilled"),
        ]
    }

    /// Demand statuses, the reserved label excluded.
    pub fn demand_status() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("pending"),
            Just("in_progress"),
            Just("resolved"),
            Just("cancelled"),
        ]
    }

    /// Free text; sometimes blank.
    pub fn notes() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), Just("  ".to_string()), "[a-z ]{1,24}"]
    }

    /// Indication metadata with sparse, sometimes blank fields.
    pub fn indication_details() -> impl Strategy<Value = IndicationDetails> {
        let number = proptest::option::weighted(
            0.3,
            prop_oneof![Just(" ".to_string()), "[0-9]{4}/[0-9]{3}"],
        );
        let document = proptest::option::weighted(0.2, "[a-z]{1,8}");
        (number, document).prop_map(|(protocol_number, document)| IndicationDetails {
            protocol_number,
            protocol_document_url: document.map(|d| format!("https://docs.example/{d}.pdf")),
        })
    }

    /// Indication operations: status changes with metadata and observations.
    pub fn indication_ops(max: usize) -> impl Strategy<Value = Vec<LedgerOp<IndicationDetails>>> {
        let advance = (
            indication_status(),
            proptest::option::of(notes()),
            indication_details(),
        )
            .prop_map(|(status, notes, details)| LedgerOp::Advance {
                status,
                notes,
                details,
            });
        let observe = "[a-z]{1,16}".prop_map(LedgerOp::Observe);
        prop::collection::vec(prop_oneof![3 => advance, 1 => observe], 0..max)
    }

    /// Demand operations; notes are always present so every change is valid.
    pub fn demand_ops(max: usize) -> impl Strategy<Value = Vec<LedgerOp<DemandDetails>>> {
        let advance = (demand_status(), "[a-z]{1,16}").prop_map(|(status, notes)| {
            LedgerOp::Advance {
                status,
                notes: Some(notes),
                details: DemandDetails::default(),
            }
        });
        let observe = "[a-z]{1,16}".prop_map(LedgerOp::Observe);
        prop::collection::vec(prop_oneof![3 => advance, 1 => observe], 0..max)
    }
}

/// Install a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test;
/// only the first call installs.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Run a future to completion on a fresh current-thread runtime.
///
/// For driving async services from synchronous `proptest!` bodies.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
#[allow(clippy::expect_used)]
pub fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
        .block_on(future)
}

/// A [`LedgerService`] wired to in-memory collaborators.
///
/// `actor` holds `read` and `write` on the family's module in `institution`
/// and is on its roster.
pub struct LedgerHarness<F: ItemFamily> {
    /// The service under test.
    pub service: LedgerService<F>,
    /// Items and ledgers.
    pub store: Arc<InMemoryLedgerStore<F>>,
    /// Capability grants.
    pub permissions: Arc<StaticPermissions>,
    /// Actor names.
    pub directory: Arc<InMemoryDirectory>,
    /// Constituent and category labels.
    pub related: Arc<InMemoryRelated>,
    /// A fully authorized staff member.
    pub actor: Actor,
    /// The actor's institution.
    pub institution: InstitutionId,
}

impl<F: ItemFamily> LedgerHarness<F> {
    /// Harness with default configuration and a one-second stepping clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&LedgerConfig::default())
    }

    /// Harness with explicit configuration.
    #[must_use]
    pub fn with_config(config: &LedgerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(mocks::SteppingClock::seconds());
        let store = Arc::new(InMemoryLedgerStore::with_clock(Arc::clone(&clock)));
        let permissions = Arc::new(StaticPermissions::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let related = Arc::new(InMemoryRelated::new());

        let institution = InstitutionId::new();
        let actor = Actor::new(ActorId::new(), institution);

        let service = LedgerService::new(
            LedgerEnvironment {
                ledger: store.clone(),
                items: store.clone(),
                permissions: permissions.clone(),
                directory: directory.clone(),
                related: related.clone(),
                clock,
            },
            config,
        );

        let harness = Self {
            service,
            store,
            permissions,
            directory,
            related,
            actor,
            institution,
        };
        harness.staff_member("Test Actor");
        harness.grant(actor.user_id, Capability::Read);
        harness.grant(actor.user_id, Capability::Write);
        harness
    }

    /// Grant `capability` on the family module in the harness institution.
    pub fn grant(&self, user_id: ActorId, capability: Capability) {
        self.permissions
            .grant(user_id, self.institution, F::KIND.module(), capability);
    }

    /// A new actor on the institution's roster, with no capabilities yet.
    #[must_use]
    pub fn staff(&self, full_name: &str) -> Actor {
        let actor = Actor::new(ActorId::new(), self.institution);
        self.directory
            .add_member(self.institution, actor.user_id, full_name);
        actor
    }

    /// A new actor on the roster holding `read` and `write`.
    #[must_use]
    pub fn writer(&self, full_name: &str) -> Actor {
        let actor = self.staff(full_name);
        self.grant(actor.user_id, Capability::Read);
        self.grant(actor.user_id, Capability::Write);
        actor
    }

    fn staff_member(&self, full_name: &str) {
        self.directory
            .add_member(self.institution, self.actor.user_id, full_name);
    }
}

impl<F: ItemFamily> Default for LedgerHarness<F> {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export commonly used items
pub use directory_mocks::{InMemoryDirectory, InMemoryRelated, StaticPermissions};
pub use ledger_mocks::InMemoryLedgerStore;
pub use mocks::{FixedClock, SteppingClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use status_ledger_core::family::Demand;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn stepping_clock_advances() {
        let clock = SteppingClock::seconds();
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, chrono::Duration::seconds(1));
    }

    #[test]
    fn harness_actor_is_authorized_and_named() {
        let harness = LedgerHarness::<Demand>::new();
        assert_eq!(harness.actor.institution_id, harness.institution);
        assert_eq!(harness.store.item_count(), 0);
    }
}
