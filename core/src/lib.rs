//! # Status Ledger Core
//!
//! Append-only status ledgers for tracked items.
//!
//! Every lifecycle change of a demand or an indication is recorded as an
//! immutable event; the current status, the latched side-channel metadata
//! and the presentation timeline are all derived from those events.
//!
//! ## Core Concepts
//!
//! - **Item**: a demand or indication record ([`item::Item`])
//! - **Family**: the item kind, fixing the event payload type ([`family::ItemFamily`])
//! - **Ledger**: the ordered, append-only events of one item ([`event::StatusEvent`])
//! - **Observation**: an annotation event that never changes the status
//! - **Latching**: a metadata field keeps its last non-null value across later events
//! - **Derived state**: status, latched metadata and timeline replayed from the ledger ([`reconstruct`])
//!
//! ## Architecture Principles
//!
//! - The ledger is the source of truth; the item's status column is a cache
//! - Derivation is pure and replayable
//! - Permission and validation checks run before any write
//! - Collaborators are injected through traits ([`environment`], [`store`])
//!
//! ## Example
//!
//! ```
//! use status_ledger_core::event::StatusEvent;
//! use status_ledger_core::family::Demand;
//! use status_ledger_core::reconstruct::DerivedView;
//! use status_ledger_core::status::Status;
//!
//! let events: Vec<StatusEvent<Demand>> = Vec::new();
//! let view = DerivedView::derive(&Status::new("pending"), events);
//! assert_eq!(view.current_status, "pending");
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};

pub mod cache_sync;
pub mod config;
pub mod environment;
pub mod error;
pub mod event;
pub mod family;
pub mod identity;
pub mod ids;
pub mod item;
pub mod read_model;
pub mod reconstruct;
pub mod service;
pub mod status;
pub mod store;
pub mod validator;

pub use config::{FamilyConfig, LedgerConfig};
pub use environment::{Actor, Capability, Clock, SystemClock};
pub use error::{LedgerError, Result, ValidationError};
pub use event::{EventDraft, StatusEvent};
pub use family::{
    Demand, DemandDetails, EventDetails, Indication, IndicationDetails, ItemFamily, ItemKind,
};
pub use ids::{ActorId, CategoryId, ConstituentId, EventId, InstitutionId, ItemId, Sequence};
pub use item::{Item, ListFilter, NewItem};
pub use read_model::ReadModel;
pub use reconstruct::{DerivedView, HistoryEntry};
pub use service::{LedgerEnvironment, LedgerService};
pub use status::Status;
