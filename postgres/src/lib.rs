//! `PostgreSQL` storage for the status ledger.
//!
//! This crate provides a PostgreSQL-based implementation of the
//! `LedgerStore` and `ItemStore` traits from `status-ledger-core`. It uses
//! sqlx and supports:
//!
//! - Append-only ledgers with per-item sequences
//! - Per-family tables with JSONB event metadata
//! - Connection pooling configured from the environment
//! - Embedded migrations
//!
//! # Example
//!
//! ```no_run
//! use status_ledger_core::family::Indication;
//! use status_ledger_postgres::{PostgresConfig, PostgresLedgerStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::new("postgres://localhost/ledger").connect().await?;
//!     let store = PostgresLedgerStore::<Indication>::new(pool);
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod store;

pub use config::{ConfigError, PostgresConfig};
pub use store::PostgresLedgerStore;
