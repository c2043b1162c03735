//! `PostgreSQL` implementation of the ledger and item stores.
//!
//! Each family has its own pair of tables (`demands`/`demand_events`,
//! `indications`/`indication_events`). Family metadata is stored as JSONB in
//! the `details` column. Sequences are allocated as `MAX(sequence) + 1`
//! inside the insert; a concurrent append that takes the same number hits
//! the `(item_id, sequence)` unique key and is retried.

use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use status_ledger_core::error::{LedgerError, Result};
use status_ledger_core::event::{EventDraft, StatusEvent};
use status_ledger_core::family::{ItemFamily, ItemKind};
use status_ledger_core::ids::{
    ActorId, CategoryId, ConstituentId, EventId, InstitutionId, ItemId, Sequence,
};
use status_ledger_core::item::{Item, NewItem};
use status_ledger_core::status::Status;
use status_ledger_core::store::{EventsByItem, ItemStore, LedgerStore};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use uuid::Uuid;

/// Attempts at allocating a sequence before giving up.
const MAX_SEQUENCE_ATTEMPTS: u32 = 16;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tables {
    items: &'static str,
    events: &'static str,
}

const fn tables(kind: ItemKind) -> Tables {
    match kind {
        ItemKind::Demand => Tables {
            items: "demands",
            events: "demand_events",
        },
        ItemKind::Indication => Tables {
            items: "indications",
            events: "indication_events",
        },
    }
}

/// PostgreSQL-backed storage for one item family.
///
/// Implements both [`LedgerStore`] and [`ItemStore`]; a service typically
/// holds one instance behind two `Arc<dyn ...>` handles.
///
/// # Example
///
/// ```no_run
/// use status_ledger_core::family::Demand;
/// use status_ledger_postgres::{PostgresConfig, PostgresLedgerStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PostgresConfig::from_env()?.connect().await?;
/// let store = PostgresLedgerStore::<Demand>::new(pool);
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
pub struct PostgresLedgerStore<F: ItemFamily> {
    pool: PgPool,
    tables: Tables,
    family: PhantomData<F>,
}

impl<F: ItemFamily> Clone for PostgresLedgerStore<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            tables: self.tables,
            family: PhantomData,
        }
    }
}

impl<F: ItemFamily> std::fmt::Debug for PostgresLedgerStore<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresLedgerStore")
            .field("items", &self.tables.items)
            .field("events", &self.tables.events)
            .finish_non_exhaustive()
    }
}

impl<F: ItemFamily> PostgresLedgerStore<F> {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tables: tables(F::KIND),
            family: PhantomData,
        }
    }

    /// Create the ledger tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransientStore`] if migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::store(format!("Migration failed: {e}")))
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn append_event(&self, draft: EventDraft<F>) -> Result<StatusEvent<F>> {
        let details = serde_json::to_value(&draft.details)
            .map_err(|e| LedgerError::store(format!("Failed to encode details: {e}")))?;
        let query = format!(
            "INSERT INTO {events} (id, item_id, sequence, status, actor_id, notes, details)
             SELECT $1, $2, COALESCE(MAX(sequence), 0) + 1, $3, $4, $5, $6
             FROM {events} WHERE item_id = $2
             RETURNING sequence, created_at",
            events = self.tables.events
        );

        let mut attempt = 1;
        loop {
            let id = EventId::new();
            let result = sqlx::query(&query)
                .bind(id.as_uuid())
                .bind(draft.item_id.as_uuid())
                .bind(draft.status.as_str())
                .bind(draft.actor_id.as_uuid())
                .bind(draft.notes.as_deref())
                .bind(&details)
                .fetch_one(&self.pool)
                .await;

            match result {
                Ok(row) => {
                    let sequence = sequence_from(row.try_get("sequence").map_err(LedgerError::store)?)?;
                    let created_at = row.try_get("created_at").map_err(LedgerError::store)?;
                    return Ok(StatusEvent::from_draft(draft, id, sequence, created_at));
                }
                Err(error) if violates(&error, FOREIGN_KEY_VIOLATION) => {
                    return Err(LedgerError::NotFound {
                        kind: F::KIND,
                        id: draft.item_id,
                    });
                }
                Err(error)
                    if violates(&error, UNIQUE_VIOLATION) && attempt < MAX_SEQUENCE_ATTEMPTS =>
                {
                    tracing::debug!(item = %draft.item_id, attempt, "Sequence taken, retrying append");
                    metrics::counter!("status_ledger.postgres.sequence_retry", "kind" => F::KIND.as_str())
                        .increment(1);
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(item = %draft.item_id, %error, "Failed to append event");
                    return Err(LedgerError::store(error));
                }
            }
        }
    }

    async fn events_for(&self, item_ids: &[Uuid]) -> Result<Vec<StatusEvent<F>>> {
        let query = format!(
            "SELECT id, item_id, sequence, status, actor_id, notes, details, created_at
             FROM {} WHERE item_id = ANY($1)
             ORDER BY item_id, sequence, created_at, id",
            self.tables.events
        );
        let rows = sqlx::query(&query)
            .bind(item_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::store)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn fetch_item(&self, item_id: ItemId) -> Result<Item<F>> {
        let query = format!(
            "SELECT id, institution_id, author_id, requester_id, category_id, title, description,
                    initial_status, current_status, created_at, deadline
             FROM {} WHERE id = $1",
            self.tables.items
        );
        let row = sqlx::query(&query)
            .bind(item_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::store)?;
        row.as_ref()
            .map(item_from_row)
            .transpose()?
            .ok_or(LedgerError::NotFound {
                kind: F::KIND,
                id: item_id,
            })
    }

    async fn list_items(&self, institution_id: InstitutionId) -> Result<Vec<Item<F>>> {
        let query = format!(
            "SELECT id, institution_id, author_id, requester_id, category_id, title, description,
                    initial_status, current_status, created_at, deadline
             FROM {} WHERE institution_id = $1
             ORDER BY created_at DESC, id DESC",
            self.tables.items
        );
        let rows = sqlx::query(&query)
            .bind(institution_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::store)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn insert_item(&self, item: Item<F>) -> Result<Item<F>> {
        let query = format!(
            "INSERT INTO {} (id, institution_id, author_id, requester_id, category_id, title,
                             description, initial_status, current_status, created_at, deadline)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            self.tables.items
        );
        sqlx::query(&query)
            .bind(item.id.as_uuid())
            .bind(item.institution_id.as_uuid())
            .bind(item.author_id.as_uuid())
            .bind(item.requester_id.map(|id| *id.as_uuid()))
            .bind(item.category_id.map(|id| *id.as_uuid()))
            .bind(&item.title)
            .bind(item.description.as_deref())
            .bind(item.initial_status.as_str())
            .bind(item.current_status.as_str())
            .bind(item.created_at)
            .bind(item.deadline)
            .execute(&self.pool)
            .await
            .map_err(LedgerError::store)?;
        Ok(item)
    }

    async fn write_status(&self, item_id: ItemId, status: Status) -> Result<()> {
        let query = format!(
            "UPDATE {} SET current_status = $2 WHERE id = $1",
            self.tables.items
        );
        let result = sqlx::query(&query)
            .bind(item_id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(LedgerError::store)?;

        if result.rows_affected() == 0 {
            Err(LedgerError::NotFound {
                kind: F::KIND,
                id: item_id,
            })
        } else {
            Ok(())
        }
    }
}

impl<F: ItemFamily> LedgerStore<F> for PostgresLedgerStore<F> {
    fn append(
        &self,
        draft: EventDraft<F>,
    ) -> Pin<Box<dyn Future<Output = Result<StatusEvent<F>>> + Send + '_>> {
        Box::pin(self.append_event(draft))
    }

    fn list_by_item(
        &self,
        item_id: ItemId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<StatusEvent<F>>>> + Send + '_>> {
        Box::pin(async move { self.events_for(&[*item_id.as_uuid()]).await })
    }

    fn list_by_items(
        &self,
        item_ids: Vec<ItemId>,
    ) -> Pin<Box<dyn Future<Output = Result<EventsByItem<F>>> + Send + '_>> {
        Box::pin(async move {
            if item_ids.is_empty() {
                return Ok(EventsByItem::new());
            }
            let ids: Vec<Uuid> = item_ids.iter().map(|id| *id.as_uuid()).collect();
            let mut grouped = EventsByItem::new();
            for event in self.events_for(&ids).await? {
                grouped.entry(event.item_id).or_default().push(event);
            }
            Ok(grouped)
        })
    }
}

impl<F: ItemFamily> ItemStore<F> for PostgresLedgerStore<F> {
    fn insert(&self, item: Item<F>) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>> {
        Box::pin(self.insert_item(item))
    }

    fn get(&self, item_id: ItemId) -> Pin<Box<dyn Future<Output = Result<Item<F>>> + Send + '_>> {
        Box::pin(self.fetch_item(item_id))
    }

    fn list(
        &self,
        institution_id: InstitutionId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item<F>>>> + Send + '_>> {
        Box::pin(self.list_items(institution_id))
    }

    fn update_status(
        &self,
        item_id: ItemId,
        status: Status,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.write_status(item_id, status))
    }
}

fn violates(error: &sqlx::Error, code: &str) -> bool {
    error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|c| c == code)
}

fn sequence_from(raw: i64) -> Result<Sequence> {
    u64::try_from(raw)
        .map(Sequence::new)
        .map_err(|_| LedgerError::store(format!("Negative sequence in ledger: {raw}")))
}

fn event_from_row<F: ItemFamily>(row: &PgRow) -> Result<StatusEvent<F>> {
    let details: Value = row.try_get("details").map_err(LedgerError::store)?;
    let details = serde_json::from_value(details)
        .map_err(|e| LedgerError::store(format!("Failed to decode details: {e}")))?;
    let notes: Option<String> = row.try_get("notes").map_err(LedgerError::store)?;

    Ok(StatusEvent {
        id: EventId::from_uuid(row.try_get("id").map_err(LedgerError::store)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(LedgerError::store)?),
        sequence: sequence_from(row.try_get("sequence").map_err(LedgerError::store)?)?,
        status: Status::new(row.try_get::<String, _>("status").map_err(LedgerError::store)?),
        actor_id: ActorId::from_uuid(row.try_get("actor_id").map_err(LedgerError::store)?),
        notes,
        created_at: row.try_get("created_at").map_err(LedgerError::store)?,
        details,
    })
}

fn item_from_row<F: ItemFamily>(row: &PgRow) -> Result<Item<F>> {
    let title: String = row.try_get("title").map_err(LedgerError::store)?;
    let mut new_item = NewItem::<F>::titled(title);
    new_item.description = row.try_get("description").map_err(LedgerError::store)?;
    new_item.requester_id = row
        .try_get::<Option<Uuid>, _>("requester_id")
        .map_err(LedgerError::store)?
        .map(ConstituentId::from_uuid);
    new_item.category_id = row
        .try_get::<Option<Uuid>, _>("category_id")
        .map_err(LedgerError::store)?
        .map(CategoryId::from_uuid);
    new_item.initial_status = Some(Status::new(
        row.try_get::<String, _>("initial_status")
            .map_err(LedgerError::store)?,
    ));
    new_item.deadline = row.try_get("deadline").map_err(LedgerError::store)?;

    let mut item = Item::from_new(
        new_item,
        ItemId::from_uuid(row.try_get("id").map_err(LedgerError::store)?),
        InstitutionId::from_uuid(row.try_get("institution_id").map_err(LedgerError::store)?),
        ActorId::from_uuid(row.try_get("author_id").map_err(LedgerError::store)?),
        row.try_get("created_at").map_err(LedgerError::store)?,
    );
    item.current_status = Status::new(
        row.try_get::<String, _>("current_status")
            .map_err(LedgerError::store)?,
    );
    Ok(item)
}
