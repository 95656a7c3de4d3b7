//! Room list source and result store, backed by Postgres.
//!
//! - [`RoomSource`]: reads every room id from the configured view, once
//! - [`ResultStore`]: upserts success rows and failure flags by `id`
//! - [`PgRoomStore`]: `sqlx` implementation of both
//!
//! Upserts go through `jsonb_populate_record` so that arbitrary scraped fields
//! land in same-named columns with the table's own column types. Only the
//! columns present in the payload are written; a failure flag therefore leaves
//! previously scraped columns untouched.

use crate::error::SweepError;
use crate::models::{RoomId, RoomRecord, ScrapeResult};
use crate::utils::{quote_ident, quote_relation};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Supplies the full list of rooms for a run.
pub trait RoomSource {
    async fn list_rooms(&self) -> Result<Vec<RoomId>, SweepError>;
}

/// Persists the outcome of each room. Both writes are upserts keyed by `id`.
pub trait ResultStore {
    async fn upsert_success(
        &self,
        room_id: &RoomId,
        result: &ScrapeResult,
    ) -> Result<(), SweepError>;

    async fn upsert_failure(&self, room_id: &RoomId) -> Result<(), SweepError>;
}

/// Connection settings for [`PgRoomStore::connect`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub password: Option<String>,
    pub max_connections: u32,
    pub rooms_view: String,
    pub rooms_table: String,
}

#[derive(Debug, Clone)]
pub struct PgRoomStore {
    pool: PgPool,
    list_sql: String,
    table: String,
}

impl PgRoomStore {
    /// Open a pool and prepare the statements for the configured relations.
    #[instrument(level = "info", skip_all, fields(view = %config.rooms_view, table = %config.rooms_table))]
    pub async fn connect(config: &StoreConfig) -> Result<Self, SweepError> {
        let mut options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| SweepError::Setup(format!("invalid database URL: {e}")))?;
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| SweepError::Setup(format!("connecting to database: {e}")))?;
        info!(max_connections = config.max_connections, "Database pool ready");

        Self::from_pool(pool, &config.rooms_view, &config.rooms_table)
    }

    pub fn from_pool(pool: PgPool, rooms_view: &str, rooms_table: &str) -> Result<Self, SweepError> {
        let view = quote_relation(rooms_view)
            .ok_or_else(|| SweepError::Setup(format!("invalid view name: {rooms_view:?}")))?;
        let table = quote_relation(rooms_table)
            .ok_or_else(|| SweepError::Setup(format!("invalid table name: {rooms_table:?}")))?;
        Ok(Self {
            pool,
            list_sql: list_rooms_sql(&view),
            table,
        })
    }

    #[instrument(level = "debug", skip_all, fields(room_id = %record.id(), failed = record.failed()))]
    async fn upsert(&self, record: &RoomRecord) -> Result<(), SweepError> {
        let payload = record.to_payload();
        let columns: Vec<&str> = payload.keys().map(String::as_str).collect();
        let sql = upsert_sql(&self.table, &columns);

        let result = sqlx::query(&sql)
            .bind(Json(&payload))
            .execute(&self.pool)
            .await
            .map_err(|e| SweepError::StoreUpsert {
                room_id: record.id().to_string(),
                message: e.to_string(),
            })?;
        debug!(rows = result.rows_affected(), "Upserted room record");
        Ok(())
    }
}

impl RoomSource for PgRoomStore {
    #[instrument(level = "info", skip_all)]
    async fn list_rooms(&self) -> Result<Vec<RoomId>, SweepError> {
        let rows: Vec<Option<String>> = sqlx::query_scalar(&self.list_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SweepError::FetchList(e.to_string()))?;
        Ok(collect_room_ids(rows))
    }
}

impl ResultStore for PgRoomStore {
    async fn upsert_success(
        &self,
        room_id: &RoomId,
        result: &ScrapeResult,
    ) -> Result<(), SweepError> {
        self.upsert(&RoomRecord::Success {
            id: room_id.clone(),
            fields: result.clone(),
        })
        .await
    }

    async fn upsert_failure(&self, room_id: &RoomId) -> Result<(), SweepError> {
        self.upsert(&RoomRecord::Failure {
            id: room_id.clone(),
        })
        .await
    }
}

fn list_rooms_sql(view: &str) -> String {
    format!("SELECT room::text AS room FROM {view}")
}

/// `INSERT ... ON CONFLICT (id) DO UPDATE` over exactly `columns`.
///
/// The single bind parameter is the payload as `jsonb`.
fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let column_list = quoted.join(", ");

    let mut updates: Vec<String> = quoted
        .iter()
        .filter(|c| c.as_str() != "\"id\"")
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    if updates.is_empty() {
        updates.push("\"id\" = EXCLUDED.\"id\"".to_string());
    }

    format!(
        "INSERT INTO {table} ({column_list}) \
         SELECT {column_list} FROM jsonb_populate_record(NULL::{table}, $1) \
         ON CONFLICT (\"id\") DO UPDATE SET {}",
        updates.join(", ")
    )
}

/// Drop NULL rows from the view, keeping order.
fn collect_room_ids(rows: Vec<Option<String>>) -> Vec<RoomId> {
    let total = rows.len();
    let ids: Vec<RoomId> = rows.into_iter().flatten().map(RoomId::new).collect();
    if ids.len() < total {
        warn!(skipped = total - ids.len(), "Ignoring rooms with a NULL id");
    }
    ids
}
