//! PostgreSQL sink: watermark table plus per-dataset data tables.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool, Postgres};
use tracing::{debug, info, instrument, warn};

use hydro_common::{Calendar, DatasetDescriptor, RowBatch, TargetRelation, Watermark};

use crate::error::{StorageError, StorageResult};
use crate::sink::{RowSink, SinkConnector, WatermarkStore};
use crate::sql;

/// Connection settings for [`PgSink`].
#[derive(Debug, Clone)]
pub struct PgSinkOptions {
    pub database_url: String,
    /// Schema holding the state table and every data table.
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PgSinkOptions {
    pub fn new(database_url: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            schema: schema.into(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Pooled PostgreSQL connector.
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
    schema: String,
    calendar: Calendar,
}

impl PgSink {
    /// Connect to the database. Any failure here means the sink is unavailable.
    pub async fn connect(options: &PgSinkOptions) -> StorageResult<Self> {
        sql::check_identifier(&options.schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(&options.database_url)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Connection failed: {}", e)))?;

        info!(schema = %options.schema, "Connected to PostgreSQL");

        Ok(Self {
            pool,
            schema: options.schema.clone(),
            calendar: Calendar::cnes(),
        })
    }

    /// Use a non-default calendar for the `*_calendar` state columns.
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema, the state table and one data table per dataset.
    ///
    /// Existing tables are left untouched.
    #[instrument(skip(self, datasets), fields(schema = %self.schema))]
    pub async fn ensure_schema(&self, datasets: &[DatasetDescriptor]) -> StorageResult<()> {
        let mut statements = vec![
            sql::create_schema(&self.schema),
            sql::create_state_table(&self.schema),
        ];
        for dataset in datasets {
            let columns: Vec<&str> = dataset.columns().collect();
            statements.push(sql::create_data_table(&dataset.target, &columns));
        }

        for statement in statements {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Database(format!("Schema creation failed: {}", e)))?;
        }

        info!(datasets = datasets.len(), "Schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SinkConnector for PgSink {
    type Session = PgSession;

    async fn session(&self) -> StorageResult<PgSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StorageError::Unavailable(format!("Acquire failed: {}", e)))?;

        Ok(PgSession {
            conn,
            schema: self.schema.clone(),
            calendar: self.calendar,
        })
    }
}

/// One pooled connection, returned to the pool on drop.
#[derive(Debug)]
pub struct PgSession {
    conn: PoolConnection<Postgres>,
    schema: String,
    calendar: Calendar,
}

#[async_trait]
impl WatermarkStore for PgSession {
    async fn read(&mut self, dataset: &str) -> StorageResult<Option<Watermark>> {
        let row: Option<(Option<f64>, Option<f64>)> =
            sqlx::query_as(&sql::read_state(&self.schema))
                .bind(dataset)
                .fetch_optional(&mut *self.conn)
                .await
                .map_err(|e| db_error("State read failed", e))?;

        Ok(row.map(|(seen, without_errors)| {
            Watermark::new(seen.unwrap_or(0.0), without_errors.unwrap_or(0.0))
        }))
    }

    async fn write(
        &mut self,
        dataset: &str,
        watermark: &Watermark,
        error_count: u32,
    ) -> StorageResult<()> {
        let seen_calendar = self
            .calendar
            .to_calendar(watermark.last_update_time_seen)?
            .naive_utc();
        let without_errors_calendar = self
            .calendar
            .to_calendar(watermark.last_update_time_without_errors)?
            .naive_utc();
        let errors = i32::try_from(error_count).unwrap_or(i32::MAX);

        sqlx::query(&sql::write_state(&self.schema))
            .bind(dataset)
            .bind(watermark.last_update_time_seen)
            .bind(errors)
            .bind(watermark.last_update_time_without_errors)
            .bind(seen_calendar)
            .bind(without_errors_calendar)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| db_error("State write failed", e))?;

        debug!(dataset = %dataset, errors = error_count, "State written");
        Ok(())
    }
}

#[async_trait]
impl RowSink for PgSession {
    async fn publish(&mut self, batch: &RowBatch, target: &TargetRelation) -> StorageResult<()> {
        sql::check_identifier(&target.schema)?;
        sql::check_identifier(&target.table)?;
        for name in batch.column_names() {
            sql::check_identifier(name)?;
        }

        let columns: Vec<&str> = batch.column_names().collect();
        let statement = sql::upsert_rows(target, &columns);

        let mut tx = Connection::begin(&mut *self.conn)
            .await
            .map_err(|e| db_error("Begin failed", e))?;

        let mut query = sqlx::query(&statement)
            .bind(&batch.cell_ids)
            .bind(batch.observation_timestamp.naive_utc())
            .bind(batch.update_timestamp.naive_utc())
            .bind(batch.is_analysis);
        for column in &batch.columns {
            query = query.bind(&column.values);
        }

        let result = match query.execute(&mut *tx).await {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(target = %target, error = %rollback, "Rollback failed");
                }
                return Err(db_error(&format!("Upsert into {} failed", target), e));
            }
        };

        tx.commit()
            .await
            .map_err(|e| db_error("Commit failed", e))?;

        debug!(
            target = %target,
            rows = result.rows_affected(),
            observation = %batch.observation_timestamp,
            "Upserted batch"
        );
        Ok(())
    }
}

/// Lost connections and pool exhaustion mean the sink is unavailable; every
/// other failure is a database error.
fn db_error(context: &str, e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StorageError::Unavailable(format!("{}: {}", context, e)),
        other => StorageError::Database(format!("{}: {}", context, other)),
    }
}
