//! Zone-scoped record storage
//!
//! Records live in one table shared by all zones. Batch operations stop at
//! the first failing record and hand back what was done before it together
//! with the error; nothing is rolled back.


use crate::codec;
use crate::context::OpContext;
use crate::db::{ConnectionDescriptor, ConnectionManager};
use crate::error::{BatchError, BatchResult, Result, StoreError};
use crate::metrics::{result_label, STORE_OPERATIONS_TOTAL, STORE_OPERATION_DURATION, STORE_RECORDS_TOTAL};
use crate::types::Record;
use async_trait::async_trait;
use futures::TryStreamExt;
use prometheus::HistogramTimer;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;

const SELECT_ZONE: &str =
    "SELECT id, name, ttl_seconds, content, record_type FROM coredns_records WHERE zone = ? ORDER BY id";
const INSERT_RECORD: &str =
    "INSERT INTO coredns_records (zone, name, ttl_seconds, content, record_type) VALUES (?, ?, ?, ?, ?)";
const DELETE_RECORD: &str = "DELETE FROM coredns_records WHERE id = ?";

/// CRUD contract the plugin layer consumes.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// All records of `zone`.
    async fn list(&self, ctx: &OpContext, zone: &str) -> BatchResult;

    /// Inserts `records` in order and returns them with their assigned ids.
    async fn append(&self, ctx: &OpContext, zone: &str, records: &[Record]) -> BatchResult;

    /// Replaces records in place. Not supported by any backend yet.
    async fn set(&self, ctx: &OpContext, zone: &str, records: &[Record]) -> BatchResult;

    /// Deletes `records` by id.
    ///
    /// Records with an empty id are skipped without error, and on success the
    /// whole input is returned, so the result does not tell deleted records
    /// apart from skipped ones.
    async fn delete(&self, ctx: &OpContext, zone: &str, records: &[Record]) -> BatchResult;
}

/// [`RecordProvider`] over the `coredns_records` table.
pub struct ZoneStore {
    db: Arc<ConnectionManager>,
}

impl ZoneStore {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self::with_manager(Arc::new(ConnectionManager::new(descriptor)))
    }

    pub fn with_manager(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.db
    }

    async fn list_into(&self, ctx: &OpContext, zone: &str, out: &mut Vec<Record>) -> Result<()> {
        let pool = self.db.handle(ctx).await?;
        let mut rows = sqlx::query(SELECT_ZONE).bind(zone).fetch(pool);
        while let Some(row) = ctx.run(rows.try_next()).await? {
            out.push(record_from_row(&row)?);
        }
        Ok(())
    }

    async fn append_into(&self, ctx: &OpContext, zone: &str, records: &[Record], out: &mut Vec<Record>) -> Result<()> {
        let pool = self.db.handle(ctx).await?;
        let mut conn = ctx.run(pool.acquire()).await?;

        for record in records {
            let content = codec::encode(record)?;
            let ttl_seconds = i64::try_from(record.ttl.as_secs())
                .map_err(|_| StoreError::InvalidValue(format!("ttl out of range: {:?}", record.ttl)))?;

            let result = ctx
                .run(
                    sqlx::query(INSERT_RECORD)
                        .bind(zone)
                        .bind(record.name.as_str())
                        .bind(ttl_seconds)
                        .bind(content)
                        .bind(record.rtype.as_str())
                        .execute(&mut *conn),
                )
                .await?;
            let id = result.last_insert_id().ok_or(StoreError::MissingInsertId)?;

            tracing::debug!("     |-- [store] Inserted {} record '{}' into '{}' with id {}", record.rtype, record.name, zone, id);
            out.push(Record {
                id: id.to_string(),
                rtype: record.rtype.clone(),
                name: record.name.clone(),
                value: record.value.clone(),
                ttl: Duration::from_secs(record.ttl.as_secs()),
                priority: record.priority,
            });
        }
        Ok(())
    }

    async fn delete_into(&self, ctx: &OpContext, zone: &str, records: &[Record], out: &mut Vec<Record>) -> Result<()> {
        let pool = self.db.handle(ctx).await?;
        let mut conn = ctx.run(pool.acquire()).await?;

        for record in records {
            // TODO: delete by (name, type, value) once callers need to remove records they never listed
            if !record.id.is_empty() {
                let id: i64 = record.id.parse().map_err(|_| StoreError::InvalidId(record.id.clone()))?;
                let result = ctx.run(sqlx::query(DELETE_RECORD).bind(id).execute(&mut *conn)).await?;
                if result.rows_affected() == 0 {
                    tracing::debug!("     |-- [store] No row with id {} in '{}'", id, zone);
                }
            }
            out.push(record.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordProvider for ZoneStore {
    async fn list(&self, ctx: &OpContext, zone: &str) -> BatchResult {
        let timer = STORE_OPERATION_DURATION.with_label_values(&["list"]).start_timer();
        let mut out = Vec::new();
        let res = self.list_into(ctx, zone, &mut out).await;
        finish("list", zone, out, res, timer)
    }

    async fn append(&self, ctx: &OpContext, zone: &str, records: &[Record]) -> BatchResult {
        let timer = STORE_OPERATION_DURATION.with_label_values(&["append"]).start_timer();
        let mut out = Vec::with_capacity(records.len());
        let res = self.append_into(ctx, zone, records, &mut out).await;
        finish("append", zone, out, res, timer)
    }

    async fn set(&self, _ctx: &OpContext, zone: &str, _records: &[Record]) -> BatchResult {
        let timer = STORE_OPERATION_DURATION.with_label_values(&["set"]).start_timer();
        finish("set", zone, Vec::new(), Err(StoreError::NotImplemented("set records")), timer)
    }

    async fn delete(&self, ctx: &OpContext, zone: &str, records: &[Record]) -> BatchResult {
        let timer = STORE_OPERATION_DURATION.with_label_values(&["delete"]).start_timer();
        let mut out = Vec::with_capacity(records.len());
        let res = self.delete_into(ctx, zone, records, &mut out).await;
        finish("delete", zone, out, res, timer)
    }
}

fn record_from_row(row: &AnyRow) -> Result<Record> {
    let id: i64 = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let ttl_seconds: i64 = row.try_get("ttl_seconds")?;
    let content: String = row.try_get("content")?;
    let rtype: String = row.try_get("record_type")?;

    let value = codec::decode(&content, &rtype)?;
    let ttl = u64::try_from(ttl_seconds)
        .map(Duration::from_secs)
        .map_err(|_| StoreError::InvalidValue(format!("negative ttl {} on record {}", ttl_seconds, id)))?;

    Ok(Record { id: id.to_string(), rtype, name, value, ttl, priority: 0 })
}

fn finish(op: &'static str, zone: &str, out: Vec<Record>, res: Result<()>, timer: HistogramTimer) -> BatchResult {
    timer.observe_duration();
    STORE_RECORDS_TOTAL.with_label_values(&[op]).inc_by(out.len() as u64);
    STORE_OPERATIONS_TOTAL.with_label_values(&[op, result_label(res.as_ref().err())]).inc();

    match res {
        Ok(()) => {
            tracing::debug!("[store] {} on '{}' handled {} record(s)", op, zone, out.len());
            Ok(out)
        }
        Err(error) => {
            tracing::warn!("[store] {} on '{}' stopped after {} record(s): {}", op, zone, out.len(), error);
            Err(BatchError::new(out, error))
        }
    }
}
