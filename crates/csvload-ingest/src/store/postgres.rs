//! PostgreSQL store implementation
//!
//! Pool-backed sessions implement the staging-side operations; [`PgTx`]
//! wraps one `sqlx` transaction for the transfer protocol. Bulk loads use
//! `COPY ... FROM STDIN` in text format, and the mapped staging-to-
//! destination copy is an `INSERT ... SELECT` so it stays inside the open
//! transaction. Table and column names are quoted before interpolation;
//! configuration validation additionally restricts table names to plain
//! identifiers.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolCopyExt, PgPoolOptions};
use sqlx::{Executor, PgPool, Postgres, Transaction};
use tracing::debug;

use csvload_common::{LoadError, Result};

use super::{quote_ident, BulkLoadOptions, ColumnMapping, StoreSession, StoreTransaction, TransferStore};
use crate::config::DatabaseConfig;
use crate::csv::batch::Row;

/// Pool-backed PostgreSQL store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool using the configured sizing and timeouts.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip to the server, returning its version string.
    pub async fn ping(&self) -> Result<String> {
        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }
}

#[async_trait]
impl StoreSession for PgStore {
    async fn row_count(&mut self, table: &str) -> Result<i64> {
        fetch_row_count(&self.pool, table).await
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        fetch_table_columns(&self.pool, table).await
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        execute_sql(&self.pool, &format!("TRUNCATE TABLE {}", quote_ident(table))).await?;
        Ok(())
    }

    async fn recreate_table(&mut self, table: &str, columns: &[String]) -> Result<()> {
        execute_sql(
            &self.pool,
            &format!("DROP TABLE IF EXISTS {}", quote_ident(table)),
        )
        .await?;
        execute_sql(&self.pool, &create_text_table_sql(table, columns)).await?;
        debug!(table, columns = columns.len(), "Recreated staging table");
        Ok(())
    }

    async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
        options: &BulkLoadOptions,
    ) -> Result<u64> {
        let statement = copy_in_sql(table, columns);
        let payload = encode_copy_payload(&rows);
        with_timeout(options.timeout, async {
            let mut sink = self.pool.copy_in_raw(&statement).await?;
            sink.send(payload.as_bytes()).await?;
            let loaded = sink.finish().await?;
            Ok(loaded)
        })
        .await
    }

    async fn copy_mapped(
        &mut self,
        source: &str,
        destination: &str,
        mapping: &ColumnMapping,
        options: &BulkLoadOptions,
    ) -> Result<u64> {
        let sql = mapped_insert_sql(source, destination, mapping);
        with_timeout(options.timeout, async {
            execute_sql(&self.pool, &sql).await
        })
        .await
    }
}

#[async_trait]
impl TransferStore for PgStore {
    type Tx = PgTx;

    async fn begin(&mut self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

/// One open PostgreSQL transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreSession for PgTx {
    async fn row_count(&mut self, table: &str) -> Result<i64> {
        fetch_row_count(&mut *self.tx, table).await
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        fetch_table_columns(&mut *self.tx, table).await
    }

    async fn truncate(&mut self, table: &str) -> Result<()> {
        execute_sql(&mut *self.tx, &format!("TRUNCATE TABLE {}", quote_ident(table))).await?;
        Ok(())
    }

    async fn recreate_table(&mut self, table: &str, columns: &[String]) -> Result<()> {
        execute_sql(
            &mut *self.tx,
            &format!("DROP TABLE IF EXISTS {}", quote_ident(table)),
        )
        .await?;
        execute_sql(&mut *self.tx, &create_text_table_sql(table, columns)).await?;
        Ok(())
    }

    async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
        options: &BulkLoadOptions,
    ) -> Result<u64> {
        let statement = copy_in_sql(table, columns);
        let payload = encode_copy_payload(&rows);
        with_timeout(options.timeout, async {
            let mut sink = self.tx.copy_in_raw(&statement).await?;
            sink.send(payload.as_bytes()).await?;
            let loaded = sink.finish().await?;
            Ok(loaded)
        })
        .await
    }

    async fn copy_mapped(
        &mut self,
        source: &str,
        destination: &str,
        mapping: &ColumnMapping,
        options: &BulkLoadOptions,
    ) -> Result<u64> {
        let sql = mapped_insert_sql(source, destination, mapping);
        with_timeout(options.timeout, async {
            execute_sql(&mut *self.tx, &sql).await
        })
        .await
    }
}

#[async_trait]
impl StoreTransaction for PgTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| LoadError::Timeout(limit.as_secs_f64()))?,
        None => operation.await,
    }
}

async fn execute_sql<'e, E>(executor: E, sql: &str) -> Result<u64>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(sql).execute(executor).await?;
    Ok(result.rows_affected())
}

async fn fetch_row_count<'e, E>(executor: E, table: &str) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(executor).await?;
    Ok(count)
}

async fn fetch_table_columns<'e, E>(executor: E, table: &str) -> Result<Vec<String>>
where
    E: Executor<'e, Database = Postgres>,
{
    let columns: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(executor)
    .await?;
    Ok(columns)
}

fn create_text_table_sql(table: &str, columns: &[String]) -> String {
    let column_defs = columns
        .iter()
        .map(|column| format!("{} TEXT", quote_ident(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table), column_defs)
}

fn copy_in_sql(table: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "COPY {} ({}) FROM STDIN",
        quote_ident(table),
        column_list
    )
}

fn mapped_insert_sql(source: &str, destination: &str, mapping: &ColumnMapping) -> String {
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        quote_ident(destination),
        mapping.destination_sql_list(),
        mapping.staging_sql_list(),
        quote_ident(source)
    )
}

/// Encode rows in the COPY text format: tab-separated fields, `\N` for
/// NULL, control characters escaped.
fn encode_copy_payload(rows: &[Row]) -> String {
    let mut payload = String::new();
    for row in rows {
        let mut first = true;
        for field in row {
            if !first {
                payload.push('\t');
            }
            first = false;
            match field {
                None => payload.push_str("\\N"),
                Some(value) => {
                    for c in value.chars() {
                        match c {
                            '\\' => payload.push_str("\\\\"),
                            '\t' => payload.push_str("\\t"),
                            '\n' => payload.push_str("\\n"),
                            '\r' => payload.push_str("\\r"),
                            other => payload.push(other),
                        }
                    }
                },
            }
        }
        payload.push('\n');
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_text_table_sql() {
        let sql = create_text_table_sql("stage", &names(&["id", "name"]));
        assert_eq!(sql, r#"CREATE TABLE "stage" ("id" TEXT, "name" TEXT)"#);
    }

    #[test]
    fn test_copy_in_sql() {
        let sql = copy_in_sql("stage", &names(&["id", "amount"]));
        assert_eq!(sql, r#"COPY "stage" ("id", "amount") FROM STDIN"#);
    }

    #[test]
    fn test_mapped_insert_sql() {
        let mapping = ColumnMapping::matching(&names(&["id", "name"]), &names(&["name", "id"]));
        let sql = mapped_insert_sql("stage", "dest", &mapping);
        assert_eq!(
            sql,
            r#"INSERT INTO "dest" ("id", "name") SELECT "id", "name" FROM "stage""#
        );
    }

    #[test]
    fn test_encode_copy_payload_nulls_and_escapes() {
        let rows = vec![
            vec![Some("1".to_string()), None],
            vec![Some("a\tb".to_string()), Some("c\\d".to_string())],
        ];
        let payload = encode_copy_payload(&rows);
        assert_eq!(payload, "1\t\\N\na\\tb\tc\\\\d\n");
    }

    #[test]
    fn test_encode_copy_payload_empty() {
        assert_eq!(encode_copy_payload(&[]), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses_on_stalled_operation() {
        let result: Result<u64> =
            with_timeout(Some(Duration::from_millis(50)), std::future::pending()).await;
        assert!(matches!(result, Err(LoadError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_unbounded_passes_through() {
        let result = with_timeout(None, async { Ok(7u64) }).await;
        assert!(matches!(result, Ok(7)));
    }
}
