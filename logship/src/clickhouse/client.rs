use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use clickhouse::Client;
use logship_config::shared::ClickHouseConnectionConfig;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::bail;
use crate::client::{ColumnSpec, InsertFormat, SinkClient};
use crate::clickhouse::encoding::{EncodedColumn, parse_wire_type, rb_encode_row};
use crate::clickhouse::metrics::LOGSHIP_CH_INSERT_DURATION_SECONDS;
use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::schema::sql::escape_identifier;
use crate::sink_error;

/// Capacity of the internal write buffer used per INSERT statement.
///
/// When this many bytes have been written the buffer is flushed to the network; the
/// statement itself is only closed by `end()`.
const BUFFERED_CAPACITY: usize = 256 * 1024;

/// Lets `JSON` columns be written as plain strings in binary input formats.
const JSON_AS_STRING_OPTION: &str = "input_format_binary_read_json_as_string";

/// [`SinkClient`] backed by the ClickHouse HTTP interface.
///
/// Cheaply cloneable; clones share the connection, the closed flag and the cache of
/// column types looked up for untyped columns.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Arc<Client>,
    closed: Arc<AtomicBool>,
    /// Escaped table name → column name → declared type.
    described_tables: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
}

impl ClickHouseClient {
    /// Creates a new [`ClickHouseClient`].
    ///
    /// When the URL starts with `https://`, TLS is handled by the `rustls-tls` feature using
    /// webpki root certificates.
    pub fn new(connection: &ClickHouseConnectionConfig) -> Self {
        let mut client = Client::default()
            .with_url(&connection.url)
            .with_user(&connection.user)
            .with_database(&connection.database)
            .with_option(JSON_AS_STRING_OPTION, "1");

        if let Some(password) = &connection.password {
            client = client.with_password(password.expose_secret());
        }

        Self {
            inner: Arc::new(client),
            closed: Arc::new(AtomicBool::new(false)),
            described_tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn ping(&self) -> SinkResult<()> {
        self.ensure_open()?;

        self.inner
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(|e| {
                sink_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "ClickHouse connectivity check failed",
                    e
                )
            })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> SinkResult<()> {
        if self.is_closed() {
            bail!(ErrorKind::InvalidState, "ClickHouse client is closed");
        }

        Ok(())
    }

    /// Resolves the wire type of every column, looking up the server-side type of columns
    /// declared without one.
    async fn resolve_columns(
        &self,
        table: &str,
        columns: &[ColumnSpec],
    ) -> SinkResult<Vec<EncodedColumn>> {
        let described = if columns.iter().any(|column| column.column_type.is_none()) {
            self.describe_table(table).await?
        } else {
            HashMap::new()
        };

        columns
            .iter()
            .map(|column| {
                let column_type = match &column.column_type {
                    Some(column_type) => column_type.as_str(),
                    None => described.get(&column.name).map(String::as_str).ok_or_else(|| {
                        sink_error!(
                            ErrorKind::UnsupportedValueInDestination,
                            "Column not found in destination table",
                            format!("column `{}` does not exist in {table}", column.name)
                        )
                    })?,
                };

                Ok(EncodedColumn {
                    name: column.name.clone(),
                    wire_type: parse_wire_type(column_type)?,
                })
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> SinkResult<HashMap<String, String>> {
        {
            let cache = self
                .described_tables
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(columns) = cache.get(table) {
                return Ok(columns.clone());
            }
        }

        let sql = format!("SELECT concat(name, '\\t', type) FROM (DESCRIBE TABLE {table})");
        let rows = self.inner.query(&sql).fetch_all::<String>().await?;

        let columns: HashMap<String, String> = rows
            .into_iter()
            .filter_map(|row| {
                row.split_once('\t')
                    .map(|(name, column_type)| (name.to_string(), column_type.to_string()))
            })
            .collect();
        debug!(%table, columns = columns.len(), "described destination table");

        let mut cache = self
            .described_tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache.insert(table.to_string(), columns.clone());

        Ok(columns)
    }
}

impl SinkClient for ClickHouseClient {
    async fn execute(&self, sql: &str) -> SinkResult<()> {
        self.ensure_open()?;

        self.inner.query(sql).execute().await?;

        Ok(())
    }

    async fn execute_scalar(&self, sql: &str) -> SinkResult<Option<ColumnValue>> {
        self.ensure_open()?;

        let value = self.inner.query(sql).fetch_optional::<u8>().await?;

        Ok(value.map(ColumnValue::UInt8))
    }

    /// Streams `rows` through a single `INSERT INTO table (columns) FORMAT ...` statement.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        rows: Vec<Vec<ColumnValue>>,
        format: InsertFormat,
    ) -> SinkResult<u64> {
        self.ensure_open()?;

        let encoded_columns = self.resolve_columns(table, columns).await?;
        let column_list = columns
            .iter()
            .map(|column| escape_identifier(&column.name))
            .collect::<SinkResult<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({column_list}) FORMAT {}",
            format.as_str()
        );

        let insert_start = Instant::now();
        let mut insert = self
            .inner
            .insert_formatted_with(sql)
            .buffered_with_capacity(BUFFERED_CAPACITY);
        let mut row_buf = Vec::new();
        let row_count = rows.len() as u64;

        for row in &rows {
            row_buf.clear();
            rb_encode_row(row, &encoded_columns, &mut row_buf)?;
            insert.write_buffered(&row_buf);
        }

        insert.end().await.map_err(|e| {
            sink_error!(
                ErrorKind::DestinationQueryFailed,
                "ClickHouse insert failed",
                format!("Failed to flush INSERT for {table}: {e}"),
                source: e
            )
        })?;
        metrics::histogram!(
            LOGSHIP_CH_INSERT_DURATION_SECONDS,
            "table" => table.to_string()
        )
        .record(insert_start.elapsed().as_secs_f64());

        Ok(row_count)
    }

    async fn close(&self) -> SinkResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("closed clickhouse client");
        }

        Ok(())
    }
}
