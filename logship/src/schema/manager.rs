use std::sync::Arc;
use std::time::Instant;

use logship_config::shared::TableCreationMode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::{SinkClient, run_cancellable};
use crate::clickhouse::metrics::LOGSHIP_CH_DDL_DURATION_SECONDS;
use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::schema::TableSchema;
use crate::schema::sql::{create_table_sql, drop_table_sql, exists_table_sql};
use crate::sink::TableCreationOptions;
use crate::sink_error;

/// Provisions the destination table according to a [`TableCreationMode`].
///
/// The manager keeps no state between calls; every call applies its mode from scratch.
#[derive(Debug)]
pub struct SchemaManager<C> {
    client: Arc<C>,
}

impl<C> SchemaManager<C>
where
    C: SinkClient,
{
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Ensures the table described by `schema` is ready for inserts.
    ///
    /// Client errors are logged and returned unchanged. In [`TableCreationMode::DropAndRecreate`]
    /// a failure after the drop leaves the table dropped.
    pub async fn ensure_table(
        &self,
        schema: &TableSchema,
        options: &TableCreationOptions,
        cancel: &CancellationToken,
    ) -> SinkResult<()> {
        let result = self.provision(schema, options, cancel).await;

        if let Err(err) = &result {
            error!(
                table = %schema.full_table_name(),
                mode = ?options.mode,
                error = %err,
                "failed to provision table"
            );
        }

        result
    }

    async fn provision(
        &self,
        schema: &TableSchema,
        options: &TableCreationOptions,
        cancel: &CancellationToken,
    ) -> SinkResult<()> {
        match options.mode {
            TableCreationMode::CreateIfNotExists => self.create_table(schema, cancel).await,
            TableCreationMode::DropAndRecreate => {
                self.drop_table(schema, cancel).await?;
                self.create_table(schema, cancel).await
            }
            TableCreationMode::None if options.validate_on_startup => {
                self.validate_table_exists(schema, cancel).await
            }
            TableCreationMode::None => {
                debug!(
                    table = %schema.full_table_name(),
                    "table creation disabled, skipping provisioning"
                );
                Ok(())
            }
        }
    }

    async fn create_table(&self, schema: &TableSchema, cancel: &CancellationToken) -> SinkResult<()> {
        let sql = create_table_sql(schema)?;
        let table = schema.full_table_name();

        let start = Instant::now();
        run_cancellable(cancel, "create table", self.client.execute(&sql)).await?;
        metrics::histogram!(LOGSHIP_CH_DDL_DURATION_SECONDS, "table" => table.clone())
            .record(start.elapsed().as_secs_f64());

        info!(%table, "ensured table exists");

        Ok(())
    }

    async fn drop_table(&self, schema: &TableSchema, cancel: &CancellationToken) -> SinkResult<()> {
        let sql = drop_table_sql(schema)?;

        run_cancellable(cancel, "drop table", self.client.execute(&sql)).await?;
        info!(table = %schema.full_table_name(), "dropped table for recreation");

        Ok(())
    }

    async fn validate_table_exists(
        &self,
        schema: &TableSchema,
        cancel: &CancellationToken,
    ) -> SinkResult<()> {
        let sql = exists_table_sql(schema)?;
        let table = schema.full_table_name();

        let answer = run_cancellable(cancel, "check table exists", self.client.execute_scalar(&sql))
            .await?;
        let exists = matches!(
            answer,
            Some(ColumnValue::UInt8(n)) if n != 0
        ) || matches!(answer, Some(ColumnValue::Bool(true)));

        if !exists {
            return Err(sink_error!(
                ErrorKind::DestinationTableMissing,
                "Destination table does not exist",
                format!(
                    "table `{table}` was not found. Create it manually or set the table creation mode to `create_if_not_exists`"
                )
            ));
        }

        debug!(%table, "validated table exists");

        Ok(())
    }
}
