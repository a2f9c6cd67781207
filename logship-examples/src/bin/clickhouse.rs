/*

ClickHouse Example

This example writes a handful of structured log events into a ClickHouse table.

The table is created on the first batch with the default column set:
  - `timestamp DateTime64(3)`
  - `level LowCardinality(String)`
  - `message String`, the rendered message
  - `message_template String`
  - `exception Nullable(String)`
  - `properties JSON`

Prerequisites:
1. A running ClickHouse instance accessible over HTTP(S)

Usage, with flags:
    cargo run -p logship-examples --bin clickhouse -- \
        --ch-url http://localhost:8123 \
        --ch-user default \
        --ch-database default \
        --table logship_demo

or with a `Key=Value` connection string:
    cargo run -p logship-examples --bin clickhouse -- \
        --connection-string "Host=localhost;Port=8123;Username=default;Database=default" \
        --table logship_demo

or from `configuration/base.yaml` (plus `configuration/{dev,prod}.yaml` and
`LOGSHIP_`-prefixed environment variables):
    cargo run -p logship-examples --bin clickhouse -- --from-config

*/

use std::error::Error;
use std::sync::{Arc, Once};
use std::time::Duration;

use clap::{Args, Parser};
use logship::clickhouse::ClickHouseClient;
use logship::event::{LogEvent, LogException, LogLevel};
use logship::sink::{BatchingSink, ClickHouseSink, ClickHouseSinkOptions};
use logship_config::load_config;
use logship_config::shared::{
    BatchConfig, ClickHouseConnectionConfig, SinkConfig, TableConfig, TableCreationConfig,
};
use logship_telemetry::tracing::init_tracing;
use secrecy::SecretString;
use tracing::{error, info};

/// Ensures crypto provider is only initialized once.
static INIT_CRYPTO: Once = Once::new();

/// Installs the default cryptographic provider for rustls.
fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("failed to install default crypto provider");
    });
}

#[derive(Debug, Parser)]
#[command(name = "clickhouse", version, about, arg_required_else_help = true)]
struct AppArgs {
    /// Load the whole configuration from `./configuration` instead of the flags below
    #[arg(long, conflicts_with_all = ["ch_url", "connection_string"])]
    from_config: bool,
    #[clap(flatten)]
    ch_args: ChArgs,
    /// Destination table name
    #[arg(long, default_value = "logship_demo")]
    table: String,
    /// Maximum number of events per batch
    #[arg(long, default_value_t = BatchConfig::DEFAULT_MAX_SIZE)]
    max_batch_size: usize,
    /// Flush interval for partially filled batches, in milliseconds
    #[arg(long, default_value_t = BatchConfig::DEFAULT_FLUSH_INTERVAL_MS)]
    flush_interval_ms: u64,
    /// Lowest level written to ClickHouse (verbose, debug, information, warning, error, fatal)
    #[arg(long, default_value = "verbose")]
    minimum_level: String,
}

/// ClickHouse connection configuration.
#[derive(Debug, Args)]
struct ChArgs {
    /// ClickHouse HTTP(S) endpoint (e.g. http://localhost:8123 or https://host:8443)
    #[arg(long, conflicts_with = "connection_string")]
    ch_url: Option<String>,
    /// `Key=Value;...` connection string, e.g. `Host=localhost;Port=8123;Username=default`
    #[arg(long)]
    connection_string: Option<String>,
    /// ClickHouse user name
    #[arg(long, default_value = "default")]
    ch_user: String,
    /// ClickHouse user password (optional)
    #[arg(long)]
    ch_password: Option<String>,
    /// ClickHouse target database
    #[arg(long, default_value = "default")]
    ch_database: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = main_impl().await {
        error!("{e}");
        std::process::exit(1);
    }

    Ok(())
}

async fn main_impl() -> Result<(), Box<dyn Error>> {
    init_tracing("clickhouse=info,logship=info")?;

    // Required for `https://` endpoints.
    install_crypto_provider();

    let args = AppArgs::parse();
    let config = if args.from_config {
        load_config::<SinkConfig>()?
    } else {
        sink_config_from_args(args)?
    };

    let options = ClickHouseSinkOptions::from_config(&config)?
        .on_batch_written(|events, elapsed| {
            info!(events, elapsed_ms = elapsed.as_millis() as u64, "batch written");
        })
        .on_batch_failed(|err, events| {
            error!(events, error = %err, "batch failed");
        });
    let minimum_level = options.minimum_level;

    let client = Arc::new(ClickHouseClient::new(&config.connection));
    client.ping().await?;
    info!(url = %config.connection.url, "connected to clickhouse");

    let sink = Arc::new(ClickHouseSink::with_client(client, options)?);
    let batching = BatchingSink::spawn(sink, config.batch.clone(), minimum_level)?;

    for event in demo_events() {
        batching.log(event);
    }

    // Let the interval flush pick up the first batch before shutting down.
    tokio::time::sleep(Duration::from_millis(config.batch.flush_interval_ms + 100)).await;
    batching.log(LogEvent::now(LogLevel::Information, "Demo finished"));

    batching.shutdown().await?;
    info!(table = %config.table.name, "done");

    Ok(())
}

fn sink_config_from_args(args: AppArgs) -> Result<SinkConfig, Box<dyn Error>> {
    let connection = match (args.ch_args.connection_string, args.ch_args.ch_url) {
        (Some(connection_string), _) => connection_string.parse::<ClickHouseConnectionConfig>()?,
        (None, Some(url)) => ClickHouseConnectionConfig {
            url,
            user: args.ch_args.ch_user,
            password: args.ch_args.ch_password.map(SecretString::new),
            database: args.ch_args.ch_database,
        },
        (None, None) => return Err("either --ch-url or --connection-string is required".into()),
    };

    let config = SinkConfig {
        connection,
        table: TableConfig {
            name: args.table,
            database: None,
            comment: None,
            engine: None,
        },
        batch: BatchConfig {
            max_size: args.max_batch_size,
            flush_interval_ms: args.flush_interval_ms,
            queue_limit: BatchConfig::DEFAULT_QUEUE_LIMIT.max(args.max_batch_size),
        },
        table_creation: TableCreationConfig::default(),
        minimum_level: args.minimum_level,
    };
    config.validate()?;

    Ok(config)
}

fn demo_events() -> Vec<LogEvent> {
    vec![
        LogEvent::now(LogLevel::Information, "Starting {Service} v{Version}")
            .with_property("Service", "checkout")
            .with_property("Version", "1.4.2"),
        LogEvent::now(LogLevel::Debug, "Cache warmed with {Entries} entries in {Elapsed} ms")
            .with_property("Entries", 1_024_i64)
            .with_property("Elapsed", 37.5),
        LogEvent::now(LogLevel::Warning, "Slow request {RequestId} to {Path}")
            .with_property("RequestId", "req-7f3a")
            .with_property("Path", "/api/orders")
            .with_property("Tags", vec!["slow", "orders"]),
        LogEvent::now(LogLevel::Error, "Payment for order {OrderId} failed")
            .with_property("OrderId", 98_231_i64)
            .with_exception(
                LogException::new("PaymentDeclined", "card was declined")
                    .with_stack_trace("   at checkout::pay (src/pay.rs:42)")
                    .with_inner(LogException::new("GatewayError", "status 402")),
            ),
    ]
}
