//! Helpers for tests against a live ClickHouse server.

use clickhouse::Client;
use logship_config::shared::ClickHouseConnectionConfig;
use secrecy::SecretString;
use uuid::Uuid;

/// ClickHouse HTTP URL (e.g. `http://localhost:8123`).
pub const CLICKHOUSE_URL_ENV: &str = "TESTS_CLICKHOUSE_URL";
/// ClickHouse user name (required).
pub const CLICKHOUSE_USER_ENV: &str = "TESTS_CLICKHOUSE_USER";
/// ClickHouse password (optional, omit or leave empty for passwordless access).
pub const CLICKHOUSE_PASSWORD_ENV: &str = "TESTS_CLICKHOUSE_PASSWORD";

/// Returns whether ClickHouse integration tests should be skipped.
///
/// Prints a warning and returns `true` when any required env var is missing.
/// Required: [`CLICKHOUSE_URL_ENV`], [`CLICKHOUSE_USER_ENV`].
pub fn skip_if_missing_clickhouse_env_vars() -> bool {
    let missing: Vec<&str> = [CLICKHOUSE_URL_ENV, CLICKHOUSE_USER_ENV]
        .iter()
        .copied()
        .filter(|var| std::env::var_os(var).is_none())
        .collect();

    if missing.is_empty() {
        return false;
    }

    eprintln!(
        "skipping clickhouse integration test: missing {}",
        missing.join(", ")
    );
    true
}

/// # Panics
///
/// Panics if [`CLICKHOUSE_URL_ENV`] is not set.
pub fn get_clickhouse_url() -> String {
    std::env::var(CLICKHOUSE_URL_ENV).unwrap_or_else(|_| panic!("{CLICKHOUSE_URL_ENV} must be set"))
}

/// # Panics
///
/// Panics if [`CLICKHOUSE_USER_ENV`] is not set.
pub fn get_clickhouse_user() -> String {
    std::env::var(CLICKHOUSE_USER_ENV)
        .unwrap_or_else(|_| panic!("{CLICKHOUSE_USER_ENV} must be set"))
}

pub fn get_clickhouse_password() -> Option<String> {
    std::env::var(CLICKHOUSE_PASSWORD_ENV)
        .ok()
        .filter(|s| !s.is_empty())
}

/// Generates a unique database name for test isolation.
pub fn random_database_name() -> String {
    format!("logship_tests_{}", Uuid::new_v4().simple())
}

/// A throwaway ClickHouse database.
///
/// Call [`ClickHouseTestDatabase::drop_database`] at the end of the test.
pub struct ClickHouseTestDatabase {
    root_client: Client,
    db_client: Client,
    connection: ClickHouseConnectionConfig,
}

impl ClickHouseTestDatabase {
    /// Creates a database with a random name on the server named by the environment.
    pub async fn create() -> Self {
        let url = get_clickhouse_url();
        let user = get_clickhouse_user();
        let password = get_clickhouse_password();
        let database = random_database_name();

        let mut root_client = Client::default().with_url(&url).with_user(&user);
        if let Some(password) = &password {
            root_client = root_client.with_password(password);
        }
        let db_client = root_client.clone().with_database(&database);

        let connection = ClickHouseConnectionConfig {
            url,
            user,
            password: password.map(SecretString::new),
            database: database.clone(),
        };

        root_client
            .query(&format!("CREATE DATABASE IF NOT EXISTS `{database}`"))
            .execute()
            .await
            .expect("Failed to create test ClickHouse database");

        Self {
            root_client,
            db_client,
            connection,
        }
    }

    pub fn database(&self) -> &str {
        &self.connection.database
    }

    /// Connection settings scoped to this database.
    pub fn connection(&self) -> ClickHouseConnectionConfig {
        self.connection.clone()
    }

    pub async fn execute(&self, sql: &str) {
        self.db_client
            .query(sql)
            .execute()
            .await
            .expect("ClickHouse statement failed");
    }

    /// Runs a query returning a single `String` column.
    pub async fn fetch_strings(&self, sql: &str) -> Vec<String> {
        self.db_client
            .query(sql)
            .fetch_all::<String>()
            .await
            .expect("ClickHouse query failed")
    }

    pub async fn count_rows(&self, table: &str) -> u64 {
        self.db_client
            .query(&format!("SELECT count() FROM {table}"))
            .fetch_one::<u64>()
            .await
            .expect("ClickHouse count failed")
    }

    pub async fn drop_database(&self) {
        self.root_client
            .query(&format!("DROP DATABASE IF EXISTS `{}`", self.connection.database))
            .execute()
            .await
            .expect("Failed to drop test ClickHouse database");
    }
}
