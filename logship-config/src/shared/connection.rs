use std::str::FromStr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::Config;
use crate::shared::ValidationError;

const DEFAULT_USER: &str = "default";

const DEFAULT_DATABASE: &str = "default";

const DEFAULT_HTTP_PORT: u16 = 8123;

const DEFAULT_HTTPS_PORT: u16 = 8443;

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

/// Connection parameters for a ClickHouse HTTP(S) endpoint.
///
/// This intentionally does not implement `Serialize` so the password cannot leak
/// into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConnectionConfig {
    /// HTTP(S) endpoint, e.g. `http://localhost:8123`.
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    pub password: Option<SecretString>,
    #[serde(default = "default_database")]
    pub database: String,
}

impl Config for ClickHouseConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

impl ClickHouseConnectionConfig {
    /// Creates a configuration for `url` with the default user and database.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: default_user(),
            password: None,
            database: default_database(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ValidationError::InvalidFieldValue {
                field: "connection.url".to_string(),
                constraint: "must start with `http://` or `https://`".to_string(),
            });
        }

        if self.user.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "connection.user".to_string(),
                constraint: "must not be blank".to_string(),
            });
        }

        Ok(())
    }
}

/// Parses either a bare `http(s)://` URL or a `Key=Value;...` connection string.
///
/// Recognised keys (case-insensitive): `Host`, `Port`, `Protocol`, `Username` / `User`,
/// `Password` and `Database`. Other keys are ignored.
impl FromStr for ClickHouseConnectionConfig {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::new(s));
        }

        let mut host = None;
        let mut port = None;
        let mut protocol = "http".to_string();
        let mut config = Self::new(String::new());

        for pair in s.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ValidationError::InvalidConnectionString(format!(
                    "`{pair}` is not a `Key=Value` pair"
                )));
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "host" => host = Some(value.to_string()),
                "port" => {
                    let parsed = value.parse::<u16>().map_err(|_| {
                        ValidationError::InvalidConnectionString(format!(
                            "`{value}` is not a valid port"
                        ))
                    })?;
                    port = Some(parsed);
                }
                "protocol" => protocol = value.to_lowercase(),
                "username" | "user" => config.user = value.to_string(),
                "password" if !value.is_empty() => {
                    config.password = Some(SecretString::new(value.to_string()))
                }
                "database" => config.database = value.to_string(),
                _ => {}
            }
        }

        let Some(host) = host.filter(|host| !host.is_empty()) else {
            return Err(ValidationError::InvalidConnectionString(
                "`Host` is required".to_string(),
            ));
        };

        let port = match (port, protocol.as_str()) {
            (Some(port), _) => port,
            (None, "https") => DEFAULT_HTTPS_PORT,
            (None, "http") => DEFAULT_HTTP_PORT,
            (None, other) => {
                return Err(ValidationError::InvalidConnectionString(format!(
                    "unsupported protocol `{other}`"
                )));
            }
        };

        config.url = format!("{protocol}://{host}:{port}");
        Ok(config)
    }
}
