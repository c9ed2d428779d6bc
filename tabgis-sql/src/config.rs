//! Data source configuration
//!
//! Connection parameters handed to `DataSource::open`. Keys mirror the usual
//! `databaseName` / `user` / `password` property names.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;

use crate::{SqlError, SqlResult};

const MEMORY: &str = ":memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PG_HOST: &str = "localhost";
const DEFAULT_PG_PORT: u16 = 5432;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Connection parameters of a data source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    /// file path, `:memory:`, database name or a full connection URL
    pub database_name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// SpatiaLite module loaded into every SQLite connection, e.g. `mod_spatialite`
    #[serde(default)]
    pub spatial_extension: Option<String>,
}

impl DataSourceConfig {
    pub fn new<T: Into<String>>(database_name: T) -> Self {
        DataSourceConfig {
            database_name: database_name.into(),
            user: None,
            password: None,
            host: None,
            port: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            spatial_extension: None,
        }
    }

    /// in-memory SQLite database, shared by every pooled connection
    pub fn memory() -> Self {
        DataSourceConfig::new(MEMORY)
    }

    pub fn user<T: Into<String>>(mut self, user: T) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password<T: Into<String>>(mut self, password: T) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host<T: Into<String>>(mut self, host: T) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn spatial_extension<T: Into<String>>(mut self, extension: T) -> Self {
        self.spatial_extension = Some(extension.into());
        self
    }

    /// Build from a property map (`databaseName`, `user`, `password`, `host`, `port`,
    /// `maxConnections`, `spatialExtension`).
    pub fn from_map(map: &HashMap<String, String>) -> SqlResult<Self> {
        let database_name = map
            .get("databaseName")
            .ok_or_else(|| SqlError::new_common_error("missing `databaseName` property"))?;

        let mut config = DataSourceConfig::new(database_name.as_str());
        config.user = map.get("user").cloned();
        config.password = map.get("password").cloned();
        config.host = map.get("host").cloned();
        config.spatial_extension = map.get("spatialExtension").cloned();
        if let Some(port) = map.get("port") {
            let port = port
                .parse::<u16>()
                .map_err(|_| SqlError::new_common_error(format!("invalid port `{port}`")))?;
            config.port = Some(port);
        }
        if let Some(max) = map.get("maxConnections") {
            let max = max.parse::<u32>().map_err(|_| {
                SqlError::new_common_error(format!("invalid maxConnections `{max}`"))
            })?;
            config = config.max_connections(max);
        }
        Ok(config)
    }

    pub fn is_memory(&self) -> bool {
        let name = self.database_name.trim();
        name.is_empty() || name == MEMORY || name == "sqlite::memory:"
    }

    pub(crate) fn sqlite_options(&self) -> SqlResult<SqliteConnectOptions> {
        let name = self.database_name.trim();
        let options = if self.is_memory() {
            // sqlx turns this into a uniquely named shared-cache memory database
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else if name.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(name)?.create_if_missing(true)
        } else {
            SqliteConnectOptions::new()
                .filename(name)
                .create_if_missing(true)
        };

        Ok(match &self.spatial_extension {
            Some(ext) => options.extension(ext.clone()),
            None => options,
        })
    }

    pub(crate) fn pg_options(&self) -> SqlResult<PgConnectOptions> {
        let name = self.database_name.trim();
        let mut options = if name.starts_with("postgres://") || name.starts_with("postgresql://")
        {
            PgConnectOptions::from_str(name)?
        } else {
            PgConnectOptions::new()
                .host(self.host.as_deref().unwrap_or(DEFAULT_PG_HOST))
                .port(self.port.unwrap_or(DEFAULT_PG_PORT))
                .database(name)
        };
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

impl std::fmt::Display for DataSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.user, &self.host) {
            (Some(u), Some(h)) => write!(
                f,
                "{}@{}:{}/{}",
                u,
                h,
                self.port.unwrap_or(DEFAULT_PG_PORT),
                self.database_name
            ),
            (Some(u), None) => write!(f, "{}@{}", u, self.database_name),
            _ => write!(f, "{}", self.database_name),
        }
    }
}
