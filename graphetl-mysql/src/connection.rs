use std::path::PathBuf;
use std::time::Duration;

use graphetl_config::shared::SourceConfig;
use secrecy::{ExposeSecret, SecretString};
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

use crate::option_file::ClientOptions;

/// Connection parameters for one MySQL source.
#[derive(Debug, Clone)]
pub struct MySqlConnectionConfig {
    pub host: String,
    pub port: u16,
    /// When unset the driver default user is used.
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub database: Option<String>,
    /// Unix socket path, preferred over `host`/`port` when set.
    pub socket: Option<PathBuf>,
}

impl MySqlConnectionConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";

    pub const DEFAULT_PORT: u16 = 3306;

    /// Resolves the parameters of a source.
    ///
    /// Values set on the source entry win over the option file defaults, which win over the
    /// built-in defaults.
    pub fn resolve(source: &SourceConfig, defaults: Option<&ClientOptions>) -> Self {
        let defaults = defaults.cloned().unwrap_or_default();

        Self {
            host: source
                .host
                .clone()
                .or(defaults.host)
                .unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            port: source.port.or(defaults.port).unwrap_or(Self::DEFAULT_PORT),
            username: source.user.clone().or(defaults.user),
            password: source.password.clone().or(defaults.password),
            database: source.database_name.clone().or(defaults.database),
            socket: source.socket.clone().or(defaults.socket),
        }
    }

    /// Creates sqlx connect options for these parameters.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new().host(&self.host).port(self.port);

        if let Some(socket) = &self.socket {
            options = options.socket(socket);
        }
        if let Some(username) = &self.username {
            options = options.username(username);
        }
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }

        options
    }

    /// Returns `host:port/database` for log lines, never including credentials.
    pub fn display_target(&self) -> String {
        let database = self.database.as_deref().unwrap_or("");
        match &self.socket {
            Some(socket) => format!("{}/{database}", socket.display()),
            None => format!("{}:{}/{database}", self.host, self.port),
        }
    }
}

/// Connects to a source database.
///
/// Sources are read by one cursor at a time, so callers usually pass `max_connections = 1`.
pub async fn connect_to_source_database(
    config: &MySqlConnectionConfig,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_with(config.connect_options())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_entry_wins_over_option_file() {
        let mut source = SourceConfig::new("mysql").with_database_name("chem");
        source.host = Some("source-host".to_string());

        let defaults = ClientOptions {
            host: Some("file-host".to_string()),
            port: Some(3310),
            user: Some("reader".to_string()),
            password: Some(SecretString::new("pw".to_string())),
            socket: None,
            database: Some("ignored".to_string()),
        };

        let config = MySqlConnectionConfig::resolve(&source, Some(&defaults));
        assert_eq!(config.host, "source-host");
        assert_eq!(config.port, 3310);
        assert_eq!(config.username.as_deref(), Some("reader"));
        assert_eq!(config.database.as_deref(), Some("chem"));
        assert_eq!(
            config.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("pw")
        );
    }

    #[test]
    fn test_builtin_defaults() {
        let source = SourceConfig::new("mysql");
        let config = MySqlConnectionConfig::resolve(&source, None);

        assert_eq!(config.host, MySqlConnectionConfig::DEFAULT_HOST);
        assert_eq!(config.port, MySqlConnectionConfig::DEFAULT_PORT);
        assert!(config.username.is_none());
        assert_eq!(config.display_target(), "localhost:3306/");
    }
}
