use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::bootstrap::ResultPolicy;
use crate::descriptor::{ConnectionDescriptor, DescriptorError};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "DBINIT_ENV";
const CONFIG_DIR_ENV: &str = "DBINIT_CONFIG_DIR";
const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Deployment environment the routine is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `DBINIT_`-prefixed variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let mut settings = Self::load_from(&config_dir, &environment)?;

        if settings.database.url.is_none() && settings.database.secret.is_none() {
            settings.database.url = std::env::var(DATABASE_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty());
        }

        Ok(settings)
    }

    /// Load from an explicit config directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("DBINIT")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    // Must outlast every statement hitting both of its timeouts.
    fn default_request_timeout_ms() -> u64 {
        300_000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Where the target database lives: `url`, else the `secret` document, else
/// the discrete fields.
#[derive(Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: Option<String>,
    /// Managed secret JSON with `username`, `password`, `host`, `port`, `dbname`.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "DatabaseSettings::default_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        5432
    }

    fn default_name() -> String {
        "postgres".to_string()
    }

    fn default_username() -> String {
        "postgres".to_string()
    }

    fn default_timeout_ms() -> u64 {
        5000
    }

    /// Longest a run of `statements` statements can take when each one hits
    /// both of its timeouts.
    pub fn worst_case_run(&self, statements: usize) -> Duration {
        let per_statement = self.connect_timeout_ms.saturating_add(self.query_timeout_ms);
        Duration::from_millis(per_statement.saturating_mul(statements as u64))
    }

    /// Resolve the configured connection into a validated descriptor.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor, DescriptorError> {
        // Zero would disable `statement_timeout` server-side but expire instantly client-side.
        if self.query_timeout_ms == 0 {
            return Err(DescriptorError::ZeroTimeout("query_timeout_ms"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(DescriptorError::ZeroTimeout("connect_timeout_ms"));
        }

        let descriptor = match (self.url.as_deref(), self.secret.as_deref()) {
            (Some(url), _) => ConnectionDescriptor::from_url(url)?,
            (None, Some(secret)) => ConnectionDescriptor::from_secret_json(secret)?,
            (None, None) => ConnectionDescriptor::new(
                self.host.clone(),
                self.port,
                self.name.clone(),
                self.username.clone(),
                self.password.clone(),
            )?,
        };

        Ok(descriptor.with_timeouts(
            Duration::from_millis(self.query_timeout_ms),
            Duration::from_millis(self.connect_timeout_ms),
        ))
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            host: Self::default_host(),
            port: Self::default_port(),
            name: Self::default_name(),
            username: Self::default_username(),
            password: String::new(),
            query_timeout_ms: Self::default_timeout_ms(),
            connect_timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_ref().map(|_| "****"))
            .field("secret", &self.secret.as_ref().map(|_| "****"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"****")
            .field("query_timeout_ms", &self.query_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_filter")]
    pub log_filter: String,
}

impl TelemetrySettings {
    fn default_log_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: Self::default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub result_policy: ResultPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_result_policy_is_strict() {
        let settings = Settings::default();
        assert_eq!(settings.bootstrap.result_policy, ResultPolicy::Strict);
    }

    #[test]
    fn default_timeouts_are_five_seconds() {
        let settings = Settings::default();
        assert_eq!(settings.database.query_timeout_ms, 5000);
        assert_eq!(settings.database.connect_timeout_ms, 5000);
    }

    #[test]
    fn discrete_fields_require_a_password() {
        let database = DatabaseSettings::default();
        assert_eq!(
            database.descriptor().unwrap_err(),
            DescriptorError::EmptyField("password")
        );
    }

    #[test]
    fn url_takes_precedence_over_fields() {
        let database = DatabaseSettings {
            url: Some("postgresql://admin:pw@cluster.internal:6543/pooler".into()),
            query_timeout_ms: 1000,
            ..Default::default()
        };

        let d = database.descriptor().unwrap();
        assert_eq!(d.host(), "cluster.internal");
        assert_eq!(d.port(), 6543);
        assert_eq!(d.database(), "pooler");
        assert_eq!(d.query_timeout(), Duration::from_millis(1000));
        assert_eq!(d.connect_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn secret_document_is_used_without_url() {
        let database = DatabaseSettings {
            secret: Some(
                r#"{"username":"postgres","password":"pw","host":"cluster.rds","port":5432,"dbname":"postgres"}"#
                    .into(),
            ),
            connect_timeout_ms: 750,
            ..Default::default()
        };

        let d = database.descriptor().unwrap();
        assert_eq!(d.host(), "cluster.rds");
        assert_eq!(d.connect_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let database = DatabaseSettings {
            password: "pw".into(),
            query_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            database.descriptor().unwrap_err(),
            DescriptorError::ZeroTimeout("query_timeout_ms")
        );

        let database = DatabaseSettings {
            url: Some("postgresql://admin:pw@cluster.internal:6543/pooler".into()),
            connect_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            database.descriptor().unwrap_err().to_string(),
            "connect_timeout_ms must be greater than zero"
        );
    }

    #[test]
    fn worst_case_covers_every_statement() {
        let database = DatabaseSettings::default();
        assert_eq!(database.worst_case_run(8), Duration::from_millis(80_000));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let database = DatabaseSettings {
            url: Some("postgresql://admin:leaky@h:5432/db".into()),
            password: "leaky".into(),
            ..Default::default()
        };
        assert!(!format!("{database:?}").contains("leaky"));
    }

    #[test]
    fn loads_layered_files() {
        let dir = std::env::temp_dir().join(format!("dbinit-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.toml"),
            "[database]\nhost = \"base-host\"\npassword = \"pw\"\n\n[bootstrap]\nresult_policy = \"lenient\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("staging.toml"), "[database]\nhost = \"staging-host\"\n").unwrap();

        let settings = Settings::load_from(&dir, "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.database.host, "staging-host");
        assert_eq!(settings.database.password, "pw");
        assert_eq!(settings.bootstrap.result_policy, ResultPolicy::Lenient);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_unknown_environment() {
        let dir = std::env::temp_dir().join("dbinit-settings-missing");
        assert!(Settings::load_from(&dir, "qa").is_err());
    }
}
