//! Configuration type definitions.
//!
//! A single YAML file describes every database environment the toolkit can
//! talk to (pre-migration source, post-migration target, local copies), plus
//! optional settings for the HTTP smoke tests. Components receive an
//! explicitly constructed [`EnvConfig`] rather than reading global state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Database engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// PostgreSQL
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    /// Microsoft SQL Server
    #[serde(alias = "sqlserver", alias = "sql_server")]
    Mssql,
}

impl Engine {
    /// Canonical engine name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mssql => "mssql",
        }
    }

    /// Default port for the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::Postgres => 5432,
            Engine::Mssql => 1433,
        }
    }

    /// Default schema for the engine.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Engine::Postgres => "public",
            Engine::Mssql => "dbo",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Named database environments (e.g. "source", "target", "local").
    pub environments: BTreeMap<String, EnvConfig>,

    /// Optional settings for the HTTP endpoint smoke tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke: Option<SmokeConfig>,
}

/// One database environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Database engine.
    pub engine: Engine,

    /// Database host.
    pub host: String,

    /// Database port. Defaults to the engine's standard port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema holding the application tables. Defaults to "public" for
    /// PostgreSQL and "dbo" for SQL Server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Encrypt the connection (SQL Server).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust the server certificate without verification (SQL Server).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// SSL mode (PostgreSQL): disable, require, verify-ca, verify-full.
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Free-form environment description shown in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EnvConfig {
    /// Effective port, falling back to the engine default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }

    /// Effective schema, falling back to the engine default.
    pub fn schema(&self) -> &str {
        self.schema
            .as_deref()
            .unwrap_or_else(|| self.engine.default_schema())
    }

    /// Connection summary with the password redacted, safe for logs.
    pub fn redacted(&self) -> String {
        format!(
            "{}://{}:***@{}:{}/{}",
            self.engine,
            self.user,
            self.host,
            self.port(),
            self.database
        )
    }
}

/// Settings for the HTTP endpoint smoke tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeConfig {
    /// Base URL of the running web application, without a trailing slash
    /// (e.g. "http://localhost:8080/petclinic").
    pub base_url: String,
}

fn default_true() -> bool {
    true
}

fn default_require() -> String {
    "require".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(engine: Engine) -> EnvConfig {
        EnvConfig {
            engine,
            host: "db.example.com".to_string(),
            port: None,
            database: "petclinic".to_string(),
            user: "tester".to_string(),
            password: "hunter2".to_string(),
            schema: None,
            encrypt: true,
            trust_server_cert: false,
            ssl_mode: "require".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_engine_defaults() {
        let pg = make_env(Engine::Postgres);
        assert_eq!(pg.port(), 5432);
        assert_eq!(pg.schema(), "public");

        let ms = make_env(Engine::Mssql);
        assert_eq!(ms.port(), 1433);
        assert_eq!(ms.schema(), "dbo");
    }

    #[test]
    fn test_explicit_values_win() {
        let mut env = make_env(Engine::Postgres);
        env.port = Some(6543);
        env.schema = Some("petclinic".to_string());
        assert_eq!(env.port(), 6543);
        assert_eq!(env.schema(), "petclinic");
    }

    #[test]
    fn test_redacted_hides_password() {
        let env = make_env(Engine::Postgres);
        let shown = env.redacted();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("tester"));
        assert!(shown.contains("db.example.com"));
    }

    #[test]
    fn test_engine_aliases_parse() {
        let env: EnvConfig = serde_yaml::from_str(
            "engine: sqlserver\nhost: h\ndatabase: d\nuser: u\npassword: p\n",
        )
        .unwrap();
        assert_eq!(env.engine, Engine::Mssql);

        let env: EnvConfig =
            serde_yaml::from_str("engine: pg\nhost: h\ndatabase: d\nuser: u\npassword: p\n")
                .unwrap();
        assert_eq!(env.engine, Engine::Postgres);
    }
}
