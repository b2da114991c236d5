//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, TestkitError};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Look up an environment by name.
    pub fn environment(&self, name: &str) -> Result<&EnvConfig> {
        self.environments.get(name).ok_or_else(|| {
            TestkitError::Config(format!(
                "Environment '{}' not found in configuration. Available environments: {}",
                name,
                self.environments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_lookup_lists_available() {
        let config = Config::from_yaml(
            r#"
environments:
  source:
    engine: mssql
    host: sql.example.com
    database: BookStore
    user: tester
    password: secret
  target:
    engine: postgres
    host: pg.example.com
    database: bookstore
    user: tester
    password: secret
"#,
        )
        .unwrap();

        assert!(config.environment("source").is_ok());
        let err = config.environment("staging").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("staging"));
        assert!(msg.contains("source"));
        assert!(msg.contains("target"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/testkit.yaml").unwrap_err();
        assert!(matches!(err, TestkitError::Io(_)));
    }
}
