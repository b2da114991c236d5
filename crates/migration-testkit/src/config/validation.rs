//! Configuration validation.

use super::types::{Config, Engine};
use crate::error::{Result, TestkitError};

const VALID_SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate a loaded configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.environments.is_empty() {
        return Err(TestkitError::Config(
            "Configuration must define at least one environment".to_string(),
        ));
    }

    for (name, env) in &config.environments {
        if env.host.trim().is_empty() {
            return Err(TestkitError::Config(format!(
                "Environment '{}': host must not be empty",
                name
            )));
        }
        if env.database.trim().is_empty() {
            return Err(TestkitError::Config(format!(
                "Environment '{}': database must not be empty",
                name
            )));
        }
        if env.user.trim().is_empty() {
            return Err(TestkitError::Config(format!(
                "Environment '{}': user must not be empty",
                name
            )));
        }
        if env.engine == Engine::Postgres && !VALID_SSL_MODES.contains(&env.ssl_mode.as_str()) {
            return Err(TestkitError::Config(format!(
                "Environment '{}': invalid ssl_mode '{}'. Valid options: {}",
                name,
                env.ssl_mode,
                VALID_SSL_MODES.join(", ")
            )));
        }
    }

    if let Some(smoke) = &config.smoke {
        if !smoke.base_url.starts_with("http://") && !smoke.base_url.starts_with("https://") {
            return Err(TestkitError::Config(format!(
                "smoke.base_url must start with http:// or https://, got '{}'",
                smoke.base_url
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_yaml() -> &'static str {
        r#"
environments:
  target:
    engine: postgres
    host: db.example.com
    database: petclinic
    user: tester
    password: secret
    schema: petclinic
"#
    }

    #[test]
    fn test_valid_config_passes() {
        let config = Config::from_yaml(valid_yaml()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_environments_rejected() {
        let err = Config::from_yaml("environments: {}\n").unwrap_err();
        assert!(err.to_string().contains("at least one environment"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let yaml = valid_yaml().replace("db.example.com", "\"\"");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("host must not be empty"));
    }

    #[test]
    fn test_invalid_ssl_mode_rejected() {
        let yaml = format!("{}    ssl_mode: sometimes\n", valid_yaml());
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid ssl_mode"));
    }

    #[test]
    fn test_bad_smoke_url_rejected() {
        let yaml = format!("{}smoke:\n  base_url: petclinic.local\n", valid_yaml());
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}
