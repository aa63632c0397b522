use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "PANTRY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// `gateway.host` -> `PANTRY_GATEWAY__HOST`
pub fn to_env_var(field_path: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        field_path.to_uppercase().replace('.', "__")
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl GatewaySettings {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            api_key: None,
            path: default_path(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_malformed_retry_delay_ms")]
    pub malformed_retry_delay_ms: u64,
    #[serde(default = "default_pending_tool_delay_ms")]
    pub pending_tool_delay_ms: u64,
    #[serde(default = "default_pending_tool_max_checks")]
    pub pending_tool_max_checks: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            malformed_retry_delay_ms: default_malformed_retry_delay_ms(),
            pending_tool_delay_ms: default_pending_tool_delay_ms(),
            pending_tool_max_checks: default_pending_tool_max_checks(),
        }
    }
}

impl LoopSettings {
    pub fn malformed_retry_delay(&self) -> Duration {
        Duration::from_millis(self.malformed_retry_delay_ms)
    }

    pub fn pending_tool_delay(&self) -> Duration {
        Duration::from_millis(self.pending_tool_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub agent: LoopSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("gateway.path", default_path())?
            .set_default("gateway.timeout_ms", default_timeout_ms() as i64)?
            .set_default("gateway.max_retries", default_max_retries() as i64)?
            .set_default("gateway.retry_base_delay_ms", default_retry_base_delay_ms() as i64)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(field) = missing_field(&error_str) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Pull the field path out of "missing field `host`" style messages.
/// A bare `gateway` means the whole section is absent, so its required `host` is too.
fn missing_field(error_str: &str) -> Option<String> {
    let start = error_str.find("missing field `")? + "missing field `".len();
    let rest = &error_str[start..];
    let field = &rest[..rest.find('`')?];
    let path = match field {
        "gateway" => "gateway.host".to_string(),
        "host" => "gateway.host".to_string(),
        other => other.to_string(),
    };
    Some(path)
}

fn default_path() -> String {
    "/v1/agent/complete".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_max_iterations() -> usize {
    4
}

fn default_malformed_retry_delay_ms() -> u64 {
    300
}

fn default_pending_tool_delay_ms() -> u64 {
    150
}

fn default_pending_tool_max_checks() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PANTRY_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("PANTRY_GATEWAY__HOST", "https://llm.example.com");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.gateway.host, "https://llm.example.com");
        assert_eq!(settings.gateway.api_key, None);
        assert_eq!(settings.gateway.timeout(), Duration::from_secs(30));
        assert_eq!(settings.gateway.max_retries, 2);
        assert_eq!(settings.gateway.retry_base_delay_ms, 500);
        assert_eq!(settings.agent.max_iterations, 4);
        assert_eq!(settings.agent.pending_tool_max_checks, 3);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("PANTRY_GATEWAY__HOST", "http://localhost:8080");
        env::set_var("PANTRY_GATEWAY__API_KEY", "secret");
        env::set_var("PANTRY_GATEWAY__TIMEOUT_MS", "5000");
        env::set_var("PANTRY_GATEWAY__MAX_RETRIES", "1");
        env::set_var("PANTRY_AGENT__MAX_ITERATIONS", "6");
        env::set_var("PANTRY_AGENT__MALFORMED_RETRY_DELAY_MS", "10");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.gateway.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.gateway.timeout(), Duration::from_secs(5));
        assert_eq!(settings.gateway.max_retries, 1);
        assert_eq!(settings.agent.max_iterations, 6);
        assert_eq!(settings.agent.malformed_retry_delay_ms, 10);
        assert_eq!(settings.agent.pending_tool_delay_ms, 150);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_host_names_env_var() {
        clean_env();

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "PANTRY_GATEWAY__HOST");
            }
            other => panic!("Expected missing env var error, got {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_joins_host_and_path() {
        let mut settings = GatewaySettings::new("https://llm.example.com/");
        assert_eq!(
            settings.endpoint(),
            "https://llm.example.com/v1/agent/complete"
        );
        settings.path = "complete".to_string();
        assert_eq!(settings.endpoint(), "https://llm.example.com/complete");
    }

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("agent.max_iterations"), "PANTRY_AGENT__MAX_ITERATIONS");
    }
}
