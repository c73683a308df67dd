mod broadcast;
mod executors;
mod server;
mod state;
mod tracing;
mod worker_pool;

pub use broadcast::*;
pub use executors::*;
pub use server::*;
pub use state::*;
pub use tracing::*;
pub use worker_pool::*;

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub executors: ExecutorsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when absent, then
    /// apply environment variable overrides per the documented env surface.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text).map_err(|e| crate::error::Error::Config(e.to_string()))?
            }
            _ => Config::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Environment variables documented in the external interfaces section:
    /// `AKD_PORT`, `AKD_HOST`, `AKD_STATE_DIR`, `AKD_PRIMARY_EXECUTOR_CMD`,
    /// `AKD_SECONDARY_EXECUTOR_CMD`, `AKD_WORKER_POOL_WARM_COUNT`,
    /// `AKD_LOG_FORMAT`, `RUST_LOG`.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AKD_PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("AKD_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("AKD_STATE_DIR") {
            self.state.state_dir = v;
        }
        if let Ok(v) = std::env::var("AKD_PRIMARY_EXECUTOR_CMD") {
            self.executors.primary.command = v;
        }
        if let Ok(v) = std::env::var("AKD_SECONDARY_EXECUTOR_CMD") {
            self.executors.secondary.command = v;
        }
        if let Ok(v) = std::env::var("AKD_WORKER_POOL_WARM_COUNT") {
            if let Ok(n) = v.parse() {
                self.worker_pool.warm_count = n;
            }
        }
        if let Ok(v) = std::env::var("AKD_LOG_FORMAT") {
            self.tracing.format = match v.as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(v) = std::env::var("RUST_LOG") {
            self.tracing.filter = v;
        }
    }

    /// Validate the configuration and return a list of issues. Unknown or
    /// malformed env overrides never reach here as hard errors — they are
    /// coerced to defaults above; this only validates the final shape.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.executors.primary.command.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "executors.primary.command".into(),
                message: "primary executor command must not be empty".into(),
            });
        }
        if self.executors.secondary.command.is_empty() && self.executors.secondary.required {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "executors.secondary.command".into(),
                message: "secondary executor marked required but has no command".into(),
            });
        }
        if self.state.state_dir.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "state.state_dir".into(),
                message: "state_dir must not be empty".into(),
            });
        }
        if self.worker_pool.warm_count == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "worker_pool.warm_count".into(),
                message: "warm_count is 0 — pool calls will always cold-start".into(),
            });
        }
        if self.broadcast.debounce_ms > self.broadcast.staleness_cutoff_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "broadcast.debounce_ms".into(),
                message: "debounce_ms must not exceed staleness_cutoff_ms".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.executors.primary.command = "akd-agent-primary".into();
        cfg
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn missing_primary_command_is_error() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "executors.primary.command" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "server.port"));
    }

    #[test]
    fn debounce_exceeding_staleness_is_error() {
        let mut cfg = valid_config();
        cfg.broadcast.debounce_ms = 20_000;
        cfg.broadcast.staleness_cutoff_ms = 15_000;
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "broadcast.debounce_ms"));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn zero_warm_count_is_warning_not_error() {
        let mut cfg = valid_config();
        cfg.worker_pool.warm_count = 0;
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "worker_pool.warm_count")
            .unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");
    }
}
