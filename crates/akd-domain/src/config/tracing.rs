use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tracing / logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default = "d_format")]
    pub format: LogFormat,
    /// `tracing_subscriber::EnvFilter` directive string; overridden by
    /// `RUST_LOG` at runtime per the usual EnvFilter precedence.
    #[serde(default = "d_filter")]
    pub filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: d_format(),
            filter: d_filter(),
        }
    }
}

fn d_format() -> LogFormat {
    LogFormat::Pretty
}
fn d_filter() -> String {
    "info".into()
}
