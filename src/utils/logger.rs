use crate::utils::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGET: &str = "student_criteria";

/// Log line layout on stderr. Query results own stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub const ALL: [LogFormat; 2] = [LogFormat::Compact, LogFormat::Json];

    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self> {
        LogFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| QueryError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: value.to_string(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    LogFormat::ALL.map(LogFormat::as_str).join(", ")
                ),
            })
    }
}

/// Default filter when `RUST_LOG` is unset. Verbose mode adds the per-query SQL.
pub fn default_directive(verbose: bool) -> String {
    if verbose {
        format!("{}=debug,info", CRATE_TARGET)
    } else {
        format!("{}=info", CRATE_TARGET)
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

pub fn init_logger(format: LogFormat, verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(build_filter(verbose));
    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        // 結構化輸出，方便日誌收集
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}
