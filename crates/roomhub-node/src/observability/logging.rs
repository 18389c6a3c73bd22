//! Subscriber setup for the node binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{
    fmt::layer, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// How log lines are rendered. Parsed case-insensitively from `pretty` or
/// `json`, whether it comes from the config file, the environment or a flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogFormat {
    /// Multi-line, colored output for a terminal.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Err(format!("unknown log format '{s}', expected pretty or json"))
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogFormat> for String {
    fn from(format: LogFormat) -> Self {
        format.as_str().to_string()
    }
}

/// `RUST_LOG` wins when set; otherwise roomhub crates log at `level` and
/// request traces at debug.
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "roomhub={level},tower_http=debug,axum::rejection=trace"
        ))
    })
}

/// Installs the global subscriber. Fails if one is already installed.
///
/// ```rust,no_run
/// use roomhub_node::observability::{init_logging, LogFormat};
///
/// init_logging("debug", LogFormat::Pretty).unwrap();
/// ```
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(filter_for(level));
    match format {
        LogFormat::Json => subscriber
            .with(
                layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Pretty => subscriber.with(layer().pretty()).try_init()?,
    }

    tracing::info!(level, %format, "Logging initialized");
    Ok(())
}
