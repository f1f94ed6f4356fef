use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Build the global `tracing` subscriber from `config`. JSON for
/// machine consumption, pretty for a terminal; `RUST_LOG` overrides
/// `config.level` when set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_line_number(true)
                .with_file(true);

            if let Some(path) = &config.file {
                let file = open_append(path)?;
                registry.with(layer.with_writer(std::sync::Arc::new(file))).init();
            } else {
                registry.with(layer).init();
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_line_number(true)
                .with_file(false);

            if let Some(path) = &config.file {
                let file = open_append(path)?;
                registry.with(layer.with_writer(std::sync::Arc::new(file))).init();
            } else {
                registry.with(layer).init();
            }
        }
    }

    Ok(())
}

fn open_append(path: &std::path::Path) -> anyhow::Result<std::fs::File> {
    Ok(std::fs::OpenOptions::new().create(true).append(true).open(path)?)
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("invalid log level: {level}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_known_level_case_insensitively() {
        assert!(parse_log_level("TRACE").is_ok());
        assert!(parse_log_level("Debug").is_ok());
        assert!(parse_log_level("info").is_ok());
        assert!(parse_log_level("warning").is_ok());
        assert!(parse_log_level("error").is_ok());
        assert!(parse_log_level("nonsense").is_err());
    }
}
