//! Process-wide tracing setup.
//!
//! Output goes to stdout and, when `log_dir` is configured, to a daily
//! rolling file written off the request path. `RUST_LOG` replaces the
//! configured level entirely.

use std::{io, path::PathBuf};

use tracing::{Level, Subscriber};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::{time::ChronoUtc, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::GatewayConfig;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_FILE_PREFIX: &str = "sql-job-gateway";

/// Crates whose events pass the default filter. `tower_http` carries the
/// per-request access spans from `TraceLayer`.
const LOG_TARGETS: [&str; 2] = ["sql_job_gateway", "tower_http"];

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn from_gateway(config: &GatewayConfig) -> Self {
        Self {
            level: parse_level(config.log_level.as_deref()),
            json: config.log_json,
            log_dir: config.log_dir.as_ref().map(PathBuf::from),
        }
    }

    fn directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Keeps the file writer flushing; drop it only at shutdown.
pub struct LogGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Parse a level name, falling back to INFO.
pub fn parse_level(level: Option<&str>) -> Level {
    level
        .and_then(|s| s.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

fn fmt_layer<S, W>(json: bool, ansi: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
        .with_writer(writer);

    if json {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.boxed()
    }
}

/// Install the global subscriber. A subscriber that is already installed
/// (tests, embedding) is left in place.
pub fn init_logging(config: &LoggingConfig) -> io::Result<LogGuard> {
    let _ = LogTracer::init();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let mut layers = vec![fmt_layer(config.json, !config.json, io::stdout)];

    let file_writer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt_layer(config.json, false, writer));
            Some(guard)
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();

    Ok(LogGuard {
        _file_writer: file_writer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("debug")), Level::DEBUG);
        assert_eq!(parse_level(Some(" WARN ")), Level::WARN);
        assert_eq!(parse_level(Some("loud")), Level::INFO);
        assert_eq!(parse_level(None), Level::INFO);
    }

    #[test]
    fn test_from_gateway_config() {
        let config = GatewayConfig::builder()
            .log_level("debug")
            .log_json(true)
            .log_dir("/var/log/sql-job-gateway")
            .build_unchecked();

        let logging = LoggingConfig::from_gateway(&config);
        assert_eq!(logging.level, Level::DEBUG);
        assert!(logging.json);
        assert_eq!(
            logging.log_dir,
            Some(PathBuf::from("/var/log/sql-job-gateway"))
        );
        assert_eq!(
            logging.directives(),
            "sql_job_gateway=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_defaults_to_info_on_stdout() {
        let logging = LoggingConfig::from_gateway(&GatewayConfig::default());
        assert_eq!(logging.level, Level::INFO);
        assert!(!logging.json);
        assert!(logging.log_dir.is_none());
    }
}
