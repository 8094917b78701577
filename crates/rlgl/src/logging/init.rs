use std::io::Write;
use std::sync::Once;

use log::{Level, LevelFilter};

/// Logger configuration for hosts that have no logger of their own.
///
/// `env_filter` uses `env_logger` syntax ("warn", "rlgl=debug") and wins over
/// both `RUST_LOG` and `level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
    /// Prefix each line with a timestamp.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            level: LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
            timestamps: false,
        }
    }
}

static INIT: Once = Once::new();

/// Severity tag printed in front of every line, e.g. `WARNING: TEXTURE: ...`.
pub(crate) fn severity_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug | Level::Trace => "DEBUG",
    }
}

/// Installs `env_logger` as the global logger once.
///
/// Later calls are ignored, as is the call when the host installed another
/// logger first.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(config.level);
            }
        }

        builder.write_style(config.write_style);

        if config.timestamps {
            builder.format(|buf, record| {
                let ts = buf.timestamp_millis();
                writeln!(buf, "{ts} {}: {}", severity_tag(record.level()), record.args())
            });
        } else {
            builder.format(|buf, record| writeln!(buf, "{}: {}", severity_tag(record.level()), record.args()));
        }

        if builder.try_init().is_ok() {
            log::debug!("RLGL: logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tags() {
        assert_eq!(severity_tag(Level::Warn), "WARNING");
        assert_eq!(severity_tag(Level::Trace), "DEBUG");
        assert_eq!(severity_tag(Level::Error), "ERROR");
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig {
            env_filter: Some("debug".into()),
            ..Default::default()
        });
        init_logging(LoggingConfig::default());
        assert!(INIT.is_completed());
    }
}
