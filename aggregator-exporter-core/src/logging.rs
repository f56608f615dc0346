//! Logging setup for the exporter.
//!
//! Console output is human-readable when `logging.debug` is set and JSON
//! lines otherwise. An optional [`LogCapture`] receives a plain-text copy of
//! everything logged so the run's own log can be exported as an artifact.

use crate::Result;
use crate::config::LoggingConfiguration;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Maps a configured level name to a filter directive.
///
/// Unknown names fall back to `info`.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "fatal" => "error",
        _ => "info",
    }
}

/// Shared in-memory copy of the log.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything captured so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Writer handed out by [`LogCapture`] for each event.
#[derive(Debug)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::other("log capture buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over `logging.log_level` when set.
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use aggregator_exporter_core::config::LoggingConfiguration;
/// use aggregator_exporter_core::logging::{LogCapture, init_logging};
///
/// let capture = LogCapture::new();
/// init_logging(&LoggingConfiguration::default(), Some(capture.clone()))
///     .expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LoggingConfiguration, capture: Option<LogCapture>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.log_level)));

    let capture_layer = capture.map(|capture| fmt::layer().with_writer(capture).with_ansi(false));

    let result = if config.debug {
        tracing_subscriber::registry()
            .with(filter)
            .with(capture_layer)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(capture_layer)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| {
        crate::error::ExporterError::configuration(format!("Failed to initialize logging: {}", e))
    })
}

#[cfg(test)]
mod tests {
    // Global initialization can only happen once per process, so these
    // tests use scoped subscribers.
    use super::*;

    #[test]
    fn test_level_directives() {
        let cases = [
            ("trace", "trace"),
            ("debug", "debug"),
            ("DEBUG", "debug"),
            ("info", "info"),
            ("warn", "warn"),
            ("warning", "warn"),
            ("error", "error"),
            ("fatal", "error"),
            ("", "info"),
            ("verbose", "info"),
        ];

        for (level, expected) in cases {
            assert_eq!(level_directive(level), expected, "level {:?}", level);
        }
    }

    #[test]
    fn test_capture_collects_events() {
        let capture = LogCapture::new();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(capture.clone())
                .with_ansi(false),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(table = "report", "Table exported");
        });

        let log = String::from_utf8(capture.contents()).unwrap();
        assert!(log.contains("Table exported"));
        assert!(log.contains("report"));
    }

    #[test]
    fn test_capture_respects_filter() {
        let capture = LogCapture::new();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(level_directive("error")))
            .with(fmt::layer().with_writer(capture.clone()).with_ansi(false));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hidden");
            tracing::error!("shown");
        });

        let log = String::from_utf8(capture.contents()).unwrap();
        assert!(!log.contains("hidden"));
        assert!(log.contains("shown"));
    }
}
