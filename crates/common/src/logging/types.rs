//! Settings of the logging subsystem.

use std::path::PathBuf;

use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::FmtSpan;

/// Line format of a log sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Stdout sink.
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    pub format: LogFormat,
    /// Span lifecycle events written alongside regular events.
    pub span_events: FmtSpan,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            span_events: FmtSpan::NONE,
        }
    }
}

/// Rolling file sink. Files are named `<prefix>.<period>` inside
/// `directory`.
#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub rotation: Rotation,
    pub format: LogFormat,
}

impl FileLoggingConfig {
    /// Daily rotated compact logs.
    pub fn daily(directory: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            directory,
            prefix: prefix.into(),
            rotation: Rotation::DAILY,
            format: LogFormat::Compact,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub service_name: String,
    pub service_version: Option<String>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_directive: String,
    pub stdout: StdoutConfig,
    pub file: Option<FileLoggingConfig>,
}

impl LoggerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: None,
            default_directive: "info".to_owned(),
            stdout: StdoutConfig::default(),
            file: None,
        }
    }

    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    pub fn with_stdout_format(mut self, format: LogFormat) -> Self {
        self.stdout.format = format;
        self
    }

    pub fn with_span_events(mut self, span_events: FmtSpan) -> Self {
        self.stdout.span_events = span_events;
        self
    }

    pub fn with_file(mut self, file: FileLoggingConfig) -> Self {
        self.file = Some(file);
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("zkseq")
    }
}
