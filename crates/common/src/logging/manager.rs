//! Installation of the global subscriber.

use thiserror::Error;
use tracing::info;
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{
    filter::{EnvFilter, ParseError},
    fmt::layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    Layer, Registry,
};

use super::types::{LogFormat, LoggerConfig};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid filter directive: {0}")]
    Directive(#[from] ParseError),

    #[error("subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),

    #[error("failed to open log file: {0}")]
    File(#[from] InitError),
}

pub(super) fn build_filter(config: &LoggerConfig) -> Result<EnvFilter, ParseError> {
    let directive = config.default_directive.parse()?;
    Ok(EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy())
}

/// Installs stdout logging and, if configured, a rolling log file.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config)?;

    let stdout: BoxedLayer<Registry> = {
        let fmt = layer().with_span_events(config.stdout.span_events.clone());
        match config.stdout.format {
            LogFormat::Compact => fmt.compact().with_filter(filter.clone()).boxed(),
            LogFormat::Json => fmt.json().with_filter(filter.clone()).boxed(),
        }
    };

    let file = match &config.file {
        Some(file) => {
            let appender = RollingFileAppender::builder()
                .rotation(file.rotation.clone())
                .filename_prefix(&file.prefix)
                .build(&file.directory)?;
            let fmt = layer().with_writer(appender).with_ansi(false);
            let file: BoxedLayer<_> = match file.format {
                LogFormat::Compact => fmt.compact().with_filter(filter).boxed(),
                LogFormat::Json => fmt.json().with_filter(filter).boxed(),
            };
            Some(file)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout)
        .with(file)
        .try_init()?;

    info!(
        service_name = %config.service_name,
        service_version = ?config.service_version,
        "logging initialized"
    );
    Ok(())
}
