//! Logging subsystem.

mod manager;
mod types;


pub use manager::{init, LoggingError};
pub use types::{FileLoggingConfig, LogFormat, LoggerConfig, StdoutConfig};

pub use tracing_appender::rolling::Rotation;
