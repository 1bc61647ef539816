use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zkseq_common::logging::{FileLoggingConfig, LogFormat, LoggerConfig};

const DEFAULT_SERVICE_NAME: &str = "zkseq";

const DEFAULT_DIRECTIVE: &str = "info";

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_owned()
}

fn default_directive() -> String {
    DEFAULT_DIRECTIVE.to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_directive")]
    pub directive: String,

    #[serde(default)]
    pub json: bool,

    /// Directory for rolling log files. File logging is off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            directive: default_directive(),
            json: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn to_logger_config(&self) -> LoggerConfig {
        let format = if self.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };
        let config = LoggerConfig::new(self.service_name.clone())
            .with_default_directive(self.directive.clone())
            .with_stdout_format(format);
        match &self.log_dir {
            Some(dir) => config.with_file(
                FileLoggingConfig::daily(dir.clone(), self.service_name.clone()).with_format(format),
            ),
            None => config,
        }
    }
}
