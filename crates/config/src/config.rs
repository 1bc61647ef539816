use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LoggingConfig, SequencerConfig, VerifierConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sequencer: SequencerConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sequencer.validate()?;
        self.verifier.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zkseq_common::{logging::LogFormat, Address};

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sequencer.block_seal_time_ms, 6_000);
        assert_eq!(config.sequencer.batch_seal_time_ms, 12_000);
        assert_eq!(config.sequencer.max_batch_l2_data_bytes, 120_000);
        assert_eq!(config.sequencer.effective_gas_percentage, 255);
        assert_eq!(config.verifier.staleness_timeout_secs, 1_800);
        assert_eq!(config.verifier.timestamp_limit_margin_secs, 300);
        assert!(!config.verifier.has_executors());
    }

    #[test]
    fn test_config_load() {
        let config_string = r#"
            [sequencer]
            block_seal_time_ms = 3000
            yield_size = 20
            coinbase = "0x1111111111111111111111111111111111111111"
            l1_recovery = true

            [verifier]
            executor_urls = ["http://exec-1:50071", "http://exec-2:50071"]
            staleness_timeout_secs = 60

            [logging]
            json = true
            log_dir = "/var/log/zkseq"
        "#;

        let config = Config::from_toml_str(config_string).unwrap();
        assert_eq!(config.sequencer.block_seal_time_ms, 3_000);
        assert_eq!(config.sequencer.batch_seal_time_ms, 12_000);
        assert_eq!(config.sequencer.yield_size, 20);
        assert_eq!(config.sequencer.coinbase, Address::repeat_byte(0x11));
        assert!(config.sequencer.l1_recovery);
        assert_eq!(config.verifier.executor_urls.len(), 2);
        assert_eq!(config.verifier.staleness_timeout().as_secs(), 60);

        let logger = config.logging.to_logger_config();
        assert_eq!(logger.stdout.format, LogFormat::Json);
        let file = logger.file.unwrap();
        assert_eq!(file.prefix, "zkseq");
        assert_eq!(file.format, LogFormat::Json);
    }

    #[test]
    fn test_config_rejects_zero_seal_time() {
        let err = Config::from_toml_str("[sequencer]\nbatch_seal_time_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_config_rejects_malformed_toml() {
        let err = Config::from_toml_str("[sequencer\nyield_size = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verifier]\ndrain_poll_interval_ms = 5").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.verifier.drain_poll_interval().as_millis(), 5);

        let err = Config::load("/nonexistent/zkseq.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
