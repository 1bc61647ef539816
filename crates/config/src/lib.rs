//! Node configuration loaded from TOML.

mod config;
mod error;
mod logging;
mod sequencer;
mod verifier;

pub use config::Config;
pub use error::ConfigError;
pub use logging::LoggingConfig;
pub use sequencer::SequencerConfig;
pub use verifier::VerifierConfig;
