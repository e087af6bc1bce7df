//! Shared helpers for the Otto console: configuration, redaction and paths.

pub mod config;
pub mod path_processing;
pub mod redaction;

pub use config::{ConfigError, ConsoleConfig, default_config_path};
pub use path_processing::expand_tilde;
pub use redaction::{REDACTED, mask_provider_config, redact_json, redact_sensitive, redact_sensitive_with};
