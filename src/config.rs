use crate::event::LogLevel;
use serde::Deserialize;
use std::path::PathBuf;

/// Error raised while validating configuration values.
///
/// Configuration problems are reported once at startup/first use and never
/// prevent instrumented calls from executing.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid max-size value: {0}")]
    InvalidMaxSize(String),
}

/// Default layout for file-sink lines. Tokens: `%d{..}` timestamp,
/// `%p` level, `%X{status}`/`%X{class}`/`%X{method}` event fields,
/// `%m` message, `%n` newline.
pub const DEFAULT_FILE_PATTERN: &str =
    "[%d{yyyy-MM-dd HH:mm:ss}] [%p] [%X{status}] [%X{class}#%X{method}] - %m%n";

/// Settings for the dedicated rolling log file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogFileConfig {
    /// Whether the dedicated file sink is active.
    pub enabled: bool,
    /// Directory holding the active file and its archives.
    pub path: PathBuf,
    pub filename: String,
    /// Size threshold before rotation, e.g. "10MB", "512KB" or a plain
    /// byte count.
    pub max_size: String,
    /// Number of archived segments retained; oldest pruned first.
    pub max_history: usize,
    /// Line layout, see [`DEFAULT_FILE_PATTERN`].
    pub pattern: String,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        LogFileConfig {
            enabled: true,
            path: PathBuf::from("./logs"),
            filename: "kafka-logging.log".to_string(),
            max_size: "10MB".to_string(),
            max_history: 7,
            pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

impl LogFileConfig {
    /// Parse `max_size` into bytes. Accepts `KB`/`MB`/`GB` suffixes
    /// (case-insensitive, optional space) or a bare byte count.
    pub fn max_size_bytes(&self) -> Result<u64, ConfigError> {
        parse_size(&self.max_size)
            .ok_or_else(|| ConfigError::InvalidMaxSize(self.max_size.clone()))
    }
}

fn parse_size(raw: &str) -> Option<u64> {
    let s = raw.trim();
    let upper = s.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("GB") {
        (d, 1024 * 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("MB") {
        (d, 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("KB") {
        (d, 1024)
    } else if let Some(d) = upper.strip_suffix('B') {
        (d, 1)
    } else {
        (upper.as_str(), 1)
    };
    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(multiplier)
}

/// The declarative method-selection rule set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MethodSelectionConfig {
    /// Qualified-name wildcard patterns to include.
    pub include_patterns: Vec<String>,
    /// Qualified-name wildcard patterns to exclude. Exclusion always wins.
    pub exclude_patterns: Vec<String>,
    /// Exact class names (the part before the final `.`) to include.
    pub include_classes: Vec<String>,
    /// Package prefixes to include.
    pub include_packages: Vec<String>,
}

/// Top-level configuration, constructed once at process start and shared
/// by reference. No component mutates it afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Master switch; when false every wrapper is a transparent no-op.
    pub enabled: bool,
    /// Default severity for events produced without an explicit level.
    pub log_level: LogLevel,
    /// Legacy flat pattern list, evaluated when the rule set yields no
    /// verdict.
    pub predefined_methods: Vec<String>,
    /// When false, message payloads are left out of captured contexts.
    pub include_payload: bool,
    pub mask_sensitive_data: bool,
    /// Route events through a bounded queue and background writer task
    /// instead of appending in-line.
    pub async_logging: bool,
    /// Field names whose values are masked before capture.
    pub sensitive_fields: Vec<String>,
    pub masking_char: char,
    pub log_file: LogFileConfig,
    pub method_selection: MethodSelectionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enabled: true,
            log_level: LogLevel::Info,
            predefined_methods: Vec::new(),
            include_payload: true,
            mask_sensitive_data: true,
            async_logging: false,
            sensitive_fields: Vec::new(),
            masking_char: '*',
            log_file: LogFileConfig::default(),
            method_selection: MethodSelectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_suffixes() {
        assert_eq!(parse_size("10MB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("512KB"), Some(512 * 1024));
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("2048"), Some(2048));
        assert_eq!(parse_size("64 kb"), Some(64 * 1024));
        assert_eq!(parse_size("64B"), Some(64));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.async_logging);
        assert_eq!(config.masking_char, '*');
        assert_eq!(config.log_file.filename, "kafka-logging.log");
        assert_eq!(config.log_file.max_history, 7);
        assert_eq!(config.log_file.max_size_bytes().unwrap(), 10 * 1024 * 1024);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{
                "log_level": "DEBUG",
                "method_selection": { "include_patterns": ["*process*"] },
                "log_file": { "max_size": "1KB", "max_history": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.method_selection.include_patterns, vec!["*process*"]);
        assert_eq!(config.log_file.max_size_bytes().unwrap(), 1024);
        assert!(config.enabled);
    }

    #[test]
    fn invalid_max_size_is_a_config_error() {
        let mut file = LogFileConfig::default();
        file.max_size = "huge".to_string();
        assert!(file.max_size_bytes().is_err());
    }
}
