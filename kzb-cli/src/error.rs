//! CLI error types.

use std::fmt;

use kzb::config::ConfigError;
use kzb::logging::LoggingError;
use kzb::DirectoryError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Loading or querying the directory failed.
    Directory(DirectoryError),

    /// Configuration error.
    Config(String),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// No container was given on the command line.
    NoContainers,

    /// Invalid glob pattern.
    Pattern(glob::PatternError),

    /// Writing output failed.
    Output(std::io::Error),

    /// JSON serialization failed.
    Json(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Directory(e) => write!(f, "{}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::NoContainers => write!(
                f,
                "No containers given. Use --container <file> or --list <file>."
            ),
            CliError::Pattern(e) => write!(f, "Invalid pattern: {}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
            CliError::Json(e) => write!(f, "Failed to serialize JSON: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Directory(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Pattern(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Config(_) | CliError::NoContainers => None,
        }
    }
}

impl From<DirectoryError> for CliError {
    fn from(e: DirectoryError) -> Self {
        CliError::Directory(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<glob::PatternError> for CliError {
    fn from(e: glob::PatternError) -> Self {
        CliError::Pattern(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("bad key".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad key"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_directory_error_keeps_source() {
        let err: CliError = DirectoryError::FileNotFound("A/x".to_string()).into();
        assert!(matches!(err, CliError::Directory(_)));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "File not found: A/x");
    }

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::UnknownKey("nope".to_string()).into();
        assert!(matches!(err, CliError::Config(_)));
    }
}
