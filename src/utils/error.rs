use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Control error: {message}")]
    ControlError { message: String },

    #[error("Safety trip: {}", violations.join("; "))]
    SafetyTrip { violations: Vec<String> },

    #[error("Communication error ({server}): {message}")]
    CommunicationError { server: String, message: String },

    #[error("Document error: {message}")]
    DocumentError { message: String },
}

/// 錯誤類別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Data,
    Configuration,
    Control,
    Safety,
    Communication,
    Documentation,
}

/// 錯誤嚴重程度，決定 CLI 的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalyzerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalyzerError::IoError(_) => ErrorCategory::Io,
            AnalyzerError::CsvError(_) | AnalyzerError::SerializationError(_) => ErrorCategory::Data,
            AnalyzerError::ConfigError { .. }
            | AnalyzerError::ConfigValidationError { .. }
            | AnalyzerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AnalyzerError::ControlError { .. } => ErrorCategory::Control,
            AnalyzerError::SafetyTrip { .. } => ErrorCategory::Safety,
            AnalyzerError::CommunicationError { .. } => ErrorCategory::Communication,
            AnalyzerError::DocumentError { .. } => ErrorCategory::Documentation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Documentation => ErrorSeverity::Low,
            ErrorCategory::Communication | ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Control | ErrorCategory::Io => {
                ErrorSeverity::High
            }
            ErrorCategory::Safety => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Io => "Check that the workspace directories exist and are writable",
            ErrorCategory::Data => "Inspect the process data log for malformed rows",
            ErrorCategory::Configuration => {
                "Review the TOML configuration file and fix the reported field"
            }
            ErrorCategory::Control => "Verify controller tuning and field I/O before restarting",
            ErrorCategory::Safety => {
                "Acknowledge the trip, correct the process condition and reset the safety system"
            }
            ErrorCategory::Communication => "Check the Modbus/OPC-UA server ports and restart",
            ErrorCategory::Documentation => "Fix the README.md markdown structure",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AnalyzerError::IoError(e) => format!("File system problem: {}", e),
            AnalyzerError::CsvError(e) => format!("Could not write process data: {}", e),
            AnalyzerError::SerializationError(e) => format!("Could not encode data: {}", e),
            AnalyzerError::ConfigError { message } => format!("Configuration problem: {}", message),
            AnalyzerError::ConfigValidationError { field, message } => {
                format!("Configuration field '{}' is invalid: {}", field, message)
            }
            AnalyzerError::InvalidConfigValueError { field, value, reason } => {
                format!("'{}' is not a valid value for '{}' ({})", value, field, reason)
            }
            AnalyzerError::ControlError { message } => format!("Controller problem: {}", message),
            AnalyzerError::SafetyTrip { violations } => {
                format!("Process tripped by the safety system: {}", violations.join(", "))
            }
            AnalyzerError::CommunicationError { server, message } => {
                format!("{} server problem: {}", server, message)
            }
            AnalyzerError::DocumentError { message } => format!("README problem: {}", message),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_trip_is_critical() {
        let err = AnalyzerError::SafetyTrip {
            violations: vec!["High inlet pressure: 40.0 bar".to_string()],
        };
        assert_eq!(err.category(), ErrorCategory::Safety);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("High inlet pressure"));
    }

    #[test]
    fn test_config_errors_share_category() {
        let parse = AnalyzerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: "expected `]`".to_string(),
        };
        let invalid = AnalyzerError::InvalidConfigValueError {
            field: "safety.max_pressure".to_string(),
            value: "-1".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(parse.category(), invalid.category());
        assert_eq!(parse.severity(), ErrorSeverity::High);
        assert!(invalid.user_friendly_message().contains("safety.max_pressure"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AnalyzerError = io.into();
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
