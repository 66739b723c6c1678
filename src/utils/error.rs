use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No result found: {what}")]
    NotFound { what: String },

    #[error("Expected {expected} row(s) but the backend returned {actual}")]
    Multiplicity { expected: usize, actual: usize },

    #[error("Backend error: {0}")]
    BackendError(#[from] rusqlite::Error),

    #[error("Row mapping error: {message}")]
    RowMapping { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lookup,
    Backend,
    Mapping,
    Io,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl QueryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn row_mapping(message: impl Into<String>) -> Self {
        Self::RowMapping {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::Multiplicity { .. } => ErrorCategory::Lookup,
            Self::BackendError(_) => ErrorCategory::Backend,
            Self::RowMapping { .. } | Self::SerializationError(_) => ErrorCategory::Mapping,
            Self::IoError(_) | Self::CsvError(_) => ErrorCategory::Io,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lookup => ErrorSeverity::Low,
            ErrorCategory::Mapping => ErrorSeverity::Medium,
            ErrorCategory::Io | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Backend => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Check that the table holds rows matching the given parameters",
            Self::Multiplicity { .. } => {
                "Several rows tie; use the lowest_id tie policy or narrow the lookup"
            }
            Self::BackendError(_) => "Check the database path and that the file is a valid SQLite database",
            Self::RowMapping { .. } => "Check that the std table matches the expected column types",
            Self::IoError(_) => "Check file paths and permissions",
            Self::CsvError(_) => "Check that the CSV file has name,age,address,phone headers",
            Self::SerializationError(_) => "Report this as a bug",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => "Fix the configuration file or command line flags",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::NotFound { what } => format!("Nothing found: {}", what),
            Self::Multiplicity { actual, .. } => {
                format!("Expected exactly one student but found {}", actual)
            }
            Self::BackendError(e) => format!("Database failure: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
