use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed playbook document, raised before a run begins
    #[error("Load error: {0}")]
    Load(String),

    /// Action tree contains a kind the dispatcher does not handle
    #[error("Unknown action type: {0}")]
    UnknownActionKind(String),

    /// Condition expression could not be evaluated against the context
    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluation(String),

    /// A code_eval body raised
    #[error("Code execution failed: {0}")]
    CodeExecution(String),

    /// external_call reached an engine built without a gateway
    #[error("Integration manager not configured")]
    IntegrationNotConfigured,

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage backend errors
    #[error("Database error: {0}")]
    Database(String),

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Load(_) => "LOAD_ERROR",
            AppError::UnknownActionKind(_) => "UNKNOWN_ACTION_KIND",
            AppError::ConditionEvaluation(_) => "CONDITION_EVALUATION_ERROR",
            AppError::CodeExecution(_) => "CODE_EXECUTION_ERROR",
            AppError::IntegrationNotConfigured => "INTEGRATION_NOT_CONFIGURED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from serde_yaml::Error
impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
