//! Error handling module for tfwrap
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the application should use these types for consistency.

use thiserror::Error;

/// Main error type for tfwrap
#[derive(Error, Debug)]
pub enum TfwrapError {
    /// IO errors (file operations, cache directory, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file errors (loading, parsing)
    #[error("could not load config file {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Template rendering errors, including undefined references
    #[error("template rendering failed for {context}: {reason}")]
    TemplateRender { context: String, reason: String },

    /// A parameter declared as required was not supplied
    #[error("required parameter not set: {0}")]
    RequiredParameter(String),

    /// A required parameter was supplied with a value outside its allow-list
    #[error("value {value:?} is not allowed for parameter {param:?}, allowed values: {allowed:?}")]
    DisallowedValue {
        param: String,
        value: String,
        allowed: Vec<String>,
    },

    /// The computed module-directory parameter was supplied explicitly
    #[error("parameter {0:?} is reserved and must not be set")]
    ReservedParameter(String),

    /// A resolved var file path is unusable or points to a missing file
    #[error("var file error: {0}")]
    VarFilePath(String),

    /// The persisted backend no longer matches the resolved configuration
    #[error("configured backend does not match the current configuration:\n{report}\nRun terraform init -reconfigure!")]
    BackendDrift { report: String },

    /// Downloading an installation artifact failed
    #[error("could not download {url}: {reason}")]
    InstallDownload { url: String, reason: String },

    /// Signature verification failed against every configured public key
    #[error("signature verification failed against all configured keys:\n{0}")]
    SignatureVerification(String),

    /// The downloaded archive does not match the checksum manifest
    #[error("checksum verification failed: {0}")]
    ChecksumVerification(String),

    /// Unpacking the downloaded archive failed
    #[error("could not extract archive: {0}")]
    Extraction(String),

    /// Spawning or waiting on the external tool failed
    #[error("terraform execution failed: {0}")]
    Execution(String),

    /// JSON errors (backend descriptor parsing)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for tfwrap operations
pub type Result<T> = std::result::Result<T, TfwrapError>;

// Convenient error constructors
impl TfwrapError {
    /// Create a config load error
    pub fn config_load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a template rendering error
    pub fn template(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::TemplateRender {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a var file path error
    pub fn var_file(msg: impl Into<String>) -> Self {
        Self::VarFilePath(msg.into())
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InstallDownload {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a checksum verification error
    pub fn checksum(msg: impl Into<String>) -> Self {
        Self::ChecksumVerification(msg.into())
    }

    /// Create an extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_parameter_display() {
        let err = TfwrapError::RequiredParameter("environment".to_string());
        assert_eq!(err.to_string(), "required parameter not set: environment");
    }

    #[test]
    fn test_disallowed_value_names_everything() {
        let err = TfwrapError::DisallowedValue {
            param: "environment".to_string(),
            value: "staging".to_string(),
            allowed: vec!["dev".to_string(), "prod".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("environment"));
        assert!(msg.contains("staging"));
        assert!(msg.contains("dev"));
        assert!(msg.contains("prod"));
    }

    #[test]
    fn test_backend_drift_carries_report() {
        let err = TfwrapError::BackendDrift {
            report: "key: got=a, want=b".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("key: got=a, want=b"));
        assert!(msg.contains("Run terraform init -reconfigure!"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TfwrapError = io_err.into();
        assert!(matches!(err, TfwrapError::Io(_)));
    }
}
