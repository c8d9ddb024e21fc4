//! # Error Types
//!
//! Error types shared by every certificate source, installer and state backend.

/// Custom result type for certforgot operations
pub type Result<T> = std::result::Result<T, CertforgotError>;

/// Main error type for certforgot
#[derive(thiserror::Error, Debug)]
pub enum CertforgotError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Malformed certificate, key or document content
    #[error("Parse error: {context}: {message}")]
    Parse { message: String, context: String },

    /// Key or certificate material could not be encoded for a backend
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Backend rejected the caller's credentials
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Transport failures: connect, send, unexpected status
    #[error("Network error: {context}: {message}")]
    Network { message: String, context: String },

    /// A TLS-only operation completed without a TLS layer
    #[error("Connection to '{url}' was not encrypted")]
    Insecure { url: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound {
        resource_type: String,
        id: String,
    },

    /// Resource conflict errors (e.g., concurrent insert of the singleton state row)
    #[error("Resource conflict: {message}")]
    Conflict {
        message: String,
        resource_type: String,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Timeout errors
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CertforgotError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an I/O error with context
    pub fn io<C: Into<String>>(source: std::io::Error, context: C) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    /// Create a parse error for content found at `context`
    pub fn parse<M: Into<String>, C: Into<String>>(message: M, context: C) -> Self {
        Self::Parse {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an encode error
    pub fn encode<S: Into<String>>(message: S) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<M: Into<String>, C: Into<String>>(message: M, context: C) -> Self {
        Self::Network {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an insecure-connection error
    pub fn insecure<S: Into<String>>(url: S) -> Self {
        Self::Insecure { url: url.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict {
            message: message.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Prefix the error's context with the operation that produced it
    pub fn with_context<C: Into<String>>(mut self, context: C) -> Self {
        let context = context.into();
        match &mut self {
            CertforgotError::Io { context: ctx, .. }
            | CertforgotError::Database { context: ctx, .. }
            | CertforgotError::Serialization { context: ctx, .. }
            | CertforgotError::Parse { context: ctx, .. }
            | CertforgotError::Network { context: ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            _ => {}
        }
        self
    }

    /// True for a missing resource, as opposed to a backend failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, CertforgotError::NotFound { .. })
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CertforgotError::Database { .. }
                | CertforgotError::Network { .. }
                | CertforgotError::Timeout { .. }
                | CertforgotError::Conflict { .. }
        )
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for CertforgotError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database {
            source: error,
            context: "Database operation failed".to_string(),
        }
    }
}

impl From<std::io::Error> for CertforgotError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            source: error,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl From<serde_json::Error> for CertforgotError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            source: error,
            context: "JSON serialization failed".to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CertforgotError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::parse(error.to_string(), "YAML document")
    }
}

impl From<reqwest::Error> for CertforgotError {
    fn from(error: reqwest::Error) -> Self {
        let context = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "HTTP request".to_string());
        if error.is_timeout() {
            return Self::timeout(context, 0);
        }
        Self::network(error.to_string(), context)
    }
}

impl From<config::ConfigError> for CertforgotError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for CertforgotError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages(&errors, "", &mut messages);
        messages.sort();
        Self::validation(format!("Validation failed: {}", messages.join("; ")))
    }
}

/// Flatten nested validation errors into `path.to.field: message` entries
fn collect_validation_messages(errors: &validator::ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{}.{}", prefix, field) };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
                    .collect();
                out.push(format!("{}: {}", path, error_messages.join(", ")));
            }
            ValidationErrorsKind::Struct(nested) => collect_validation_messages(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_messages(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}
