use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Setting key or argument that caused the error (e.g., "apiKey", "args[0]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "config_store", "function_table")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the add-in core.
///
/// Per-candidate relay failures never show up here; they are recovered inside the
/// dispatcher and only surface as [`Error::AllRelaysExhausted`] once every candidate failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("{message}")]
    MissingConfiguration {
        missing: Vec<String>,
        message: String,
    },

    #[error("Invalid parameter: {message}{}", format_context(.context))]
    InvalidParameter {
        message: String,
        context: ErrorContext,
    },

    #[error("All relay candidates exhausted after {attempts} attempt(s); last failure: {last_failure}")]
    AllRelaysExhausted {
        attempts: usize,
        last_failure: String,
        /// HTTP status of the last attempt, when it got that far.
        last_status: Option<u16>,
    },

    #[error("Malformed provider response: {reason}; raw body: {body}")]
    MalformedProviderResponse { reason: String, body: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request cancelled")]
    Cancelled,
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Error::MissingRequiredField {
            field: field.into(),
        }
    }

    /// The single user-actionable error: tells the caller which settings to populate.
    pub fn missing_configuration(missing: Vec<String>) -> Self {
        let message = format!(
            "Missing configuration: {}. Open the add-in settings and enter your Knowledge Model ID and API key.",
            missing.join(", ")
        );
        Error::MissingConfiguration { missing, message }
    }

    pub fn invalid_parameter_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidParameter {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn malformed_response(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Error::MalformedProviderResponse {
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidParameter { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether the failure happened before any network traffic was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingRequiredField { .. }
                | Error::MissingConfiguration { .. }
                | Error::InvalidParameter { .. }
                | Error::UnknownFunction { .. }
        )
    }
}
