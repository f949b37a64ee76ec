//! Error types for the intake assistant.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// User input that cannot be accepted at the current step.
///
/// Always recovered locally: the step is re-prompted and the conversation
/// record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Input {input:?} is not a number")]
    NotANumber { input: String },

    #[error("Option {value} is outside 1..={max}")]
    OutOfRange { value: i64, max: usize },

    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Invalid full name")]
    InvalidName,

    #[error("Invalid RUT format")]
    InvalidRut,

    #[error("Invalid client number")]
    InvalidClientNumber,

    #[error("Expected a yes/no answer")]
    InvalidYesNo,

    #[error("Invalid selection entry {token:?}")]
    InvalidSelection { token: String },

    #[error("Selection is empty")]
    EmptySelection,

    #[error("An image (or an explicit skip) is expected at this step")]
    ImageRequired,

    #[error("No image was requested at this step")]
    ImageNotExpected,

    #[error("Image is empty")]
    EmptyImage,

    #[error("A submission is already in flight")]
    SubmissionInFlight,
}

/// Failures talking to the remote service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmissionError {
    #[error("{operation} failed: {reason}")]
    Transport { operation: String, reason: String },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} rejected by the service: {}", format_field_errors(.field_errors))]
    Rejected {
        operation: String,
        field_errors: Vec<FieldError>,
    },

    #[error("{operation} returned an unreadable response: {reason}")]
    MalformedResponse { operation: String, reason: String },

    /// The request could not be built locally; nothing was sent.
    #[error("{operation} could not be encoded: {reason}")]
    Encoding { operation: String, reason: String },
}

impl SubmissionError {
    /// Whether the service answered successfully but the body made no sense.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }

    pub fn operation(&self) -> &str {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::MalformedResponse { operation, .. }
            | Self::Encoding { operation, .. } => operation,
        }
    }
}

/// A field-level error reported by the remote service, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Field name as the service reported it (`None` for non-field errors).
    pub field: Option<String>,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
