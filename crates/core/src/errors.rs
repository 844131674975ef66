use serde::Serialize;
use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    InvalidTransition(#[from] FlowTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("inquiry `{inquiry_id}` was modified concurrently; reload it and retry the action")]
    ConcurrentModification { inquiry_id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Stable error classification shared with tool callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    NotFound,
    InvalidTransition,
    ConcurrentModification,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFound",
            Self::InvalidTransition => "InvalidTransition",
            Self::ConcurrentModification => "ConcurrentModification",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::Internal => "Internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::Validation(_)) => ErrorKind::Validation,
            Self::Domain(DomainError::InvalidTransition(_)) => ErrorKind::InvalidTransition,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Self::Persistence(_) | Self::Integration(_) => ErrorKind::UpstreamUnavailable,
            Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Validation(message.into()))
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<FlowTransitionError> for ApplicationError {
    fn from(value: FlowTransitionError) -> Self {
        Self::Domain(DomainError::InvalidTransition(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { kind: ErrorKind, message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist or is not visible.",
            Self::Conflict { .. } => {
                "The inquiry changed while this request was in flight. Reload it and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { kind, .. } => *kind,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::ConcurrentModification,
            Self::ServiceUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Detail message safe to hand back to the calling agent.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let kind = value.kind();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(message)) => {
                Self::BadRequest { kind, message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvalidTransition(error)) => {
                Self::BadRequest { kind, message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::NotFound { .. } => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::ConcurrentModification { .. } => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(_) => Self::ServiceUnavailable {
                message: "the inquiry store is unavailable".to_owned(),
                correlation_id,
            },
            ApplicationError::Integration(_) => Self::ServiceUnavailable {
                message: "an upstream service is unavailable".to_owned(),
                correlation_id,
            },
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
