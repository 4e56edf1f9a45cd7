use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostbookError {
    // HTTP ошибки
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Resource not found")]
    NotFound,

    // Ошибки сериализации/десериализации
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Ошибки до сетевого вызова
    #[error("Authorization required: {0}")]
    AuthorizationRequired(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A submission is already in flight for this list")]
    SubmissionInFlight,

    #[error("A user is already signed in for this session")]
    AlreadySignedIn,

    // Ошибки согласования локального состояния
    #[error("No {kind} with id {id} in the local collection")]
    UnknownEntry { kind: &'static str, id: i64 },

    #[error("Resource returned {kind} id {id} which is already present locally")]
    DuplicateId { kind: &'static str, id: i64 },

    #[error("Inconsistent response: {0}")]
    InconsistentResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification used by the view layer to decide how to surface a
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No current user; prompt for login, never retried.
    AuthorizationRequired,
    /// Transport error or non-2xx status; local state was left untouched.
    NetworkOrServer,
    /// Input rejected locally before any request was issued.
    Validation,
    /// Programmer error or a response that cannot be reconciled.
    Logic,
}

impl PostbookError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthorizationRequired(_) => ErrorKind::AuthorizationRequired,
            Self::HttpError(_)
            | Self::ServerError { .. }
            | Self::NotFound
            | Self::SerializationError(_) => ErrorKind::NetworkOrServer,
            Self::InvalidRequest(_) | Self::SubmissionInFlight | Self::ConfigError(_) => {
                ErrorKind::Validation
            }
            Self::AlreadySignedIn
            | Self::UnknownEntry { .. }
            | Self::DuplicateId { .. }
            | Self::InconsistentResponse(_) => ErrorKind::Logic,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_authorization_required(&self) -> bool {
        matches!(self, Self::AuthorizationRequired(_))
    }
}
