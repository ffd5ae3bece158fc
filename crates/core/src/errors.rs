use thiserror::Error;

/// A failure that ends the current request with a specific HTTP status.
///
/// Every layer of the slash pipeline returns this (or converts into it) so the
/// HTTP boundary can write exactly one response per request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    Internal(String),
    #[error("{message}")]
    Status { code: u16, message: String },
}

impl RequestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Builds an error carrying an arbitrary status. Well-known codes collapse
    /// into their named variants; anything outside the 4xx/5xx range is treated
    /// as an internal error since it cannot describe a failure.
    pub fn with_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            405 => Self::MethodNotAllowed(message),
            500 => Self::Internal(message),
            400..=599 => Self::Status { code, message },
            _ => Self::Internal(message),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::MethodNotAllowed(_) => 405,
            Self::Internal(_) => 500,
            Self::Status { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::MethodNotAllowed(message)
            | Self::Internal(message)
            | Self::Status { message, .. } => message,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
