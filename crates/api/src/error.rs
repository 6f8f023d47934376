#![forbid(unsafe_code)]

use st_storage::StoreError;
use thiserror::Error;

/// Error category surfaced to callers. Transports map kinds to their own
/// status codes via [`ErrorKind::status_hint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    PredecessorIncomplete,
    Forbidden,
    NotAMember,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::PredecessorIncomplete => "predecessor_incomplete",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotAMember => "not_a_member",
            ErrorKind::Storage => "storage",
        }
    }

    pub fn status_hint(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InvalidInput => 400,
            ErrorKind::PredecessorIncomplete => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotAMember => 400,
            ErrorKind::Storage => 500,
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {message}", .kind.as_str())]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Io(_) | StoreError::Sql(_) => ErrorKind::Storage,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::ProjectExists | StoreError::UserExists(_) | StoreError::LastAdmin => {
                ErrorKind::Conflict
            }
            StoreError::UnknownProject | StoreError::UnknownStage | StoreError::UnknownUser => {
                ErrorKind::NotFound
            }
            StoreError::Forbidden => ErrorKind::Forbidden,
            StoreError::NotAMember => ErrorKind::NotAMember,
            StoreError::PredecessorIncomplete => ErrorKind::PredecessorIncomplete,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}
