#![forbid(unsafe_code)]

use st_core::workflow::TransitionError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    /// A project with the requested id already exists.
    ProjectExists,
    /// A user already holds the named unique field ("email" / "username").
    UserExists(&'static str),
    UnknownProject,
    UnknownStage,
    UnknownUser,
    /// The actor's role does not allow the operation.
    Forbidden,
    /// Assignee target exists but holds no membership in the project.
    NotAMember,
    /// Advance rule: the preceding stage is not done.
    PredecessorIncomplete,
    /// The sole remaining admin may not leave the project.
    LastAdmin,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::ProjectExists => write!(f, "project id already exists"),
            Self::UserExists(field) => write!(f, "user {field} already exists"),
            Self::UnknownProject => write!(f, "unknown project"),
            Self::UnknownStage => write!(f, "unknown stage"),
            Self::UnknownUser => write!(f, "unknown user"),
            Self::Forbidden => write!(f, "operation not allowed for this role"),
            Self::NotAMember => write!(f, "user is not a project member"),
            Self::PredecessorIncomplete => {
                write!(f, "previous stage must be done before this transition")
            }
            Self::LastAdmin => write!(f, "the last admin cannot leave the project"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<TransitionError> for StoreError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::PredecessorIncomplete => Self::PredecessorIncomplete,
            TransitionError::Forbidden => Self::Forbidden,
        }
    }
}
