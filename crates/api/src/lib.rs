#![forbid(unsafe_code)]

mod error;
mod service;
mod time;
mod views;

pub use error::{ApiError, ErrorKind};
pub use service::{ProjectService, RegisterUserRequest};
pub use views::{EventView, MemberView, ProjectSummaryView, ProjectView, StageView, UserView};

// Stage specs at project creation are passed straight through to storage.
pub use st_storage::NewStage;
