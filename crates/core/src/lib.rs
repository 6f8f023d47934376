#![forbid(unsafe_code)]

pub mod workflow;

pub mod ids {
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ProjectId(String);

    impl ProjectId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, ProjectIdError> {
            let value = value.into();
            validate_project_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ProjectIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    fn validate_project_id(value: &str) -> Result<(), ProjectIdError> {
        if value.is_empty() {
            return Err(ProjectIdError::Empty);
        }
        if value.len() > 128 {
            return Err(ProjectIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(ProjectIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(ProjectIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(ProjectIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Workflow state of a single stage. Exactly one of these three values
    /// is ever persisted; unknown strings are rejected at the boundary.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum StageStatus {
        Blocked,
        InProgress,
        Done,
    }

    impl StageStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                StageStatus::Blocked => "blocked",
                StageStatus::InProgress => "in_progress",
                StageStatus::Done => "done",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "blocked" => Some(StageStatus::Blocked),
                "in_progress" => Some(StageStatus::InProgress),
                "done" => Some(StageStatus::Done),
                _ => None,
            }
        }
    }

    /// Project-scoped role. `Admin` has full control over the project;
    /// `Executor` may only move work it is allowed to touch.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ProjectRole {
        Admin,
        Executor,
    }

    impl ProjectRole {
        pub fn as_str(self) -> &'static str {
            match self {
                ProjectRole::Admin => "admin",
                ProjectRole::Executor => "executor",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "admin" => Some(ProjectRole::Admin),
                "executor" => Some(ProjectRole::Executor),
                _ => None,
            }
        }
    }

    /// Account-level role. Carried on the user record for the outer auth
    /// layer; grants no per-project privileges.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum GlobalRole {
        Admin,
        User,
    }

    impl GlobalRole {
        pub fn as_str(self) -> &'static str {
            match self {
                GlobalRole::Admin => "admin",
                GlobalRole::User => "user",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "admin" => Some(GlobalRole::Admin),
                "user" => Some(GlobalRole::User),
                _ => None,
            }
        }
    }
}

pub mod duration {
    use crate::workflow::StageSnapshot;

    /// Elapsed time for one stage. Unstarted stages report zero; a running
    /// stage is measured against `now_ms`; clock skew never produces a
    /// negative value.
    pub fn stage_duration_ms(
        started_at_ms: Option<i64>,
        finished_at_ms: Option<i64>,
        now_ms: i64,
    ) -> i64 {
        let Some(started) = started_at_ms else {
            return 0;
        };
        let end = finished_at_ms.unwrap_or(now_ms);
        (end - started).max(0)
    }

    /// Total time across a project's stages. Derived at read time, never
    /// persisted.
    pub fn project_duration_ms(stages: &[StageSnapshot], now_ms: i64) -> i64 {
        stages
            .iter()
            .map(|s| stage_duration_ms(s.started_at_ms, s.finished_at_ms, now_ms))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::ids::{ProjectId, ProjectIdError};
    use super::model::{ProjectRole, StageStatus};

    #[test]
    fn project_id_validation() {
        assert_eq!(ProjectId::try_new("").unwrap_err(), ProjectIdError::Empty);
        assert_eq!(
            ProjectId::try_new("-leading").unwrap_err(),
            ProjectIdError::InvalidFirstChar
        );
        assert_eq!(
            ProjectId::try_new("has space").unwrap_err(),
            ProjectIdError::InvalidChar { ch: ' ', index: 3 }
        );
        assert_eq!(
            ProjectId::try_new("x".repeat(129)).unwrap_err(),
            ProjectIdError::TooLong
        );
        assert!(ProjectId::try_new("site-redesign.v2").is_ok());
    }

    #[test]
    fn stage_status_round_trip() {
        for status in [
            StageStatus::Blocked,
            StageStatus::InProgress,
            StageStatus::Done,
        ] {
            assert_eq!(StageStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(StageStatus::parse("paused"), None);
        assert_eq!(StageStatus::parse("IN_PROGRESS"), None);
    }

    #[test]
    fn project_role_round_trip() {
        assert_eq!(ProjectRole::parse("admin"), Some(ProjectRole::Admin));
        assert_eq!(ProjectRole::parse("executor"), Some(ProjectRole::Executor));
        assert_eq!(ProjectRole::parse("owner"), None);
    }
}
