#![forbid(unsafe_code)]

use crate::model::{ProjectRole, StageStatus};

/// Stage fields the policy needs to decide a transition. Snapshots are read
/// inside the same transaction that will apply the resulting plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageSnapshot {
    pub id: String,
    pub order: i64,
    pub status: StageStatus,
    pub assignee_id: Option<String>,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
}

/// The requesting user, already resolved to a project member. Tests build
/// these directly; there is no ambient bypass identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: ProjectRole,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: ProjectRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ProjectRole::Admin
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionError {
    /// The immediately preceding stage exists and is not `done`.
    PredecessorIncomplete,
    /// Completion requested by someone who is neither a project admin nor
    /// the stage's assignee.
    Forbidden,
}

/// Downstream side effect of a committed transition. Applied in the same
/// transaction as the stage update itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cascade {
    /// Force every stage with a higher order to `blocked` and clear their
    /// timestamps. Emitted for every non-`done` target.
    BlockAfter { order: i64 },
    /// Start the stage at exactly this order if it is currently `blocked`.
    /// One hop only; stages beyond it are untouched.
    UnlockNext { order: i64 },
}

/// New field values for the target stage plus the cascade to run. The plan
/// never touches sibling stages directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    pub status: StageStatus,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
    pub cascade: Cascade,
}

/// True when the stage at `order` may move forward: either it is the first
/// stage or the sibling at `order - 1` is `done`.
pub fn predecessor_done(siblings: &[StageSnapshot], order: i64) -> bool {
    match siblings.iter().find(|s| s.order == order - 1) {
        None => true,
        Some(prev) => prev.status == StageStatus::Done,
    }
}

/// Decide a status change for one stage.
///
/// Rules, in order:
/// - moving anywhere except `blocked` requires the predecessor to be `done`;
/// - moving to `done` requires an admin actor or the stage's own assignee;
/// - `started_at_ms` is set on the first move to `in_progress` and then
///   kept; `finished_at_ms` likewise on the first move to `done`. The plan
///   only ever sets the target stage's own timestamps — clearing happens
///   downstream via [`Cascade::BlockAfter`].
pub fn plan_transition(
    stage: &StageSnapshot,
    target: StageStatus,
    actor: &Actor,
    siblings: &[StageSnapshot],
    now_ms: i64,
) -> Result<TransitionPlan, TransitionError> {
    if target != StageStatus::Blocked && !predecessor_done(siblings, stage.order) {
        return Err(TransitionError::PredecessorIncomplete);
    }

    if target == StageStatus::Done
        && !actor.is_admin()
        && stage.assignee_id.as_deref() != Some(actor.user_id.as_str())
    {
        return Err(TransitionError::Forbidden);
    }

    let started_at_ms = match target {
        StageStatus::InProgress if stage.started_at_ms.is_none() => Some(now_ms),
        _ => stage.started_at_ms,
    };
    let finished_at_ms = match target {
        StageStatus::Done if stage.finished_at_ms.is_none() => Some(now_ms),
        _ => stage.finished_at_ms,
    };

    let cascade = if target == StageStatus::Done {
        Cascade::UnlockNext {
            order: stage.order + 1,
        }
    } else {
        Cascade::BlockAfter { order: stage.order }
    };

    Ok(TransitionPlan {
        status: target,
        started_at_ms,
        finished_at_ms,
        cascade,
    })
}
