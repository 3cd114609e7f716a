//! Lifecycle state machine for content records.
//!
//! Validation is split from application: [`TransitionValidator::validate`]
//! plans a [`Transition`] against a snapshot of the record, and
//! [`Transition::apply`] performs it against whatever the store holds at
//! commit time. The store only runs `apply` when the status still matches the
//! snapshot, so a plan is never applied to a record in another state.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::domain::content::{
    ContentKind, ContentPatch, ContentRecord, ContentStatus, DeliveryIntent, NewContent,
};
use crate::domain::error::TransitionError;

pub const DEFAULT_MIN_LEAD_TIME_SECONDS: i64 = 5;

/// Truncates to microseconds, the resolution of a `TIMESTAMPTZ` column.
/// Lifecycle times are committed at this precision so that the value indexed
/// by the scheduler is the value the store reads back.
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// A transition request as issued by an author.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionAction {
    Schedule { at: DateTime<Utc> },
    PublishNow,
    RevertToDraft,
    Edit(ContentPatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Schedule,
    PublishNow,
    RevertToDraft,
    Edit,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ActionKind::Schedule => "schedule",
            ActionKind::PublishNow => "publish",
            ActionKind::RevertToDraft => "revert to draft",
            ActionKind::Edit => "edit",
        };
        f.write_str(text)
    }
}

impl TransitionAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            TransitionAction::Schedule { .. } => ActionKind::Schedule,
            TransitionAction::PublishNow => ActionKind::PublishNow,
            TransitionAction::RevertToDraft => ActionKind::RevertToDraft,
            TransitionAction::Edit(_) => ActionKind::Edit,
        }
    }
}

/// A validated, normalized change ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Enter (or stay in) `Scheduled` with an already clamped time
    Schedule { at: DateTime<Utc> },
    Publish { at: DateTime<Utc> },
    /// Scheduler promotion of the entry registered for `due_at`
    Fire {
        due_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    Revert,
    Edit(ContentPatch),
}

impl Transition {
    pub fn fire(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Transition::Fire { due_at, at: now }
    }

    pub fn apply(&self, record: &mut ContentRecord) -> Result<(), TransitionError> {
        match self {
            Transition::Schedule { at } => {
                record.status = ContentStatus::Scheduled;
                record.scheduled_at = Some(*at);
            }
            Transition::Publish { at } => publish(record, *at),
            Transition::Fire { due_at, at } => {
                if record.status != ContentStatus::Scheduled
                    || record.scheduled_at != Some(*due_at)
                {
                    return Err(TransitionError::Superseded);
                }
                publish(record, *at);
            }
            Transition::Revert => {
                record.status = ContentStatus::Draft;
                record.scheduled_at = None;
            }
            Transition::Edit(patch) => {
                check_delivery_intent(
                    record.kind,
                    patch.delivery_intent.unwrap_or(record.delivery_intent),
                )?;
                patch.apply_to(record);
            }
        }
        Ok(())
    }
}

fn publish(record: &mut ContentRecord, at: DateTime<Utc>) {
    let at = stored_precision(at);
    record.status = ContentStatus::Published;
    record.scheduled_at = None;
    record.published_at = Some(match record.published_at {
        Some(previous) => previous.max(at),
        None => at,
    });
}

/// Decides whether a transition is legal and normalizes its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionValidator {
    min_lead_time: Duration,
}

impl Default for TransitionValidator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_MIN_LEAD_TIME_SECONDS))
    }
}

impl TransitionValidator {
    pub fn new(min_lead_time: Duration) -> Self {
        Self {
            min_lead_time: min_lead_time.max(Duration::zero()),
        }
    }

    pub fn min_lead_time(&self) -> Duration {
        self.min_lead_time
    }

    /// Too-soon and past times are moved up to the earliest allowed instant
    /// instead of being rejected.
    pub fn clamp_schedule(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        stored_precision(at.max(now + self.min_lead_time))
    }

    pub fn validate(
        &self,
        record: &ContentRecord,
        action: &TransitionAction,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        use ContentStatus::*;

        let invalid = || TransitionError::InvalidTransition {
            from: record.status,
            action: action.kind(),
        };

        match (record.status, action) {
            (Draft | Scheduled, TransitionAction::Schedule { at }) => Ok(Transition::Schedule {
                at: self.clamp_schedule(*at, now),
            }),
            (Draft | Scheduled, TransitionAction::PublishNow) => {
                Ok(Transition::Publish { at: now })
            }
            (Scheduled | Published, TransitionAction::RevertToDraft) => Ok(Transition::Revert),
            (_, TransitionAction::Edit(patch)) => {
                if let Some(intent) = patch.delivery_intent {
                    check_delivery_intent(record.kind, intent)?;
                }
                Ok(Transition::Edit(patch.clone()))
            }
            (Published, TransitionAction::Schedule { .. } | TransitionAction::PublishNow)
            | (Draft, TransitionAction::RevertToDraft) => Err(invalid()),
        }
    }

    pub fn validate_new(&self, new: &NewContent) -> Result<(), TransitionError> {
        check_delivery_intent(new.kind, new.delivery_intent)
    }
}

fn check_delivery_intent(kind: ContentKind, intent: DeliveryIntent) -> Result<(), TransitionError> {
    if kind == ContentKind::Page && intent != DeliveryIntent::PublishOnly {
        return Err(TransitionError::ValidationFailed(format!(
            "pages cannot use the '{intent}' delivery intent"
        )));
    }
    Ok(())
}

/// Parses an RFC 3339 schedule time as sent by authoring surfaces.
pub fn parse_schedule_time(raw: &str) -> Result<DateTime<Utc>, TransitionError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| TransitionError::ValidationFailed(format!("invalid schedule time '{raw}': {e}")))
}
