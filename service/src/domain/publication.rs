use chrono::{DateTime, Duration, Utc};
use inkwell_common::{
    ContentId,
    content::{ContentRecord, ContentStatus, NewContent},
    error::TransitionError,
    transition::{ActionKind, Transition, TransitionAction, TransitionValidator},
    visibility::{Access, MembershipTier, can_view},
};
use itertools::Itertools;
use thiserror::Error;

use crate::domain::delivery::{DeliveryDispatcher, DeliveryNotifier};
use crate::domain::repository::{ContentRepository, RepositoryError};
use crate::domain::scheduler::{DueEntry, ScheduleHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublicationError {
    #[error("content not found")]
    NotFound,
    #[error("cannot {action} content that is {from}")]
    InvalidTransition {
        from: ContentStatus,
        action: ActionKind,
    },
    #[error("content was modified concurrently, try again")]
    Conflict,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<TransitionError> for PublicationError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::InvalidTransition { from, action } => {
                Self::InvalidTransition { from, action }
            }
            TransitionError::ValidationFailed(cause) => Self::ValidationFailed(cause),
            TransitionError::Superseded => Self::Conflict,
        }
    }
}

impl From<RepositoryError> for PublicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict => Self::Conflict,
            RepositoryError::Rejected(cause) => cause.into(),
            RepositoryError::DatabaseError(cause) => Self::Storage(cause),
        }
    }
}

/// Tunables of the publication workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicationOptions {
    /// Earliest a schedule may fire, relative to the request
    pub min_lead_time: Duration,
    /// Extra read-validate-write rounds after losing a race
    pub max_conflict_retries: u32,
    /// Delay before a fire that hit a storage failure is attempted again
    pub store_retry_interval: Duration,
}

impl Default for PublicationOptions {
    fn default() -> Self {
        Self {
            min_lead_time: TransitionValidator::default().min_lead_time(),
            max_conflict_retries: 3,
            store_retry_interval: Duration::seconds(5),
        }
    }
}

/// Result of a scheduler fire attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Published(ContentRecord),
    /// The record was unscheduled, rescheduled, published or deleted first
    Superseded,
    /// Storage failed, the entry comes back at the given time
    Retrying(DateTime<Utc>),
}

/// What a reader gets for one record
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub access: Access,
    /// Absent when the record is missing or unpublished
    pub record: Option<ContentRecord>,
}

/// Single entry point for lifecycle changes.
///
/// Request handlers and the scheduler both commit through the repository's
/// compare-and-swap, then mirror the committed state into the schedule index
/// and hand qualifying publications to the delivery dispatcher.
pub struct PublicationService<R: ContentRepository, N: DeliveryNotifier> {
    repository: R,
    validator: TransitionValidator,
    schedule: ScheduleHandle,
    delivery: DeliveryDispatcher<N>,
    max_conflict_retries: u32,
    store_retry_interval: Duration,
}

impl<R: ContentRepository, N: DeliveryNotifier> PublicationService<R, N> {
    pub fn new(repository: R, notifier: N, options: PublicationOptions) -> Self {
        Self {
            repository,
            validator: TransitionValidator::new(options.min_lead_time),
            schedule: ScheduleHandle::default(),
            delivery: DeliveryDispatcher::new(notifier),
            max_conflict_retries: options.max_conflict_retries,
            store_retry_interval: options.store_retry_interval,
        }
    }

    pub fn schedule_handle(&self) -> &ScheduleHandle {
        &self.schedule
    }

    pub async fn create(&self, new: NewContent) -> Result<ContentRecord, PublicationError> {
        self.validator.validate_new(&new)?;
        let record = ContentRecord::draft(ContentId::generate(), new, Utc::now());
        let record = self.repository.create(record).await?;
        tracing::info!(content_id = %record.id, kind = %record.kind, "draft created");
        Ok(record)
    }

    /// Author view, not gated by visibility
    pub async fn get(&self, id: ContentId) -> Result<ContentRecord, PublicationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(PublicationError::NotFound)
    }

    pub async fn delete(&self, id: ContentId) -> Result<(), PublicationError> {
        self.repository.delete(id).await?;
        self.schedule.remove(id);
        self.delivery.forget(id);
        tracing::info!(content_id = %id, "content deleted");
        Ok(())
    }

    pub async fn request_transition(
        &self,
        id: ContentId,
        action: TransitionAction,
    ) -> Result<ContentRecord, PublicationError> {
        let mut attempt = 0;
        loop {
            let current = self.get(id).await?;
            let transition = self.validator.validate(&current, &action, Utc::now())?;

            let result = self
                .repository
                .cas_update(id, current.status, move |record| transition.apply(record))
                .await;

            match result {
                Ok(updated) => {
                    tracing::info!(
                        content_id = %id,
                        action = %action.kind(),
                        from = %current.status,
                        to = %updated.status,
                        "transition committed"
                    );
                    self.after_commit(current.status, &updated);
                    return Ok(updated);
                }
                Err(RepositoryError::Conflict) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(content_id = %id, attempt, "transition lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Promotes the record behind a due entry. Losing the race to a manual
    /// transition is a normal outcome, not an error.
    pub async fn fire_scheduled(&self, entry: DueEntry) -> FireOutcome {
        let transition = Transition::fire(entry.due_at, Utc::now());
        let result = self
            .repository
            .cas_update(entry.id, ContentStatus::Scheduled, move |record| {
                transition.apply(record)
            })
            .await;

        match result {
            Ok(record) => {
                tracing::info!(
                    content_id = %record.id,
                    due_at = %entry.due_at,
                    "scheduled content published"
                );
                self.after_commit(ContentStatus::Scheduled, &record);
                FireOutcome::Published(record)
            }
            Err(RepositoryError::DatabaseError(cause)) => {
                tracing::warn!(content_id = %entry.id, "scheduled publish failed: {}", cause);
                self.retry_later(entry)
            }
            Err(_) => match self.reconcile(entry.id).await {
                Ok(()) => FireOutcome::Superseded,
                Err(e) => {
                    // the entry is already out of the index, so it must go back in
                    tracing::warn!(content_id = %entry.id, "failed to reconcile schedule: {}", e);
                    self.retry_later(entry)
                }
            },
        }
    }

    /// Registers every scheduled record found in the store
    pub async fn restore_schedule(&self) -> Result<usize, PublicationError> {
        let scheduled = self.repository.list_by_status(ContentStatus::Scheduled).await?;
        for record in scheduled.iter() {
            self.schedule.sync(record);
        }
        Ok(scheduled.len())
    }

    /// Loads a record and runs it through the visibility gate. Missing and
    /// unpublished records are indistinguishable to the caller.
    pub async fn read_for_viewer(
        &self,
        id: ContentId,
        viewer: MembershipTier,
    ) -> Result<Reading, PublicationError> {
        let record = self.repository.find_by_id(id).await?;
        let access = can_view(record.as_ref(), viewer);
        let record = record.filter(ContentRecord::is_published);
        Ok(Reading { access, record })
    }

    /// Published records, newest first, each with the viewer's access
    pub async fn list_published(
        &self,
        viewer: MembershipTier,
    ) -> Result<Vec<Reading>, PublicationError> {
        let published = self.repository.list_by_status(ContentStatus::Published).await?;

        Ok(published
            .into_iter()
            .sorted_by(|a, b| b.published_at.cmp(&a.published_at))
            .map(|record| Reading {
                access: can_view(Some(&record), viewer),
                record: Some(record),
            })
            .collect())
    }

    fn after_commit(&self, before: ContentStatus, record: &ContentRecord) {
        self.schedule.sync(record);
        if before != ContentStatus::Published && record.is_published() {
            self.delivery.dispatch(record);
        }
    }

    fn retry_later(&self, entry: DueEntry) -> FireOutcome {
        let retry_at = Utc::now() + self.store_retry_interval;
        tracing::debug!(content_id = %entry.id, %retry_at, "scheduled publish re-queued");
        self.schedule.retry(entry, retry_at);
        FireOutcome::Retrying(retry_at)
    }

    /// Mirrors the stored state of `id` into the schedule index
    async fn reconcile(&self, id: ContentId) -> Result<(), RepositoryError> {
        match self.repository.find_by_id(id).await? {
            Some(record) => self.schedule.sync(&record),
            None => self.schedule.remove(id),
        }
        Ok(())
    }
}
