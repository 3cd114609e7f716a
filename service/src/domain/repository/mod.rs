use std::future::Future;

use inkwell_common::{
    ContentId,
    content::{ContentRecord, ContentStatus},
    error::TransitionError,
};
use thiserror::Error;

/// Durable keyed storage of content records.
///
/// Every mutation of an existing record goes through [`cas_update`], which is
/// what serializes writers per id: the scheduler and request handlers never
/// lock each other, the loser of a race just observes `Conflict`.
///
/// [`cas_update`]: ContentRepository::cas_update
pub trait ContentRepository: Send + Sync + 'static {
    /// Find single record by ID
    fn find_by_id(
        &self,
        id: ContentId,
    ) -> impl Future<Output = Result<Option<ContentRecord>, RepositoryError>> + Send;

    /// Insert a new record, `Conflict` if the id is taken
    fn create(
        &self,
        record: ContentRecord,
    ) -> impl Future<Output = Result<ContentRecord, RepositoryError>> + Send;

    /// Replace the stored record as a whole, inserting it if missing
    fn put(
        &self,
        record: ContentRecord,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Apply `mutator` only if the current status is `expected`.
    ///
    /// On success the version is bumped, `updated_at` refreshed and the new
    /// state returned exactly as stored, since the scheduler matches its
    /// entries against it. A rejecting mutator leaves the record untouched.
    fn cas_update<F>(
        &self,
        id: ContentId,
        expected: ContentStatus,
        mutator: F,
    ) -> impl Future<Output = Result<ContentRecord, RepositoryError>> + Send
    where
        F: FnOnce(&mut ContentRecord) -> Result<(), TransitionError> + Send;

    /// All records currently in `status`
    fn list_by_status(
        &self,
        status: ContentStatus,
    ) -> impl Future<Output = Result<Vec<ContentRecord>, RepositoryError>> + Send;

    /// Delete record
    fn delete(&self, id: ContentId) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently")]
    Conflict,
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("database error: {0}")]
    DatabaseError(String),
}
