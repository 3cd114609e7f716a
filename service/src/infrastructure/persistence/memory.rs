use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use inkwell_common::{
    ContentId,
    content::{ContentRecord, ContentStatus},
    error::TransitionError,
};

use crate::domain::repository::{ContentRepository, RepositoryError};

/// Process-local repository. The map's entry lock serializes mutation per id.
#[derive(Clone, Debug, Default)]
pub struct MemoryContentRepository {
    records: Arc<DashMap<ContentId, ContentRecord>>,
}

impl MemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentRepository for MemoryContentRepository {
    async fn find_by_id(&self, id: ContentId) -> Result<Option<ContentRecord>, RepositoryError> {
        Ok(self.records.get(&id).map(|record| record.clone()))
    }

    async fn create(&self, record: ContentRecord) -> Result<ContentRecord, RepositoryError> {
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn put(&self, record: ContentRecord) -> Result<(), RepositoryError> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn cas_update<F>(
        &self,
        id: ContentId,
        expected: ContentStatus,
        mutator: F,
    ) -> Result<ContentRecord, RepositoryError>
    where
        F: FnOnce(&mut ContentRecord) -> Result<(), TransitionError> + Send,
    {
        let mut stored = self.records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict);
        }

        let mut next = stored.clone();
        mutator(&mut next)?;
        next.version = stored.version + 1;
        next.updated_at = Utc::now();

        *stored = next.clone();
        Ok(next)
    }

    async fn list_by_status(
        &self,
        status: ContentStatus,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.clone())
            .collect())
    }

    async fn delete(&self, id: ContentId) -> Result<(), RepositoryError> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use inkwell_common::content::ContentStatus;
    use inkwell_common::test_utils::record_in;

    use super::*;

    #[tokio::test]
    async fn cas_applies_when_status_matches() {
        let repository = MemoryContentRepository::new();
        let record = record_in(ContentStatus::Draft, Utc::now());
        repository.create(record.clone()).await.unwrap();

        let updated = repository
            .cas_update(record.id, ContentStatus::Draft, |r| {
                r.body = "changed".into();
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(updated.body, "changed");
        assert_eq!(updated.version, record.version + 1);
        assert_eq!(repository.find_by_id(record.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn cas_conflicts_on_status_mismatch() {
        let repository = MemoryContentRepository::new();
        let record = record_in(ContentStatus::Draft, Utc::now());
        repository.create(record.clone()).await.unwrap();

        let result = repository
            .cas_update(record.id, ContentStatus::Scheduled, |_| Ok(()))
            .await;

        assert_eq!(result, Err(RepositoryError::Conflict));
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_record_untouched() {
        let repository = MemoryContentRepository::new();
        let record = record_in(ContentStatus::Scheduled, Utc::now());
        repository.create(record.clone()).await.unwrap();

        let result = repository
            .cas_update(record.id, ContentStatus::Scheduled, |r| {
                r.body = "half-applied".into();
                Err(TransitionError::Superseded)
            })
            .await;

        assert_eq!(result, Err(RepositoryError::Rejected(TransitionError::Superseded)));
        assert_eq!(repository.find_by_id(record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn create_refuses_duplicate_ids() {
        let repository = MemoryContentRepository::new();
        let record = record_in(ContentStatus::Draft, Utc::now());

        repository.create(record.clone()).await.unwrap();
        assert_eq!(repository.create(record).await, Err(RepositoryError::Conflict));
    }

    #[tokio::test]
    async fn missing_records() {
        let repository = MemoryContentRepository::new();
        let id = ContentId::generate();

        assert_eq!(repository.find_by_id(id).await, Ok(None));
        assert_eq!(repository.delete(id).await, Err(RepositoryError::NotFound));
        assert_eq!(
            repository.cas_update(id, ContentStatus::Draft, |_| Ok(())).await,
            Err(RepositoryError::NotFound)
        );
    }
}
