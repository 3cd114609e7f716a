use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use inkwell_common::{ContentId, content::ContentRecord};

/// External collaborator that sends the "publish and email" notification.
pub trait DeliveryNotifier: Send + Sync + 'static {
    fn deliver(
        &self,
        record: ContentRecord,
    ) -> impl Future<Output = Result<(), anyhow::Error>> + Send;
}

/// Hands published posts to the notifier at most once per publication.
///
/// Only the latest delivered `published_at` is kept per record. Publish times
/// never move backwards, so a later time is a new publication while an equal
/// or earlier one is a racing path committing a publication already sent.
pub struct DeliveryDispatcher<N: DeliveryNotifier> {
    notifier: Arc<N>,
    dispatched: DashMap<ContentId, DateTime<Utc>>,
}

impl<N: DeliveryNotifier> DeliveryDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier: Arc::new(notifier),
            dispatched: DashMap::new(),
        }
    }

    /// Fire and forget. Returns whether a delivery was started.
    pub fn dispatch(&self, record: &ContentRecord) -> bool {
        if !record.is_published() || !record.wants_email() {
            return false;
        }
        let Some(published_at) = record.published_at else {
            return false;
        };
        {
            let mut last = self
                .dispatched
                .entry(record.id)
                .or_insert(DateTime::<Utc>::MIN_UTC);
            if published_at <= *last {
                tracing::debug!(content_id = %record.id, "delivery already dispatched");
                return false;
            }
            *last = published_at;
        }

        let notifier = Arc::clone(&self.notifier);
        let record = record.clone();
        tokio::spawn(async move {
            let content_id = record.id;
            if let Err(e) = notifier.deliver(record).await {
                tracing::warn!(%content_id, "email delivery failed: {:#}", e);
            }
        });
        true
    }

    /// Drops the delivery history of a deleted record
    pub fn forget(&self, id: ContentId) {
        self.dispatched.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use inkwell_common::content::{ContentStatus, DeliveryIntent};
    use inkwell_common::test_utils::record_in;

    use super::*;

    #[derive(Clone, Default)]
    struct CountingNotifier(Arc<AtomicUsize>);

    impl DeliveryNotifier for CountingNotifier {
        async fn deliver(&self, _record: ContentRecord) -> Result<(), anyhow::Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn emailed_post() -> ContentRecord {
        let mut record = record_in(ContentStatus::Published, Utc::now());
        record.delivery_intent = DeliveryIntent::PublishAndEmail;
        record
    }

    #[tokio::test]
    async fn same_publication_is_delivered_once() {
        let notifier = CountingNotifier::default();
        let dispatcher = DeliveryDispatcher::new(notifier.clone());
        let record = emailed_post();

        assert!(dispatcher.dispatch(&record));
        assert!(!dispatcher.dispatch(&record));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn republication_is_a_new_delivery() {
        let dispatcher = DeliveryDispatcher::new(CountingNotifier::default());
        let mut record = emailed_post();

        assert!(dispatcher.dispatch(&record));
        record.published_at = record.published_at.map(|at| at + chrono::Duration::hours(1));
        assert!(dispatcher.dispatch(&record));
        assert_eq!(dispatcher.dispatched.len(), 1);
    }

    #[tokio::test]
    async fn older_publication_is_not_delivered_again() {
        let dispatcher = DeliveryDispatcher::new(CountingNotifier::default());
        let mut record = emailed_post();
        let first = record.published_at;

        record.published_at = first.map(|at| at + chrono::Duration::minutes(5));
        assert!(dispatcher.dispatch(&record));

        record.published_at = first;
        assert!(!dispatcher.dispatch(&record));
        assert_eq!(
            dispatcher.dispatched.get(&record.id).map(|at| *at),
            first.map(|at| at + chrono::Duration::minutes(5))
        );
    }

    #[tokio::test]
    async fn history_is_kept_per_record_until_forgotten() {
        let dispatcher = DeliveryDispatcher::new(CountingNotifier::default());
        let mut record = emailed_post();

        for hours in 0..20 {
            record.published_at = record.published_at.map(|at| at + chrono::Duration::hours(hours));
            dispatcher.dispatch(&record);
        }
        let other = emailed_post();
        assert!(dispatcher.dispatch(&other));
        assert_eq!(dispatcher.dispatched.len(), 2);

        dispatcher.forget(record.id);
        assert_eq!(dispatcher.dispatched.len(), 1);
        assert!(dispatcher.dispatched.get(&record.id).is_none());
    }

    #[tokio::test]
    async fn publish_only_posts_are_not_delivered() {
        let dispatcher = DeliveryDispatcher::new(CountingNotifier::default());
        let record = record_in(ContentStatus::Published, Utc::now());

        assert!(!dispatcher.dispatch(&record));
    }
}
