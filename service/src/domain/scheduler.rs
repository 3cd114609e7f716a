//! Time-driven promotion of scheduled content.
//!
//! The [`DueIndex`] is a min-heap of fire times plus an authoritative slot per
//! record. Heap entries whose time no longer matches the slot are stale and
//! are dropped lazily when they reach the top. Slots carry the record version
//! that produced them, so index updates arriving out of order never let an
//! older state overwrite a newer one.
//!
//! The index is only a wake-up list. The decision to publish is made by the
//! store's compare-and-swap, so a stale or duplicated entry can cost one
//! wasted read but never a wrong publish.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use inkwell_common::{ContentId, content::ContentRecord};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::delivery::DeliveryNotifier;
use crate::domain::publication::{FireOutcome, PublicationError, PublicationService};
use crate::domain::repository::ContentRepository;

/// Due records fired at the same time
const FIRE_CONCURRENCY: usize = 8;

/// A popped entry, handed to the publication service for firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueEntry {
    pub id: ContentId,
    /// The record's `scheduled_at` when the entry was registered
    pub due_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    version: i64,
    due_at: DateTime<Utc>,
    fire_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DueIndex {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, ContentId)>>,
    slots: HashMap<ContentId, Slot>,
}

impl DueIndex {
    /// Mirrors a committed record state into the index.
    ///
    /// Returns true when the index changed. States older than the one
    /// already indexed are ignored.
    pub fn sync(&mut self, id: ContentId, version: i64, due_at: Option<DateTime<Utc>>) -> bool {
        match (self.slots.entry(id), due_at) {
            (Entry::Occupied(slot), _) if slot.get().version > version => false,
            (Entry::Occupied(slot), None) => {
                slot.remove();
                true
            }
            (Entry::Vacant(_), None) => false,
            (Entry::Occupied(mut slot), Some(due_at)) => {
                let current = slot.get_mut();
                current.version = version;
                if current.due_at == due_at {
                    return false;
                }
                current.due_at = due_at;
                current.fire_at = due_at;
                self.heap.push(Reverse((due_at, id)));
                true
            }
            (Entry::Vacant(slot), Some(due_at)) => {
                slot.insert(Slot {
                    version,
                    due_at,
                    fire_at: due_at,
                });
                self.heap.push(Reverse((due_at, id)));
                true
            }
        }
    }

    /// Puts a popped entry back for another attempt at `fire_at`, unless a
    /// newer state was indexed in the meantime.
    pub fn retry(&mut self, entry: DueEntry, fire_at: DateTime<Utc>) -> bool {
        match self.slots.entry(entry.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Slot {
                    version: entry.version,
                    due_at: entry.due_at,
                    fire_at,
                });
                self.heap.push(Reverse((fire_at, entry.id)));
                true
            }
        }
    }

    pub fn remove(&mut self, id: ContentId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Earliest live fire time
    pub fn next_due(&mut self) -> Option<DateTime<Utc>> {
        while let Some(Reverse((fire_at, id))) = self.heap.peek().copied() {
            if self.is_live(id, fire_at) {
                return Some(fire_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Removes and returns every live entry with `fire_at <= now`
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<DueEntry> {
        let mut due = Vec::new();
        while let Some(fire_at) = self.next_due() {
            if fire_at > now {
                break;
            }
            if let Some(Reverse((_, id))) = self.heap.pop() {
                if let Some(slot) = self.slots.remove(&id) {
                    due.push(DueEntry {
                        id,
                        due_at: slot.due_at,
                        version: slot.version,
                    });
                }
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn is_live(&self, id: ContentId, fire_at: DateTime<Utc>) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|slot| slot.fire_at == fire_at)
    }
}

/// Shared access to the due index for the scheduler and the publication
/// service. Cloning shares the same index.
#[derive(Debug, Clone, Default)]
pub struct ScheduleHandle {
    index: Arc<Mutex<DueIndex>>,
    wake: Arc<Notify>,
}

impl ScheduleHandle {
    pub fn sync(&self, record: &ContentRecord) {
        let changed = self
            .index
            .lock()
            .sync(record.id, record.version, record.scheduled_at);
        if changed {
            self.wake.notify_one();
        }
    }

    pub fn remove(&self, id: ContentId) {
        if self.index.lock().remove(id) {
            self.wake.notify_one();
        }
    }

    pub fn retry(&self, entry: DueEntry, fire_at: DateTime<Utc>) {
        if self.index.lock().retry(entry, fire_at) {
            self.wake.notify_one();
        }
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.index.lock().next_due()
    }

    pub fn pending(&self) -> usize {
        self.index.lock().len()
    }

    fn pop_due(&self, now: DateTime<Utc>) -> Vec<DueEntry> {
        self.index.lock().pop_due(now)
    }
}

/// Background loop that fires due entries through the publication service.
pub struct Scheduler<R: ContentRepository, N: DeliveryNotifier> {
    service: Arc<PublicationService<R, N>>,
}

impl<R: ContentRepository, N: DeliveryNotifier> Scheduler<R, N> {
    pub fn new(service: Arc<PublicationService<R, N>>) -> Self {
        Self { service }
    }

    /// Re-registers every scheduled record from the store. Run on startup so
    /// pending publications survive restarts.
    pub async fn rebuild(&self) -> Result<usize, PublicationError> {
        self.service.restore_schedule().await
    }

    /// Runs until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) {
        tokio::pin!(shutdown);
        let handle = self.service.schedule_handle().clone();

        tracing::info!(pending = handle.pending(), "scheduler started");

        loop {
            let now = Utc::now();
            let due = handle.pop_due(now);
            if !due.is_empty() {
                self.fire_all(due).await;
                continue;
            }

            let sleep = match handle.next_due() {
                Some(fire_at) => (fire_at - now).to_std().ok(),
                None => None,
            };
            let wait_for_due = async {
                match sleep {
                    Some(duration) => tokio::time::sleep(duration).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(pending = handle.pending(), "scheduler stopped");
                    return;
                }
                _ = handle.wake.notified() => {}
                _ = wait_for_due => {}
            }
        }
    }

    async fn fire_all(&self, due: Vec<DueEntry>) {
        let count = due.len();
        futures::stream::iter(due)
            .for_each_concurrent(FIRE_CONCURRENCY, |entry| async move {
                match self.service.fire_scheduled(entry).await {
                    FireOutcome::Published(_) => {}
                    FireOutcome::Superseded => {
                        tracing::debug!(content_id = %entry.id, "scheduled entry superseded");
                    }
                    FireOutcome::Retrying(at) => {
                        tracing::debug!(content_id = %entry.id, retry_at = %at, "scheduled entry deferred");
                    }
                }
            })
            .await;
        tracing::debug!(count, "fired due entries");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_800_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn pops_in_due_order_and_only_when_due() {
        let mut index = DueIndex::default();
        let (a, b, c) = (ContentId::generate(), ContentId::generate(), ContentId::generate());
        index.sync(a, 1, Some(at(30)));
        index.sync(b, 1, Some(at(10)));
        index.sync(c, 1, Some(at(20)));

        assert_eq!(index.next_due(), Some(at(10)));
        let due: Vec<_> = index.pop_due(at(20)).into_iter().map(|e| e.id).collect();
        assert_eq!(due, vec![b, c]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.next_due(), Some(at(30)));
    }

    #[test]
    fn same_instant_entries_each_fire_once() {
        let mut index = DueIndex::default();
        let ids: Vec<_> = (0..3).map(|_| ContentId::generate()).collect();
        for id in &ids {
            index.sync(*id, 1, Some(at(5)));
        }

        let due = index.pop_due(at(5));
        assert_eq!(due.len(), 3);
        assert!(index.pop_due(at(100)).is_empty());
    }

    #[test]
    fn reschedule_leaves_no_entry_at_old_time() {
        let mut index = DueIndex::default();
        let id = ContentId::generate();
        index.sync(id, 1, Some(at(10)));
        index.sync(id, 2, Some(at(60)));

        assert!(index.pop_due(at(30)).is_empty());
        let due = index.pop_due(at(60));
        assert_eq!(due, vec![DueEntry { id, due_at: at(60), version: 2 }]);
    }

    #[test]
    fn older_state_does_not_overwrite_newer() {
        let mut index = DueIndex::default();
        let id = ContentId::generate();

        index.sync(id, 3, Some(at(10)));
        // a cancellation committed before the reschedule arrives late
        assert!(!index.sync(id, 2, None));
        assert_eq!(index.next_due(), Some(at(10)));

        assert!(index.sync(id, 4, None));
        assert_eq!(index.next_due(), None);
    }

    #[test]
    fn retry_yields_to_newer_registration() {
        let mut index = DueIndex::default();
        let id = ContentId::generate();
        index.sync(id, 1, Some(at(10)));
        let entry = index.pop_due(at(10))[0];

        assert!(index.retry(entry, at(15)));
        let retried = index.pop_due(at(15));
        assert_eq!(retried[0].due_at, at(10));

        index.sync(id, 2, Some(at(40)));
        assert!(!index.retry(entry, at(20)));
        assert_eq!(index.next_due(), Some(at(40)));
    }

    #[test]
    fn remove_drops_pending_entry() {
        let mut index = DueIndex::default();
        let id = ContentId::generate();
        index.sync(id, 1, Some(at(10) + Duration::seconds(1)));

        assert!(index.remove(id));
        assert!(index.is_empty());
        assert_eq!(index.next_due(), None);
    }
}
