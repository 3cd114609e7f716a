use crate::domain::delivery::DeliveryNotifier;
use crate::domain::publication::PublicationService;
use crate::domain::repository::ContentRepository;

pub mod delivery;
pub mod publication;
pub mod repository;
pub mod scheduler;

/// The global application state shared between all request handlers.
pub trait AppState: Clone + Send + Sync + 'static {
    type R: ContentRepository;
    type N: DeliveryNotifier;
    fn publication(&self) -> &PublicationService<Self::R, Self::N>;
}
