use std::sync::Arc;

use crate::domain::AppState;
use crate::domain::delivery::DeliveryNotifier;
use crate::domain::publication::PublicationService;
use crate::domain::repository::ContentRepository;

pub mod delivery;
pub mod http;
pub mod persistence;
pub mod settings;

pub struct AppStateImpl<R: ContentRepository, N: DeliveryNotifier> {
    publication: Arc<PublicationService<R, N>>,
}

impl<R: ContentRepository, N: DeliveryNotifier> AppStateImpl<R, N> {
    pub fn new(publication: Arc<PublicationService<R, N>>) -> Self {
        Self { publication }
    }
}

impl<R: ContentRepository, N: DeliveryNotifier> Clone for AppStateImpl<R, N> {
    fn clone(&self) -> Self {
        Self {
            publication: Arc::clone(&self.publication),
        }
    }
}

impl<R: ContentRepository, N: DeliveryNotifier> AppState for AppStateImpl<R, N> {
    type R = R;
    type N = N;

    fn publication(&self) -> &PublicationService<R, N> {
        &self.publication
    }
}
