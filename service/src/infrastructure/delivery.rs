use inkwell_common::content::ContentRecord;

use crate::domain::delivery::DeliveryNotifier;

/// Stand-in for the mail collaborator: records the hand-off as a tracing event.
#[derive(Debug, Clone, Default)]
pub struct LoggingDeliveryNotifier;

impl DeliveryNotifier for LoggingDeliveryNotifier {
    async fn deliver(&self, record: ContentRecord) -> Result<(), anyhow::Error> {
        tracing::info!(
            content_id = %record.id,
            title = record.title.as_ref(),
            intent = %record.delivery_intent,
            published_at = ?record.published_at,
            "newsletter delivery requested"
        );
        Ok(())
    }
}
