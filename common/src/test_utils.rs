//! Fixtures for building content records in tests.
//!
//! Public so that other crates can reuse it for their own tests.

use chrono::{DateTime, Duration, Utc};

use crate::domain::ContentId;
use crate::domain::content::{
    ContentKind, ContentRecord, ContentStatus, ContentTitle, DeliveryIntent, NewContent,
    Visibility,
};

pub fn new_post(title: &str) -> NewContent {
    NewContent {
        kind: ContentKind::Post,
        title: ContentTitle::try_new(title).unwrap(),
        body: format!("<p>{title}</p>"),
        excerpt: None,
        visibility: Visibility::Public,
        delivery_intent: DeliveryIntent::PublishOnly,
    }
}

pub fn new_page(title: &str) -> NewContent {
    NewContent {
        kind: ContentKind::Page,
        ..new_post(title)
    }
}

/// A public post already sitting in `status`, with the timestamps that state
/// implies relative to `now`.
pub fn record_in(status: ContentStatus, now: DateTime<Utc>) -> ContentRecord {
    let mut record = ContentRecord::draft(ContentId::generate(), new_post("Fixture"), now);
    record.status = status;
    match status {
        ContentStatus::Draft => {}
        ContentStatus::Scheduled => record.scheduled_at = Some(now + Duration::hours(1)),
        ContentStatus::Published => record.published_at = Some(now - Duration::hours(1)),
    }
    record
}
