use chrono::{DateTime, Utc};
use inkwell_common::content::{ContentKind, ContentRecord, Visibility};
use inkwell_common::visibility::{Access, DenyReason};
use serde::Serialize;

/// Access outcome as rendered to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderAccess {
    Allowed,
    UpgradeRequired,
}

/// Reader view of a published record. The body is withheld when the
/// reader's tier is too low, leaving a teaser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderContentResponse {
    id: String,
    kind: ContentKind,
    title: String,
    excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    visibility: Visibility,
    published_at: Option<DateTime<Utc>>,
    access: ReaderAccess,
}

impl ReaderContentResponse {
    /// None when the reader must not learn the record exists
    pub fn render(access: Access, record: ContentRecord) -> Option<Self> {
        let body = access.is_allowed().then_some(record.body);
        let access = match access {
            Access::Allowed => ReaderAccess::Allowed,
            Access::Denied(DenyReason::UpgradeRequired) => ReaderAccess::UpgradeRequired,
            Access::Denied(DenyReason::NotPublished) => return None,
        };

        Some(Self {
            id: record.id.to_string(),
            kind: record.kind,
            title: record.title.into_inner(),
            excerpt: record.excerpt,
            body,
            visibility: record.visibility,
            published_at: record.published_at,
            access,
        })
    }
}
