use chrono::{DateTime, Utc};
use inkwell_common::content::{
    ContentKind, ContentPatch, ContentRecord, ContentStatus, ContentTitle, DeliveryIntent,
    NewContent, Visibility,
};
use inkwell_common::transition::{TransitionAction, parse_schedule_time};
use serde::{Deserialize, Deserializer, Serialize};

use crate::infrastructure::http::api::ApiError;

/// Request body for the create route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentRequest {
    #[serde(default = "default_kind")]
    kind: ContentKind,
    title: String,
    #[serde(default)]
    body: String,
    excerpt: Option<String>,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default)]
    delivery_intent: DeliveryIntent,
}

fn default_kind() -> ContentKind {
    ContentKind::Post
}

impl TryFrom<CreateContentRequest> for NewContent {
    type Error = ApiError;

    fn try_from(value: CreateContentRequest) -> Result<Self, Self::Error> {
        Ok(NewContent {
            kind: value.kind,
            title: parse_title(value.title)?,
            body: value.body,
            excerpt: value.excerpt,
            visibility: value.visibility,
            delivery_intent: value.delivery_intent,
        })
    }
}

/// Request body for the edit route. Absent fields are left as they are,
/// `"excerpt": null` clears the excerpt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    title: Option<String>,
    body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    excerpt: Option<Option<String>>,
    visibility: Option<Visibility>,
    delivery_intent: Option<DeliveryIntent>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl TryFrom<UpdateContentRequest> for ContentPatch {
    type Error = ApiError;

    fn try_from(value: UpdateContentRequest) -> Result<Self, Self::Error> {
        let patch = ContentPatch {
            title: value.title.map(parse_title).transpose()?,
            body: value.body,
            excerpt: value.excerpt,
            visibility: value.visibility,
            delivery_intent: value.delivery_intent,
        };
        if patch.is_empty() {
            return Err(ApiError::UnprocessableEntity(
                "update must change at least one field".to_string(),
            ));
        }
        Ok(patch)
    }
}

fn parse_title(title: String) -> Result<ContentTitle, ApiError> {
    ContentTitle::try_new(title).map_err(|e| ApiError::UnprocessableEntity(e.to_string()))
}

/// Request body for the transitions route
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionRequest {
    Schedule { at: String },
    Publish,
    RevertToDraft,
}

impl TryFrom<TransitionRequest> for TransitionAction {
    type Error = ApiError;

    fn try_from(value: TransitionRequest) -> Result<Self, Self::Error> {
        match value {
            TransitionRequest::Schedule { at } => parse_schedule_time(&at)
                .map(|at| TransitionAction::Schedule { at })
                .map_err(|e| ApiError::UnprocessableEntity(e.to_string())),
            TransitionRequest::Publish => Ok(TransitionAction::PublishNow),
            TransitionRequest::RevertToDraft => Ok(TransitionAction::RevertToDraft),
        }
    }
}

/// Author view of a record, returned by every admin route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    id: String,
    kind: ContentKind,
    title: String,
    body: String,
    excerpt: Option<String>,
    status: ContentStatus,
    scheduled_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    visibility: Visibility,
    delivery_intent: DeliveryIntent,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl From<ContentRecord> for ContentResponse {
    fn from(value: ContentRecord) -> Self {
        Self {
            id: value.id.to_string(),
            kind: value.kind,
            title: value.title.into_inner(),
            body: value.body,
            excerpt: value.excerpt,
            status: value.status,
            scheduled_at: value.scheduled_at,
            published_at: value.published_at,
            visibility: value.visibility,
            delivery_intent: value.delivery_intent,
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent_excerpt() {
        let absent: UpdateContentRequest = serde_json::from_str(r#"{"body":"x"}"#).unwrap();
        let cleared: UpdateContentRequest = serde_json::from_str(r#"{"excerpt":null}"#).unwrap();

        assert_eq!(ContentPatch::try_from(absent).unwrap().excerpt, None);
        assert_eq!(ContentPatch::try_from(cleared).unwrap().excerpt, Some(None));
    }

    #[test]
    fn empty_update_is_rejected() {
        let request: UpdateContentRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            ContentPatch::try_from(request),
            Err(ApiError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn transition_requests_are_tagged_by_action() {
        let schedule: TransitionRequest =
            serde_json::from_str(r#"{"action":"schedule","at":"2030-01-01T10:00:00Z"}"#).unwrap();
        let revert: TransitionRequest =
            serde_json::from_str(r#"{"action":"revert_to_draft"}"#).unwrap();

        assert!(matches!(
            TransitionAction::try_from(schedule),
            Ok(TransitionAction::Schedule { .. })
        ));
        assert_eq!(
            TransitionAction::try_from(revert),
            Ok(TransitionAction::RevertToDraft)
        );
    }

    #[test]
    fn malformed_schedule_time_is_unprocessable() {
        let request = TransitionRequest::Schedule {
            at: "next tuesday".into(),
        };
        assert!(matches!(
            TransitionAction::try_from(request),
            Err(ApiError::UnprocessableEntity(_))
        ));
    }
}
