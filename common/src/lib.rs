mod domain;
mod infrastructure;

pub mod test_utils;

// Persisted content records table and field names

pub const CONTENT_TABLE_NAME: &str = "content_records";

pub const ID_FIELD_NAME: &str = "id";
pub const KIND_FIELD_NAME: &str = "kind";
pub const TITLE_FIELD_NAME: &str = "title";
pub const BODY_FIELD_NAME: &str = "body";
pub const EXCERPT_FIELD_NAME: &str = "excerpt";
pub const STATUS_FIELD_NAME: &str = "status";
pub const VISIBILITY_FIELD_NAME: &str = "visibility";
pub const DELIVERY_INTENT_FIELD_NAME: &str = "delivery_intent";

pub const SCHEDULED_FIELD_NAME: &str = "scheduled_at";
pub const PUBLISHED_FIELD_NAME: &str = "published_at";
pub const CREATED_FIELD_NAME: &str = "created_at";
pub const UPDATED_FIELD_NAME: &str = "updated_at";

pub const VERSION_FIELD_NAME: &str = "version";

// expose domain module

pub use domain::*;

// expose database module

pub use infrastructure::database;
