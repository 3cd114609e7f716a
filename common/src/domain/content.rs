use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::domain::ContentId;
use crate::domain::error::UnknownVariant;

/// Maps a fieldless enum to the lowercase text stored in the database and
/// accepted over the wire.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant::new(stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Page,
}

text_enum!(ContentKind {
    Post => "post",
    Page => "page",
});

/// Lifecycle status. Draft is the initial state of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Scheduled,
    Published,
}

text_enum!(ContentStatus {
    Draft => "draft",
    Scheduled => "scheduled",
    Published => "published",
});

/// Access tier. Carried in every status but observable only once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    MembersOnly,
    PaidMembersOnly,
}

text_enum!(Visibility {
    Public => "public",
    MembersOnly => "members_only",
    PaidMembersOnly => "paid_members_only",
});

/// What happens when a post goes live. Pages are always `PublishOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryIntent {
    #[default]
    PublishOnly,
    PublishAndEmail,
    EmailOnly,
}

text_enum!(DeliveryIntent {
    PublishOnly => "publish_only",
    PublishAndEmail => "publish_and_email",
    EmailOnly => "email_only",
});

impl DeliveryIntent {
    pub fn sends_email(&self) -> bool {
        matches!(self, Self::PublishAndEmail | Self::EmailOnly)
    }
}

#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Clone,
        Debug,
        Display,
        AsRef,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct ContentTitle(String);

/// A post or page together with its publishing state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: ContentId,
    pub kind: ContentKind,
    pub title: ContentTitle,
    pub body: String,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    /// Present only while `status` is `Scheduled`
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Set on first publication, never moves backwards
    pub published_at: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub delivery_intent: DeliveryIntent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every committed mutation
    pub version: i64,
}

/// Input for a new draft
#[derive(Debug, Clone, PartialEq)]
pub struct NewContent {
    pub kind: ContentKind,
    pub title: ContentTitle,
    pub body: String,
    pub excerpt: Option<String>,
    pub visibility: Visibility,
    pub delivery_intent: DeliveryIntent,
}

/// Partial update of the author-editable fields. `excerpt: Some(None)` clears
/// the custom excerpt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPatch {
    pub title: Option<ContentTitle>,
    pub body: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    pub delivery_intent: Option<DeliveryIntent>,
}

impl ContentRecord {
    /// Builds a fresh draft. Callers validate `new` first.
    pub fn draft(id: ContentId, new: NewContent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: new.kind,
            title: new.title,
            body: new.body,
            excerpt: new.excerpt,
            status: ContentStatus::Draft,
            scheduled_at: None,
            published_at: None,
            visibility: new.visibility,
            delivery_intent: new.delivery_intent,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    /// Whether going live should notify the email delivery collaborator
    pub fn wants_email(&self) -> bool {
        self.kind == ContentKind::Post && self.delivery_intent.sends_email()
    }

    /// Checks the record-level invariants: `scheduled_at` tracks the
    /// `Scheduled` status, and a published record has a publish time.
    pub fn is_consistent(&self) -> bool {
        let schedule_ok = (self.status == ContentStatus::Scheduled) == self.scheduled_at.is_some();
        let publish_ok = !self.is_published() || self.published_at.is_some();
        let intent_ok = self.kind == ContentKind::Post || !self.delivery_intent.sends_email();
        schedule_ok && publish_ok && intent_ok
    }
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.excerpt.is_none()
            && self.visibility.is_none()
            && self.delivery_intent.is_none()
    }

    pub(crate) fn apply_to(&self, record: &mut ContentRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(body) = &self.body {
            record.body = body.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            record.excerpt = excerpt.clone();
        }
        if let Some(visibility) = self.visibility {
            record.visibility = visibility;
        }
        if let Some(intent) = self.delivery_intent {
            record.delivery_intent = intent;
        }
    }
}
